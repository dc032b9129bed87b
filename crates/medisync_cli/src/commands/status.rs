//! Status command implementation.

use super::Target;
use serde::Serialize;

/// Pending work in a data directory.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusResult {
    /// Data directory.
    pub data_dir: String,
    /// Remote base URL.
    pub url: String,
    /// Records waiting to be pushed, per entity type.
    pub pending: Vec<PendingCount>,
    /// Total records waiting to be pushed.
    pub total_pending: usize,
}

/// Pending records of one entity type.
#[derive(Debug, Serialize)]
pub struct PendingCount {
    /// Entity type.
    pub entity: String,
    /// Number of pending records.
    pub count: usize,
}

/// Runs the status command.
pub fn run(target: &Target, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = target.open_coordinator()?;
    let pending: Vec<PendingCount> = coordinator
        .pending_counts()?
        .into_iter()
        .map(|(kind, count)| PendingCount {
            entity: kind.name().to_string(),
            count,
        })
        .collect();
    let result = StatusResult {
        data_dir: target.data_dir.display().to_string(),
        url: target.url.clone(),
        total_pending: pending.iter().map(|p| p.count).sum(),
        pending,
    };

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

fn print_text_output(result: &StatusResult) {
    println!("Data directory: {}", result.data_dir);
    println!("Remote:         {}", result.url);
    println!();
    println!("Pending records:");
    for entry in &result.pending {
        println!("  {:<14} {}", entry.entity, entry.count);
    }
    println!("  {:<14} {}", "total", result.total_pending);
}
