//! Sync command implementation.

use super::Target;
use medisync_sync_engine::SessionReport;

/// Runs the sync command.
pub async fn run(target: &Target, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = target.open_coordinator()?;
    let completed = coordinator.synchronize_all().await;
    let report = coordinator
        .last_session()
        .ok_or("no session was run")?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        _ => {
            print_report(&report);
        }
    }

    if completed {
        Ok(())
    } else {
        Err(format!("sync ended {}", report.outcome.state()).into())
    }
}

/// Prints a session report as text.
pub fn print_report(report: &SessionReport) {
    println!(
        "Session {} ({}): {}",
        report.id,
        report.started_at.format("%Y-%m-%d %H:%M:%S"),
        report.outcome.state()
    );
    for entity in &report.entities {
        let pulled = entity
            .pulled
            .map(|n| n.to_string())
            .unwrap_or_else(|| "-".into());
        println!(
            "  {:<14} created {:>3}  updated {:>3}  deleted {:>3}  rejected {:>3}  pulled {:>4}",
            entity.kind.name(),
            entity.created,
            entity.updated,
            entity.deleted + entity.vanished,
            entity.rejected.len(),
            pulled
        );
        for rejected in &entity.rejected {
            println!("    rejected {} ({}): {}", rejected.key, rejected.status, rejected.reason);
        }
        if let Some(abort) = &entity.aborted {
            println!("    aborted: {}", abort.reason);
        }
        if let Some(error) = &entity.pull_error {
            println!("    pull failed: {error}");
        }
    }
}
