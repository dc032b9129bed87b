//! Watch command implementation.

use super::sync::print_report;
use super::Target;
use medisync_sync_engine::OverallSyncState;
use tracing::info;

/// Runs the watch command until Ctrl-C.
pub async fn run(target: &Target) -> Result<(), Box<dyn std::error::Error>> {
    let coordinator = target.open_coordinator()?;
    let mut status = coordinator.subscribe_status();
    coordinator.start_network_monitoring().await;
    println!("Watching {} (Ctrl-C to stop)", target.url);

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal?;
                break;
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *status.borrow_and_update();
                info!(state = %state, "sync state changed");
                if matches!(state, OverallSyncState::Completed | OverallSyncState::Failed) {
                    if let Some(report) = coordinator.last_session() {
                        print_report(&report);
                    }
                }
            }
        }
    }

    coordinator.stop_network_monitoring();
    println!("Stopped; {} record(s) pending", coordinator.pending_count()?);
    Ok(())
}
