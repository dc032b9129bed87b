//! Probe command implementation.

use super::Target;
use medisync_sync_engine::{ReachabilityProbe, TcpProbe};

/// Runs the probe command. Fails if the remote is unreachable.
pub async fn run(target: &Target) -> Result<(), Box<dyn std::error::Error>> {
    let probe = TcpProbe::from_config(&target.config())?;
    if probe.is_reachable().await {
        println!("{} is reachable", probe.address());
        Ok(())
    } else {
        Err(format!("{} is unreachable", probe.address()).into())
    }
}
