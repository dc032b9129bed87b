//! CLI command implementations.

pub mod discard;
pub mod probe;
pub mod status;
pub mod sync;
pub mod watch;

use medisync_model::{AuditEvent, CarePlan, Diagnosis, Event, Medication, Patient, SyncRecord};
use medisync_store::JsonFileStore;
use medisync_sync_engine::{
    ConnectivityProber, EntitySync, EntitySynchronizer, ReqwestClient, RestGateway, SyncConfig,
    SyncCoordinator,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Where the CLI reads and writes, and which remote it talks to.
#[derive(Debug, Clone)]
pub struct Target {
    /// Local data directory.
    pub data_dir: PathBuf,
    /// Base URL of the REST API.
    pub url: String,
    /// Bearer token.
    pub token: Option<String>,
    /// Explicit probe address.
    pub probe_address: Option<String>,
    /// Interval between probes while watching.
    pub probe_interval: Duration,
}

impl Target {
    /// Builds the engine configuration.
    pub fn config(&self) -> SyncConfig {
        let mut config = SyncConfig::new(&self.url).with_probe_interval(self.probe_interval);
        if let Some(token) = &self.token {
            config = config.with_auth_token(token);
        }
        if let Some(address) = &self.probe_address {
            config = config.with_probe_address(address);
        }
        config
    }

    /// Opens every store and wires a coordinator over them.
    pub fn open_coordinator(&self) -> Result<SyncCoordinator, Box<dyn std::error::Error>> {
        let config = self.config();
        let client = Arc::new(ReqwestClient::new(&config)?);
        let dir = self.data_dir.as_path();
        let synchronizers = vec![
            synchronizer::<Patient>(dir, &config, &client)?,
            synchronizer::<Diagnosis>(dir, &config, &client)?,
            synchronizer::<Medication>(dir, &config, &client)?,
            synchronizer::<Event>(dir, &config, &client)?,
            synchronizer::<CarePlan>(dir, &config, &client)?,
            synchronizer::<AuditEvent>(dir, &config, &client)?,
        ];
        let prober = Arc::new(ConnectivityProber::from_config(&config)?);
        Ok(SyncCoordinator::new(prober, synchronizers))
    }
}

fn synchronizer<R: SyncRecord>(
    dir: &Path,
    config: &SyncConfig,
    client: &Arc<ReqwestClient>,
) -> Result<Arc<dyn EntitySync>, Box<dyn std::error::Error>> {
    let store = Arc::new(JsonFileStore::<R>::open(dir)?);
    let gateway = Arc::new(RestGateway::<R, _>::new(config, Arc::clone(client)));
    Ok(Arc::new(EntitySynchronizer::new(gateway, store)))
}
