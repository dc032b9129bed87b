//! Configuration for the sync engine.

use crate::error::{SyncError, SyncResult};
use std::time::Duration;

/// Configuration for sync operations.
///
/// Everything the engine needs to reach the remote is passed in here at
/// construction time; nothing is read from process-wide state.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Base URL of the REST API (e.g. "https://api.example.com/v1").
    pub base_url: String,
    /// Bearer token attached to every request.
    pub auth_token: Option<String>,
    /// Explicit `host:port` to probe; derived from `base_url` when unset.
    pub probe_address: Option<String>,
    /// Timeout of a single reachability probe.
    pub probe_timeout: Duration,
    /// Interval between reachability probes while monitoring.
    pub probe_interval: Duration,
    /// TCP connect timeout for API requests.
    pub connect_timeout: Duration,
    /// Overall timeout for API requests.
    pub request_timeout: Duration,
    /// User agent sent with API requests.
    pub user_agent: String,
}

impl SyncConfig {
    /// Creates a new sync configuration.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
            probe_address: None,
            probe_timeout: Duration::from_millis(1500),
            probe_interval: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
            user_agent: format!("medisync/{}", env!("CARGO_PKG_VERSION")),
        }
    }

    /// Sets the bearer token.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Sets the address probed for reachability.
    pub fn with_probe_address(mut self, address: impl Into<String>) -> Self {
        self.probe_address = Some(address.into());
        self
    }

    /// Sets the probe timeout.
    pub fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Sets the probe interval.
    pub fn with_probe_interval(mut self, interval: Duration) -> Self {
        self.probe_interval = interval;
        self
    }

    /// Sets the request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Returns the base URL without a trailing slash.
    pub fn api_root(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Returns the `host:port` the connectivity prober should connect to.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if no probe address is set and
    /// the base URL has no host or no known default port.
    pub fn resolve_probe_address(&self) -> SyncResult<String> {
        if let Some(address) = &self.probe_address {
            return Ok(address.clone());
        }

        let url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| SyncError::InvalidConfig(format!("bad base url: {}", e)))?;
        let host = url
            .host_str()
            .ok_or_else(|| SyncError::InvalidConfig("base url has no host".into()))?;
        let port = url
            .port_or_known_default()
            .ok_or_else(|| SyncError::InvalidConfig("base url has no port".into()))?;
        Ok(format!("{}:{}", host, port))
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new("http://localhost:8080")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new("https://api.example.com/v1/")
            .with_auth_token("secret")
            .with_probe_interval(Duration::from_secs(10))
            .with_request_timeout(Duration::from_secs(5));

        assert_eq!(config.api_root(), "https://api.example.com/v1");
        assert_eq!(config.auth_token.as_deref(), Some("secret"));
        assert_eq!(config.probe_interval, Duration::from_secs(10));
        assert_eq!(config.probe_timeout, Duration::from_millis(1500));
        assert_eq!(config.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn probe_address_from_url() {
        let config = SyncConfig::new("https://api.example.com/v1");
        assert_eq!(config.resolve_probe_address().unwrap(), "api.example.com:443");

        let config = SyncConfig::new("http://10.0.2.2:8000/api");
        assert_eq!(config.resolve_probe_address().unwrap(), "10.0.2.2:8000");
    }

    #[test]
    fn explicit_probe_address_wins() {
        let config = SyncConfig::new("not a url").with_probe_address("db.internal:5432");
        assert_eq!(config.resolve_probe_address().unwrap(), "db.internal:5432");
    }

    #[test]
    fn invalid_base_url() {
        let config = SyncConfig::new("not a url");
        assert!(matches!(
            config.resolve_probe_address(),
            Err(SyncError::InvalidConfig(_))
        ));
    }
}
