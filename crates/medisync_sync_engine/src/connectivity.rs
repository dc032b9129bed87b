//! Connectivity prober.
//!
//! Reachability is tested by opening a TCP connection to the remote
//! endpoint on a fixed interval rather than by listening to OS network
//! events. The result is published as a de-duplicated `watch` value.

use crate::config::SyncConfig;
use crate::error::SyncResult;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// A single reachability check.
#[async_trait]
pub trait ReachabilityProbe: Send + Sync {
    /// Returns true if the remote accepts connections right now.
    async fn is_reachable(&self) -> bool;
}

/// Probes reachability with a short-timeout TCP connect.
#[derive(Debug, Clone)]
pub struct TcpProbe {
    address: String,
    timeout: Duration,
}

impl TcpProbe {
    /// Creates a probe for `host:port`.
    pub fn new(address: impl Into<String>, timeout: Duration) -> Self {
        Self {
            address: address.into(),
            timeout,
        }
    }

    /// Creates a probe for the configured remote.
    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        Ok(Self::new(
            config.resolve_probe_address()?,
            config.probe_timeout,
        ))
    }

    /// Returns the probed address.
    pub fn address(&self) -> &str {
        &self.address
    }
}

#[async_trait]
impl ReachabilityProbe for TcpProbe {
    async fn is_reachable(&self) -> bool {
        match tokio::time::timeout(self.timeout, TcpStream::connect(&self.address)).await {
            Ok(Ok(_stream)) => true,
            Ok(Err(e)) => {
                debug!(address = %self.address, error = %e, "probe failed");
                false
            }
            Err(_) => {
                debug!(address = %self.address, "probe timed out");
                false
            }
        }
    }
}

struct ProbeTask {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

/// Periodically probes the remote and publishes reachability.
///
/// The published value starts as `false` and only changes when a probe
/// result differs from the previous one, so subscribers never see the
/// same value twice in a row. It lags real connectivity by at most one
/// probe interval.
pub struct ConnectivityProber {
    probe: Arc<dyn ReachabilityProbe>,
    interval: Duration,
    available: Arc<watch::Sender<bool>>,
    task: Mutex<Option<ProbeTask>>,
}

impl ConnectivityProber {
    /// Creates a prober around `probe`, ticking every `interval`.
    pub fn new(probe: Arc<dyn ReachabilityProbe>, interval: Duration) -> Self {
        let (available, _) = watch::channel(false);
        Self {
            probe,
            interval,
            available: Arc::new(available),
            task: Mutex::new(None),
        }
    }

    /// Creates a TCP prober for the configured remote.
    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        Ok(Self::new(
            Arc::new(TcpProbe::from_config(config)?),
            config.probe_interval,
        ))
    }

    /// Runs one probe now. Does not touch the published value.
    pub async fn is_reachable_now(&self) -> bool {
        self.probe.is_reachable().await
    }

    /// Returns the last published reachability.
    pub fn is_available(&self) -> bool {
        *self.available.borrow()
    }

    /// Subscribes to reachability changes.
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.available.subscribe()
    }

    /// Returns true while the probe loop is running.
    pub fn is_monitoring(&self) -> bool {
        self.task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Starts the probe loop. Calling it while already running is a no-op.
    ///
    /// One probe runs before this returns, so the published value reflects
    /// the current state once the call completes. Must be called from
    /// within a Tokio runtime.
    pub async fn start_monitoring(&self) {
        if self.is_monitoring() {
            return;
        }

        let reachable = self.probe.is_reachable().await;
        publish(&self.available, reachable);

        let mut task = self.task.lock();
        if task.as_ref().is_some_and(|t| !t.handle.is_finished()) {
            return;
        }

        let (stop, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(probe_loop(
            Arc::clone(&self.probe),
            self.interval,
            Arc::clone(&self.available),
            stop_rx,
        ));
        *task = Some(ProbeTask { stop, handle });
        info!(interval_ms = self.interval.as_millis() as u64, "connectivity monitoring started");
    }

    /// Stops the probe loop, cancelling its pending wait.
    pub fn stop_monitoring(&self) {
        if let Some(task) = self.task.lock().take() {
            let _ = task.stop.send(());
            info!("connectivity monitoring stopped");
        }
    }
}

impl Drop for ConnectivityProber {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            let _ = task.stop.send(());
        }
    }
}

/// Publishes `reachable` if it differs from the current value.
fn publish(available: &watch::Sender<bool>, reachable: bool) -> bool {
    let changed = available.send_if_modified(|current| {
        if *current == reachable {
            false
        } else {
            *current = reachable;
            true
        }
    });
    if changed {
        info!(reachable, "connectivity changed");
    }
    changed
}

async fn probe_loop(
    probe: Arc<dyn ReachabilityProbe>,
    interval: Duration,
    available: Arc<watch::Sender<bool>>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = tokio::time::sleep(interval) => {}
        }
        let reachable = tokio::select! {
            _ = &mut stop => break,
            reachable = probe.is_reachable() => reachable,
        };
        publish(&available, reachable);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    #[derive(Default)]
    struct Switch {
        up: AtomicBool,
        probes: AtomicUsize,
    }

    impl Switch {
        fn set(&self, up: bool) {
            self.up.store(up, Ordering::SeqCst);
        }

        fn probes(&self) -> usize {
            self.probes.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ReachabilityProbe for Switch {
        async fn is_reachable(&self) -> bool {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.up.load(Ordering::SeqCst)
        }
    }

    const TICK: Duration = Duration::from_millis(10);

    #[tokio::test]
    async fn tcp_probe_detects_listener() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        let probe = TcpProbe::new(address.clone(), Duration::from_millis(500));
        assert!(probe.is_reachable().await);

        drop(listener);
        let probe = TcpProbe::new(address, Duration::from_millis(500));
        assert!(!probe.is_reachable().await);
    }

    #[tokio::test]
    async fn start_publishes_initial_state() {
        let switch = Arc::new(Switch::default());
        switch.set(true);
        let prober = ConnectivityProber::new(switch.clone(), TICK);
        assert!(!prober.is_available());

        prober.start_monitoring().await;
        assert!(prober.is_available());
        assert!(prober.is_monitoring());
        prober.stop_monitoring();
    }

    #[tokio::test]
    async fn changes_are_published_once() {
        let switch = Arc::new(Switch::default());
        let prober = ConnectivityProber::new(switch.clone(), TICK);
        let mut rx = prober.subscribe();
        prober.start_monitoring().await;
        assert!(!rx.has_changed().unwrap());

        switch.set(true);
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .unwrap()
            .unwrap();
        assert!(*rx.borrow_and_update());

        // Many more ticks with the same value publish nothing.
        tokio::time::sleep(TICK * 8).await;
        assert!(!rx.has_changed().unwrap());
        prober.stop_monitoring();
    }

    #[tokio::test]
    async fn start_twice_runs_one_loop() {
        let switch = Arc::new(Switch::default());
        let prober = ConnectivityProber::new(switch.clone(), TICK);
        prober.start_monitoring().await;
        prober.start_monitoring().await;

        prober.stop_monitoring();
        assert!(!prober.is_monitoring());
        tokio::time::sleep(TICK * 3).await;
        let after_stop = switch.probes();
        tokio::time::sleep(TICK * 5).await;
        assert_eq!(switch.probes(), after_stop);
    }

    #[tokio::test]
    async fn stopped_prober_publishes_nothing() {
        let switch = Arc::new(Switch::default());
        let prober = ConnectivityProber::new(switch.clone(), TICK);
        let mut rx = prober.subscribe();
        prober.start_monitoring().await;
        prober.stop_monitoring();

        switch.set(true);
        tokio::time::sleep(TICK * 5).await;
        assert!(!rx.has_changed().unwrap());
        assert!(!prober.is_available());

        prober.start_monitoring().await;
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update());
        prober.stop_monitoring();
    }

    #[tokio::test]
    async fn is_reachable_now_does_not_publish() {
        let switch = Arc::new(Switch::default());
        switch.set(true);
        let prober = ConnectivityProber::new(switch, TICK);
        assert!(prober.is_reachable_now().await);
        assert!(!prober.is_available());
    }
}
