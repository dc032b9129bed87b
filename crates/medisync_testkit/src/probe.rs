//! Scriptable reachability probe.

use async_trait::async_trait;
use medisync_sync_engine::ReachabilityProbe;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// A probe whose answer is set by the test.
#[derive(Debug, Default)]
pub struct ScriptedProbe {
    reachable: AtomicBool,
    probes: AtomicUsize,
}

impl ScriptedProbe {
    /// Creates a probe answering `reachable`.
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable: AtomicBool::new(reachable),
            probes: AtomicUsize::new(0),
        }
    }

    /// Changes the answer of subsequent probes.
    pub fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Number of probes run so far.
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ReachabilityProbe for ScriptedProbe {
    async fn is_reachable(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.reachable.load(Ordering::SeqCst)
    }
}
