//! Synchronization coordinator.
//!
//! The coordinator owns the overall sync state. It runs every registered
//! [`EntitySync`] in entity order, allows at most one session at a time,
//! and reacts to connectivity changes published by the
//! [`ConnectivityProber`].
//!
//! # State machine
//!
//! ```text
//! IDLE --(available | manual)--> SYNCING --(all ok)--> COMPLETED
//!                                SYNCING --(failure)--> FAILED
//! any  --(connectivity lost)--> OFFLINE --(restored)--> SYNCING
//! ```
//!
//! Status publications carry a generation. Losing connectivity bumps it,
//! and a session only publishes its final state if the generation is the
//! one it started under, so a session finishing after the remote went
//! away cannot hide the `OFFLINE` state.

use crate::connectivity::ConnectivityProber;
use crate::error::SyncResult;
use crate::state::{OverallSyncState, SessionOutcome, SessionReport};
use crate::synchronizer::{EntityReport, EntitySync, KeyRemap};
use chrono::{DateTime, Utc};
use medisync_model::EntityKind;
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Counters about sessions run by a coordinator.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorStats {
    /// Sessions that acquired the guard.
    pub sessions_started: u64,
    /// Sessions that ended `COMPLETED`.
    pub sessions_completed: u64,
    /// Sessions that ended `FAILED`, panics included.
    pub sessions_failed: u64,
    /// Sessions that found the remote unreachable.
    pub sessions_offline: u64,
    /// Calls refused because a session was already running.
    pub sessions_skipped: u64,
    /// Sessions whose final state was discarded as stale.
    pub stale_results: u64,
}

/// Clears the in-progress flag when dropped, panics included.
struct SessionGuard {
    inner: Arc<Inner>,
}

impl SessionGuard {
    fn acquire(inner: &Arc<Inner>) -> Option<Self> {
        inner
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self {
                inner: Arc::clone(inner),
            })
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.inner.in_progress.store(false, Ordering::Release);
    }
}

struct MonitorTask {
    stop: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

struct Inner {
    prober: Arc<ConnectivityProber>,
    synchronizers: Vec<Arc<dyn EntitySync>>,
    in_progress: AtomicBool,
    resync_requested: AtomicBool,
    status: watch::Sender<OverallSyncState>,
    last_sync: watch::Sender<Option<DateTime<Utc>>>,
    generation: Mutex<u64>,
    last_session: RwLock<Option<SessionReport>>,
    stats: RwLock<CoordinatorStats>,
    monitoring: AtomicBool,
    monitor: Mutex<Option<MonitorTask>>,
}

impl Inner {
    /// Publishes `SYNCING` and returns the session's generation.
    fn begin_session(&self) -> u64 {
        let mut generation = self.generation.lock();
        *generation += 1;
        self.status.send_replace(OverallSyncState::Syncing);
        *generation
    }

    /// Records a finished session and publishes its final state unless a
    /// newer publication superseded it.
    ///
    /// The report and counters are stored before the state is sent, so a
    /// subscriber woken by the final state always finds this session's
    /// report. Returns whether the state was published.
    fn finish_session(&self, generation: u64, mut report: SessionReport) -> bool {
        let current = self.generation.lock();
        let published = *current == generation;
        report.published = published;
        let state = report.outcome.state();
        {
            let mut stats = self.stats.write();
            match report.outcome {
                SessionOutcome::Completed => stats.sessions_completed += 1,
                SessionOutcome::Failed => stats.sessions_failed += 1,
                SessionOutcome::Offline => stats.sessions_offline += 1,
            }
            if !published {
                stats.stale_results += 1;
            }
        }
        *self.last_session.write() = Some(report);
        if published {
            self.status.send_replace(state);
        }
        published
    }

    fn publish_offline(&self) {
        let mut generation = self.generation.lock();
        *generation += 1;
        self.status.send_replace(OverallSyncState::Offline);
    }

    async fn run_entities(&self) -> Vec<EntityReport> {
        let mut reports = Vec::with_capacity(self.synchronizers.len());
        let mut remaps: Vec<KeyRemap> = Vec::new();
        for synchronizer in &self.synchronizers {
            if !remaps.is_empty() {
                if let Err(e) = synchronizer.apply_parent_remaps(&remaps) {
                    warn!(entity = %synchronizer.kind(), error = %e, "cannot re-point children");
                }
            }
            let report = synchronizer.run().await;
            if synchronizer.kind() == EntityKind::Patient {
                remaps.extend(report.remaps.iter().copied());
            }
            reports.push(report);
        }
        reports
    }

    async fn session(self: Arc<Self>, guard: SessionGuard) -> bool {
        let id = Uuid::new_v4();
        let started_at = Utc::now();
        self.stats.write().sessions_started += 1;
        let generation = self.begin_session();
        info!(session = %id, "sync session started");

        let (outcome, entities) = if !self.prober.is_reachable_now().await {
            (SessionOutcome::Offline, Vec::new())
        } else {
            let this = Arc::clone(&self);
            match tokio::spawn(async move { this.run_entities().await }).await {
                Ok(entities) => {
                    let outcome = if entities.iter().all(EntityReport::succeeded) {
                        SessionOutcome::Completed
                    } else {
                        SessionOutcome::Failed
                    };
                    (outcome, entities)
                }
                Err(e) => {
                    error!(session = %id, error = %e, "sync session panicked");
                    (SessionOutcome::Failed, Vec::new())
                }
            }
        };

        let finished_at = Utc::now();
        if outcome == SessionOutcome::Completed {
            self.last_sync.send_replace(Some(finished_at));
        }
        let published = self.finish_session(
            generation,
            SessionReport {
                id,
                started_at,
                finished_at,
                outcome,
                published: false,
                entities,
            },
        );
        if published {
            info!(session = %id, outcome = ?outcome, "sync session finished");
        } else {
            info!(session = %id, outcome = ?outcome, "sync session finished; state superseded");
        }
        drop(guard);
        if self.resync_requested.swap(false, Ordering::AcqRel) {
            debug!("connectivity came back during the session; running again");
            self.spawn_session();
        }
        outcome == SessionOutcome::Completed
    }

    /// Runs a session if none is running.
    async fn synchronize_all(self: &Arc<Self>) -> bool {
        let Some(guard) = SessionGuard::acquire(self) else {
            self.stats.write().sessions_skipped += 1;
            debug!("sync already in progress");
            return false;
        };
        // The session runs on its own task so it completes even if the
        // caller stops polling.
        let inner = Arc::clone(self);
        match tokio::spawn(inner.session(guard)).await {
            Ok(completed) => completed,
            Err(e) => {
                error!(error = %e, "sync session task failed");
                false
            }
        }
    }

    fn spawn_session(self: &Arc<Self>) {
        let inner = Arc::clone(self);
        tokio::spawn(async move {
            inner.synchronize_all().await;
        });
    }

    fn on_connectivity(self: &Arc<Self>, available: bool) {
        if available {
            if self.in_progress.load(Ordering::Acquire) {
                debug!("connectivity restored during a session");
                self.resync_requested.store(true, Ordering::Release);
            } else {
                info!("connectivity restored; starting sync");
                self.spawn_session();
            }
        } else {
            info!("connectivity lost");
            self.resync_requested.store(false, Ordering::Release);
            self.publish_offline();
        }
    }
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(task) = self.monitor.get_mut().take() {
            let _ = task.stop.send(());
        }
    }
}

async fn monitor_loop(
    inner: Weak<Inner>,
    mut available: watch::Receiver<bool>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = &mut stop => break,
            changed = available.changed() => {
                if changed.is_err() {
                    break;
                }
                let value = *available.borrow_and_update();
                let Some(coordinator) = inner.upgrade() else { break };
                coordinator.on_connectivity(value);
            }
        }
    }
}

/// Runs synchronization sessions across entity types.
///
/// Cloning is cheap; clones share the same state.
#[derive(Clone)]
pub struct SyncCoordinator {
    inner: Arc<Inner>,
}

impl SyncCoordinator {
    /// Creates a coordinator.
    ///
    /// Synchronizers run in entity order (patients first) whatever the
    /// order they are given in.
    pub fn new(prober: Arc<ConnectivityProber>, mut synchronizers: Vec<Arc<dyn EntitySync>>) -> Self {
        synchronizers.sort_by_key(|s| s.kind());
        let (status, _) = watch::channel(OverallSyncState::Idle);
        let (last_sync, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                prober,
                synchronizers,
                in_progress: AtomicBool::new(false),
                resync_requested: AtomicBool::new(false),
                status,
                last_sync,
                generation: Mutex::new(0),
                last_session: RwLock::new(None),
                stats: RwLock::new(CoordinatorStats::default()),
                monitoring: AtomicBool::new(false),
                monitor: Mutex::new(None),
            }),
        }
    }

    /// Runs a session across every entity type.
    ///
    /// Returns false without touching any state if a session is already
    /// running. Otherwise publishes `SYNCING`, then `OFFLINE` if the remote
    /// is unreachable, `COMPLETED` if every entity type synchronized, or
    /// `FAILED`. Never returns an error; a panic inside the session counts
    /// as a failure.
    pub async fn synchronize_all(&self) -> bool {
        self.inner.synchronize_all().await
    }

    /// Starts a session in the background.
    ///
    /// Does nothing if the remote is offline or a session is running.
    /// While monitoring runs, "offline" is the prober's published signal;
    /// otherwise the remote is probed first on the background task and
    /// the session only starts if it answers. Either way an offline remote
    /// never causes a `SYNCING` publication. Returns whether a background
    /// attempt was started.
    pub fn trigger_synchronization(&self) -> bool {
        let monitored = self.inner.prober.is_monitoring();
        if monitored && !self.inner.prober.is_available() {
            debug!("offline; sync not triggered");
            return false;
        }
        if self.is_synchronizing() {
            debug!("sync already in progress; not triggered");
            return false;
        }
        if monitored {
            self.inner.spawn_session();
        } else {
            let inner = Arc::clone(&self.inner);
            tokio::spawn(async move {
                if inner.prober.is_reachable_now().await {
                    inner.synchronize_all().await;
                } else {
                    debug!("remote unreachable; sync not triggered");
                }
            });
        }
        true
    }

    /// Returns true while a session holds the guard.
    pub fn is_synchronizing(&self) -> bool {
        self.inner.in_progress.load(Ordering::Acquire)
    }

    /// Starts connectivity monitoring. Calling it again is a no-op.
    ///
    /// If the remote is unreachable the state becomes `OFFLINE` at once; if
    /// it is reachable a session starts.
    pub async fn start_network_monitoring(&self) {
        if self
            .inner
            .monitoring
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        let mut available = self.inner.prober.subscribe();
        available.borrow_and_update();
        self.inner.prober.start_monitoring().await;

        let mut monitor = self.inner.monitor.lock();
        if !self.inner.monitoring.load(Ordering::Acquire) {
            // Stopped while the prober was starting.
            self.inner.prober.stop_monitoring();
            return;
        }

        let initial = *available.borrow_and_update();
        self.inner.on_connectivity(initial);

        let (stop, stop_rx) = oneshot::channel();
        let handle = tokio::spawn(monitor_loop(
            Arc::downgrade(&self.inner),
            available,
            stop_rx,
        ));
        *monitor = Some(MonitorTask { stop, handle });
        info!("network monitoring started");
    }

    /// Stops connectivity monitoring. A running session completes.
    pub fn stop_network_monitoring(&self) {
        self.inner.monitoring.store(false, Ordering::Release);
        if let Some(task) = self.inner.monitor.lock().take() {
            let _ = task.stop.send(());
            info!("network monitoring stopped");
        }
        self.inner.prober.stop_monitoring();
    }

    /// Returns true while the connectivity monitor runs.
    pub fn is_monitoring(&self) -> bool {
        self.inner
            .monitor
            .lock()
            .as_ref()
            .is_some_and(|task| !task.handle.is_finished())
    }

    /// Returns the current overall state.
    pub fn status(&self) -> OverallSyncState {
        *self.inner.status.borrow()
    }

    /// Subscribes to overall state changes.
    pub fn subscribe_status(&self) -> watch::Receiver<OverallSyncState> {
        self.inner.status.subscribe()
    }

    /// Returns when the last successful session finished.
    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        *self.inner.last_sync.borrow()
    }

    /// Subscribes to the last successful sync time.
    pub fn subscribe_last_sync(&self) -> watch::Receiver<Option<DateTime<Utc>>> {
        self.inner.last_sync.subscribe()
    }

    /// Returns the last published reachability.
    pub fn is_network_available(&self) -> bool {
        self.inner.prober.is_available()
    }

    /// Subscribes to reachability changes.
    pub fn subscribe_network(&self) -> watch::Receiver<bool> {
        self.inner.prober.subscribe()
    }

    /// Returns the prober.
    pub fn prober(&self) -> &Arc<ConnectivityProber> {
        &self.inner.prober
    }

    /// Returns the report of the most recent session.
    pub fn last_session(&self) -> Option<SessionReport> {
        self.inner.last_session.read().clone()
    }

    /// Returns session counters.
    pub fn stats(&self) -> CoordinatorStats {
        self.inner.stats.read().clone()
    }

    /// Entity kinds in the order sessions run them.
    pub fn kinds(&self) -> Vec<EntityKind> {
        self.inner.synchronizers.iter().map(|s| s.kind()).collect()
    }

    /// Number of records waiting to be pushed, per entity kind.
    pub fn pending_counts(&self) -> SyncResult<Vec<(EntityKind, usize)>> {
        self.inner
            .synchronizers
            .iter()
            .map(|s| Ok((s.kind(), s.pending_count()?)))
            .collect()
    }

    /// Total number of records waiting to be pushed.
    pub fn pending_count(&self) -> SyncResult<usize> {
        Ok(self.pending_counts()?.iter().map(|(_, n)| n).sum())
    }

    /// Discards every record not yet synced, across entity types.
    pub fn delete_unsynchronized(&self) -> SyncResult<usize> {
        let mut removed = 0;
        for synchronizer in &self.inner.synchronizers {
            removed += synchronizer.delete_unsynchronized()?;
        }
        Ok(removed)
    }

    /// Discards the records of one entity type not yet synced.
    ///
    /// Returns `None` if no synchronizer handles `kind`.
    pub fn delete_unsynchronized_for(&self, kind: EntityKind) -> SyncResult<Option<usize>> {
        self.inner
            .synchronizers
            .iter()
            .find(|s| s.kind() == kind)
            .map(|s| s.delete_unsynchronized())
            .transpose()
    }
}
