//! In-memory remote with scripted failures.
//!
//! [`MockGateway`] behaves like a well-behaved REST collection: it assigns
//! increasing ids (starting at 1000) on create, answers 404 for unknown
//! ids, and records every call. Faults can be scripted for the n-th call
//! of a kind, for every call touching a key, or for everything at once
//! with [`MockGateway::set_offline`].

use async_trait::async_trait;
use medisync_model::{RecordKey, SyncRecord, SyncStatus};
use medisync_sync_engine::{RemoteGateway, SyncError, SyncResult};
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// First id handed out by a fresh [`MockGateway`].
pub const FIRST_REMOTE_ID: RecordKey = 1000;

/// Gateway operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    /// `list`
    List,
    /// `list_by_parent`
    ListByParent,
    /// `get`
    Get,
    /// `create`
    Create,
    /// `update`
    Update,
    /// `delete`
    Delete,
}

impl CallKind {
    /// Returns true for calls that change remote state.
    pub fn is_write(&self) -> bool {
        matches!(self, CallKind::Create | CallKind::Update | CallKind::Delete)
    }
}

/// A scripted failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// The connection is refused.
    ConnectionRefused,
    /// The call times out.
    Timeout,
    /// The remote answers with a 5xx status.
    ServerError(u16),
    /// The remote refuses the request with a 4xx status.
    Rejected(u16, String),
    /// The remote answers 404.
    NotFound,
}

impl Fault {
    fn to_error(&self, key: Option<RecordKey>) -> SyncError {
        match self {
            Fault::ConnectionRefused => SyncError::transport_retryable("connection refused"),
            Fault::Timeout => SyncError::Timeout,
            Fault::ServerError(status) => SyncError::from_status(*status, "scripted failure", key),
            Fault::Rejected(status, message) => SyncError::from_status(*status, message.clone(), key),
            Fault::NotFound => SyncError::NotFound { key },
        }
    }
}

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Operation.
    pub kind: CallKind,
    /// Key addressed (the local key for creates, the parent for
    /// `list_by_parent`).
    pub key: Option<RecordKey>,
    /// Whether the call succeeded.
    pub ok: bool,
}

struct RemoteState<R> {
    rows: BTreeMap<RecordKey, R>,
    next_id: RecordKey,
    calls: Vec<Call>,
    counts: HashMap<CallKind, usize>,
    offline: bool,
    nth_faults: HashMap<(CallKind, usize), Fault>,
    key_faults: HashMap<RecordKey, Fault>,
}

/// In-memory [`RemoteGateway`] for tests.
pub struct MockGateway<R> {
    state: Mutex<RemoteState<R>>,
    latency: Mutex<Duration>,
    started: AtomicUsize,
}

impl<R: SyncRecord> Default for MockGateway<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: SyncRecord> MockGateway<R> {
    /// Creates an empty remote.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RemoteState {
                rows: BTreeMap::new(),
                next_id: FIRST_REMOTE_ID,
                calls: Vec::new(),
                counts: HashMap::new(),
                offline: false,
                nth_faults: HashMap::new(),
                key_faults: HashMap::new(),
            }),
            latency: Mutex::new(Duration::ZERO),
            started: AtomicUsize::new(0),
        }
    }

    /// Stores records on the remote under their own keys.
    pub fn seed(&self, records: impl IntoIterator<Item = R>) {
        let mut state = self.state.lock();
        for record in records {
            let record = record.with_status(SyncStatus::Synced);
            state.next_id = state.next_id.max(record.key() + 1);
            state.rows.insert(record.key(), record);
        }
    }

    /// Returns every remote row, ordered by key.
    pub fn rows(&self) -> Vec<R> {
        self.state.lock().rows.values().cloned().collect()
    }

    /// Returns one remote row.
    pub fn row(&self, key: RecordKey) -> Option<R> {
        self.state.lock().rows.get(&key).cloned()
    }

    /// Removes a row behind the client's back.
    pub fn remove_remote(&self, key: RecordKey) -> Option<R> {
        self.state.lock().rows.remove(&key)
    }

    /// Makes every call fail with a refused connection.
    pub fn set_offline(&self, offline: bool) {
        self.state.lock().offline = offline;
    }

    /// Fails the `nth` call (1-based) of `kind` with `fault`.
    pub fn fail_nth(&self, kind: CallKind, nth: usize, fault: Fault) {
        self.state.lock().nth_faults.insert((kind, nth), fault);
    }

    /// Fails every call addressing `key` with `fault`.
    pub fn fail_key(&self, key: RecordKey, fault: Fault) {
        self.state.lock().key_faults.insert(key, fault);
    }

    /// Removes every scripted fault.
    pub fn clear_faults(&self) {
        let mut state = self.state.lock();
        state.nth_faults.clear();
        state.key_faults.clear();
        state.offline = false;
    }

    /// Delays every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Returns every call made so far.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Number of calls that have started, including ones still waiting
    /// out the configured latency.
    pub fn started_count(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    /// Number of calls made so far, failed ones included.
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Number of successful creates, updates and deletes.
    pub fn write_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| call.ok && call.kind.is_write())
            .count()
    }

    /// Counts a call and returns the scripted fault for it, if any.
    async fn enter(&self, kind: CallKind, key: Option<RecordKey>) -> SyncResult<()> {
        self.started.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let mut state = self.state.lock();
        let nth = {
            let count = state.counts.entry(kind).or_insert(0);
            *count += 1;
            *count
        };
        let fault = if state.offline {
            Some(Fault::ConnectionRefused)
        } else if let Some(fault) = state.nth_faults.get(&(kind, nth)) {
            Some(fault.clone())
        } else {
            key.and_then(|k| state.key_faults.get(&k).cloned())
        };
        match fault {
            Some(fault) => {
                state.calls.push(Call { kind, key, ok: false });
                Err(fault.to_error(key))
            }
            None => Ok(()),
        }
    }

    fn finish<T>(&self, kind: CallKind, key: Option<RecordKey>, result: SyncResult<T>) -> SyncResult<T> {
        self.state.lock().calls.push(Call {
            kind,
            key,
            ok: result.is_ok(),
        });
        result
    }
}

#[async_trait]
impl<R: SyncRecord> RemoteGateway<R> for MockGateway<R> {
    async fn list(&self) -> SyncResult<Vec<R>> {
        self.enter(CallKind::List, None).await?;
        let rows = self.rows();
        self.finish(CallKind::List, None, Ok(rows))
    }

    async fn list_by_parent(&self, parent: RecordKey) -> SyncResult<Vec<R>> {
        self.enter(CallKind::ListByParent, Some(parent)).await?;
        let rows = self
            .rows()
            .into_iter()
            .filter(|row| row.parent_key() == Some(parent))
            .collect();
        self.finish(CallKind::ListByParent, Some(parent), Ok(rows))
    }

    async fn get(&self, key: RecordKey) -> SyncResult<Option<R>> {
        self.enter(CallKind::Get, Some(key)).await?;
        let row = self.row(key);
        self.finish(CallKind::Get, Some(key), Ok(row))
    }

    async fn create(&self, record: &R) -> SyncResult<R> {
        self.enter(CallKind::Create, Some(record.key())).await?;
        let created = {
            let mut state = self.state.lock();
            let mut created = record.clone().with_status(SyncStatus::Synced);
            created.set_key(state.next_id);
            state.next_id += 1;
            state.rows.insert(created.key(), created.clone());
            created
        };
        self.finish(CallKind::Create, Some(record.key()), Ok(created))
    }

    async fn update(&self, key: RecordKey, record: &R) -> SyncResult<R> {
        self.enter(CallKind::Update, Some(key)).await?;
        let result = {
            let mut state = self.state.lock();
            if state.rows.contains_key(&key) {
                let mut updated = record.clone().with_status(SyncStatus::Synced);
                updated.set_key(key);
                state.rows.insert(key, updated.clone());
                Ok(updated)
            } else {
                Err(SyncError::NotFound { key: Some(key) })
            }
        };
        self.finish(CallKind::Update, Some(key), result)
    }

    async fn delete(&self, key: RecordKey) -> SyncResult<()> {
        self.enter(CallKind::Delete, Some(key)).await?;
        let result = match self.state.lock().rows.remove(&key) {
            Some(_) => Ok(()),
            None => Err(SyncError::NotFound { key: Some(key) }),
        };
        self.finish(CallKind::Delete, Some(key), result)
    }
}
