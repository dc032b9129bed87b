//! A record store whose writes can be made to fail.

use medisync_model::{RecordKey, SyncRecord};
use medisync_store::{InMemoryStore, RecordStore, StoreError, StoreResult};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};

/// An [`InMemoryStore`] that fails a scripted number of writes.
///
/// Reads always succeed. A failed write leaves the rows as they were.
#[derive(Debug)]
pub struct FaultyStore<R> {
    inner: InMemoryStore<R>,
    failing: AtomicUsize,
    failed: AtomicUsize,
}

impl<R: SyncRecord> FaultyStore<R> {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            failing: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Makes the next `count` writes fail with an I/O error.
    pub fn fail_next_writes(&self, count: usize) {
        self.failing.store(count, Ordering::SeqCst);
    }

    /// Number of writes that failed so far.
    pub fn failed_writes(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    fn write<T>(&self, f: impl FnOnce(&InMemoryStore<R>) -> StoreResult<T>) -> StoreResult<T> {
        let fail = self
            .failing
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            self.failed.fetch_add(1, Ordering::SeqCst);
            return Err(StoreError::Io(io::Error::new(
                io::ErrorKind::Other,
                "scripted write failure",
            )));
        }
        f(&self.inner)
    }
}

impl<R: SyncRecord> Default for FaultyStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: SyncRecord> RecordStore<R> for FaultyStore<R> {
    fn scan(&self, filter: &dyn Fn(&R) -> bool) -> StoreResult<Vec<R>> {
        self.inner.scan(filter)
    }

    fn get_by_id(&self, key: RecordKey) -> StoreResult<Option<R>> {
        self.inner.get_by_id(key)
    }

    fn insert(&self, record: R) -> StoreResult<()> {
        self.write(|store| store.insert(record))
    }

    fn update(&self, record: R) -> StoreResult<()> {
        self.write(|store| store.update(record))
    }

    fn hard_delete(&self, key: RecordKey) -> StoreResult<bool> {
        self.write(|store| store.hard_delete(key))
    }

    fn replace_key(&self, old: RecordKey, new: RecordKey) -> StoreResult<()> {
        self.write(|store| store.replace_key(old, new))
    }

    fn complete_create(&self, old: RecordKey, remote: R) -> StoreResult<()> {
        self.write(|store| store.complete_create(old, remote))
    }

    fn next_local_key(&self) -> StoreResult<RecordKey> {
        self.inner.next_local_key()
    }

    fn replace_synced(&self, snapshot: Vec<R>, parent: Option<RecordKey>) -> StoreResult<usize> {
        self.write(|store| store.replace_synced(snapshot, parent))
    }
}
