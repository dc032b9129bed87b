//! The record store contract.

use crate::error::{StoreError, StoreResult};
use medisync_model::{RecordKey, SyncRecord, SyncStatus};

/// Outcome of a local delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LocalDelete {
    /// The record had never been pushed and was removed outright.
    Discarded,
    /// The record was soft-deleted and waits for a remote delete.
    MarkedForDeletion,
    /// The record was already pending deletion.
    AlreadyPending,
}

/// A keyed store of records of one entity type, tagged with sync status.
///
/// Implementations provide a handful of keyed primitives plus a filtered
/// scan; everything else, including the local status lifecycle, is built
/// on top of them. All methods take `&self` so a store can be shared
/// between the application and the sync engine behind an `Arc`.
///
/// # Invariants
///
/// - `scan` returns rows in creation order
/// - `replace_key` keeps a row's creation position
/// - `complete_create` applies its key and status change together
/// - `replace_synced` never touches pending rows
/// - Implementations must be `Send + Sync`
///
/// # Implementors
///
/// - [`super::InMemoryStore`] - For testing
/// - [`super::JsonFileStore`] - For persistent storage
pub trait RecordStore<R: SyncRecord>: Send + Sync {
    /// Returns every row matching `filter`, in creation order.
    fn scan(&self, filter: &dyn Fn(&R) -> bool) -> StoreResult<Vec<R>>;

    /// Returns the row with `key`, whatever its status.
    fn get_by_id(&self, key: RecordKey) -> StoreResult<Option<R>>;

    /// Inserts a new row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DuplicateKey`] if the key is taken.
    fn insert(&self, record: R) -> StoreResult<()>;

    /// Overwrites an existing row, status included.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if no row has the record's key.
    fn update(&self, record: R) -> StoreResult<()>;

    /// Removes a row. Returns false if it did not exist.
    fn hard_delete(&self, key: RecordKey) -> StoreResult<bool>;

    /// Changes a row's key in place.
    fn replace_key(&self, old: RecordKey, new: RecordKey) -> StoreResult<()>;

    /// Records a create confirmed by the remote.
    ///
    /// The row `old` takes the key of `remote`, its contents and status
    /// `SYNCED` in one write. On error the row is left as it was.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if `old` does not exist and
    /// [`StoreError::DuplicateKey`] if the remote key is already taken.
    fn complete_create(&self, old: RecordKey, remote: R) -> StoreResult<()>;

    /// Allocates a temporary key for a record created locally.
    fn next_local_key(&self) -> StoreResult<RecordKey>;

    /// Replaces synced rows with a fresh remote snapshot.
    ///
    /// Snapshot rows are stored as synced (insert-or-update by key). Synced
    /// rows missing from the snapshot are removed; with a `parent` scope,
    /// only synced rows of that parent are considered. Pending rows,
    /// including a pending row whose key appears in the snapshot, are left
    /// as they are. Returns the number of snapshot rows written.
    fn replace_synced(&self, snapshot: Vec<R>, parent: Option<RecordKey>) -> StoreResult<usize>;

    /// Returns every row except those with status `exclude`.
    fn get_all_except(&self, exclude: SyncStatus) -> StoreResult<Vec<R>> {
        self.scan(&|record| record.status() != exclude)
    }

    /// Returns every visible row (soft-deleted rows are hidden).
    fn get_all(&self) -> StoreResult<Vec<R>> {
        self.get_all_except(SyncStatus::PendingDelete)
    }

    /// Returns the visible rows belonging to `parent`.
    fn get_by_parent(&self, parent: RecordKey) -> StoreResult<Vec<R>> {
        self.scan(&|record| {
            record.parent_key() == Some(parent) && record.status() != SyncStatus::PendingDelete
        })
    }

    /// Returns every row whose status differs from `status`.
    fn get_by_status_not(&self, status: SyncStatus) -> StoreResult<Vec<R>> {
        self.scan(&|record| record.status() != status)
    }

    /// Returns every row with exactly `status`.
    fn get_by_status(&self, status: SyncStatus) -> StoreResult<Vec<R>> {
        self.scan(&|record| record.status() == status)
    }

    /// Returns every pending row, in creation order.
    fn pending(&self) -> StoreResult<Vec<R>> {
        self.get_by_status_not(SyncStatus::Synced)
    }

    /// Sets the status of an existing row.
    fn mark_status(&self, key: RecordKey, status: SyncStatus) -> StoreResult<()> {
        let record = self.get_by_id(key)?.ok_or(StoreError::NotFound(key))?;
        self.update(record.with_status(status))
    }

    /// Stores a record as synced, inserting or overwriting by key.
    fn store_synced(&self, record: R) -> StoreResult<()> {
        let record = record.with_status(SyncStatus::Synced);
        if self.get_by_id(record.key())?.is_some() {
            self.update(record)
        } else {
            self.insert(record)
        }
    }

    /// Stores a record created while the remote was unavailable.
    ///
    /// The record gets a temporary key and status `PENDING_CREATE`.
    fn stage_create(&self, mut record: R) -> StoreResult<R> {
        record.set_key(self.next_local_key()?);
        record.set_status(SyncStatus::PendingCreate);
        self.insert(record.clone())?;
        Ok(record)
    }

    /// Stores a local edit, advancing the status as the lifecycle requires.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown key and
    /// [`StoreError::RecordDeleted`] for a row pending deletion.
    fn stage_update(&self, mut record: R) -> StoreResult<R> {
        let key = record.key();
        let current = self.get_by_id(key)?.ok_or(StoreError::NotFound(key))?;
        if current.status() == SyncStatus::PendingDelete {
            return Err(StoreError::RecordDeleted(key));
        }
        record.set_status(current.status().after_local_edit());
        self.update(record.clone())?;
        Ok(record)
    }

    /// Applies a local delete.
    ///
    /// A record that was never pushed is removed outright; anything else is
    /// soft-deleted until the remote confirms.
    fn stage_delete(&self, key: RecordKey) -> StoreResult<LocalDelete> {
        let current = self.get_by_id(key)?.ok_or(StoreError::NotFound(key))?;
        match current.status() {
            SyncStatus::PendingCreate => {
                self.hard_delete(key)?;
                Ok(LocalDelete::Discarded)
            }
            SyncStatus::PendingDelete => Ok(LocalDelete::AlreadyPending),
            SyncStatus::Synced | SyncStatus::PendingUpdate => {
                self.update(current.with_status(SyncStatus::PendingDelete))?;
                Ok(LocalDelete::MarkedForDeletion)
            }
        }
    }

    /// Re-points every row whose parent is `old` at `new`.
    ///
    /// Returns the number of rows changed.
    fn reparent(&self, old: RecordKey, new: RecordKey) -> StoreResult<usize> {
        let children = self.scan(&|record| record.parent_key() == Some(old))?;
        let count = children.len();
        for mut child in children {
            child.set_parent_key(new);
            self.update(child)?;
        }
        Ok(count)
    }

    /// Drops every pending row. Returns the number removed.
    fn delete_unsynchronized(&self) -> StoreResult<usize> {
        let pending = self.pending()?;
        let mut removed = 0;
        for record in pending {
            if self.hard_delete(record.key())? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}
