//! JSON-file record store for persistent storage.

use crate::error::{StoreError, StoreResult};
use crate::store::RecordStore;
use crate::table::Table;
use fs2::FileExt;
use medisync_model::{RecordKey, SyncRecord, SyncStatus};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// One persisted row: the record plus its sync status as text.
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredRow<R> {
    sync_status: String,
    record: R,
}

/// A record store that persists one table as a JSON file.
///
/// The table lives in `<dir>/<table>.json`; rows are kept in creation
/// order. A `<table>.lock` file next to it holds an advisory exclusive
/// lock for as long as the store is open, so only one process writes a
/// table at a time.
///
/// # Durability
///
/// Every mutation rewrites the table using write-then-rename:
/// 1. Write to `<table>.json.tmp`
/// 2. Sync the temporary file to disk
/// 3. Rename it over `<table>.json`
///
/// Changes are made on a copy of the table; if writing fails, the store
/// keeps serving what is on disk.
///
/// # Validation
///
/// The `syncStatus` column is parsed when the table is loaded; an unknown
/// value fails the open with [`StoreError::InvalidStatus`] instead of being
/// silently accepted.
#[derive(Debug)]
pub struct JsonFileStore<R> {
    path: PathBuf,
    table: RwLock<Table<R>>,
    _lock_file: File,
}

impl<R: SyncRecord> JsonFileStore<R> {
    /// Opens (or creates) the table for `R` inside `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The directory cannot be created
    /// - Another process holds the table lock (returns `Locked`)
    /// - The table file is malformed or has an unknown status
    pub fn open(dir: &Path) -> StoreResult<Self> {
        fs::create_dir_all(dir)?;
        let name = R::KIND.name();

        let lock_path = dir.join(format!("{name}.lock"));
        let lock_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        if lock_file.try_lock_exclusive().is_err() {
            return Err(StoreError::Locked(lock_path));
        }

        let path = dir.join(format!("{name}.json"));
        let table = if path.exists() {
            Self::load(&path)?
        } else {
            Table::default()
        };
        tracing::debug!(table = name, rows = table.len(), "opened table");

        Ok(Self {
            path,
            table: RwLock::new(table),
            _lock_file: lock_file,
        })
    }

    /// Returns the path of the table file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> StoreResult<Table<R>> {
        let bytes = fs::read(path)?;
        let rows: Vec<StoredRow<R>> = serde_json::from_slice(&bytes)?;
        let records = rows
            .into_iter()
            .map(|row| {
                let status = row
                    .sync_status
                    .parse::<SyncStatus>()
                    .map_err(|source| StoreError::InvalidStatus {
                        table: R::KIND.name().to_string(),
                        source,
                    })?;
                Ok(row.record.with_status(status))
            })
            .collect::<StoreResult<Vec<R>>>()?;
        Table::from_rows(records)
    }

    fn persist(&self, table: &Table<R>) -> StoreResult<()> {
        let rows: Vec<StoredRow<&R>> = table
            .iter()
            .map(|record| StoredRow {
                sync_status: record.status().as_str().to_string(),
                record,
            })
            .collect();
        let data = serde_json::to_vec_pretty(&rows)?;

        let temp_path = self.path.with_extension("json.tmp");
        let mut file = File::create(&temp_path)?;
        file.write_all(&data)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    /// Runs `f` against a copy of the table under the write lock and
    /// commits the copy only once it is on disk.
    fn mutate<T>(&self, f: impl FnOnce(&mut Table<R>) -> StoreResult<T>) -> StoreResult<T> {
        let mut table = self.table.write();
        let mut staged = table.clone();
        let result = f(&mut staged)?;
        self.persist(&staged)?;
        *table = staged;
        Ok(result)
    }
}

impl<R: SyncRecord> RecordStore<R> for JsonFileStore<R> {
    fn scan(&self, filter: &dyn Fn(&R) -> bool) -> StoreResult<Vec<R>> {
        Ok(self
            .table
            .read()
            .iter()
            .filter(|record| filter(record))
            .cloned()
            .collect())
    }

    fn get_by_id(&self, key: RecordKey) -> StoreResult<Option<R>> {
        Ok(self.table.read().get(key).cloned())
    }

    fn insert(&self, record: R) -> StoreResult<()> {
        self.mutate(|table| table.insert(record))
    }

    fn update(&self, record: R) -> StoreResult<()> {
        self.mutate(|table| table.update(record))
    }

    fn hard_delete(&self, key: RecordKey) -> StoreResult<bool> {
        self.mutate(|table| Ok(table.remove(key).is_some()))
    }

    fn replace_key(&self, old: RecordKey, new: RecordKey) -> StoreResult<()> {
        self.mutate(|table| table.replace_key(old, new))
    }

    fn complete_create(&self, old: RecordKey, remote: R) -> StoreResult<()> {
        self.mutate(|table| table.complete_create(old, remote))
    }

    fn next_local_key(&self) -> StoreResult<RecordKey> {
        Ok(self.table.read().next_local_key())
    }

    fn replace_synced(&self, snapshot: Vec<R>, parent: Option<RecordKey>) -> StoreResult<usize> {
        self.mutate(|table| Ok(table.replace_synced(snapshot, parent)))
    }
}
