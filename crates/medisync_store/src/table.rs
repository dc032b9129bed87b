//! Ordered keyed table shared by the store implementations.

use crate::error::{StoreError, StoreResult};
use medisync_model::{RecordKey, SyncRecord, SyncStatus};
use std::collections::{BTreeMap, HashMap};

/// Rows keyed by record key, iterated in creation order.
///
/// Every insert takes the next sequence number; re-keying a row keeps its
/// sequence, so a record created offline keeps its place after the remote
/// assigns its real key.
#[derive(Debug, Clone)]
pub(crate) struct Table<R> {
    rows: BTreeMap<u64, R>,
    index: HashMap<RecordKey, u64>,
    next_seq: u64,
}

impl<R> Default for Table<R> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            index: HashMap::new(),
            next_seq: 0,
        }
    }
}

impl<R: SyncRecord> Table<R> {
    /// Builds a table from rows already in creation order.
    pub(crate) fn from_rows(rows: Vec<R>) -> StoreResult<Self> {
        let mut table = Self::default();
        for row in rows {
            table.insert(row)?;
        }
        Ok(table)
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &R> {
        self.rows.values()
    }

    pub(crate) fn get(&self, key: RecordKey) -> Option<&R> {
        self.index.get(&key).and_then(|seq| self.rows.get(seq))
    }

    pub(crate) fn insert(&mut self, record: R) -> StoreResult<()> {
        let key = record.key();
        if self.index.contains_key(&key) {
            return Err(StoreError::DuplicateKey(key));
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.index.insert(key, seq);
        self.rows.insert(seq, record);
        Ok(())
    }

    pub(crate) fn update(&mut self, record: R) -> StoreResult<()> {
        let key = record.key();
        let seq = *self.index.get(&key).ok_or(StoreError::NotFound(key))?;
        self.rows.insert(seq, record);
        Ok(())
    }

    pub(crate) fn remove(&mut self, key: RecordKey) -> Option<R> {
        let seq = self.index.remove(&key)?;
        self.rows.remove(&seq)
    }

    pub(crate) fn replace_key(&mut self, old: RecordKey, new: RecordKey) -> StoreResult<()> {
        if old == new {
            return self.get(old).map(|_| ()).ok_or(StoreError::NotFound(old));
        }
        if self.index.contains_key(&new) {
            return Err(StoreError::DuplicateKey(new));
        }
        let seq = self.index.remove(&old).ok_or(StoreError::NotFound(old))?;
        self.index.insert(new, seq);
        if let Some(row) = self.rows.get_mut(&seq) {
            row.set_key(new);
        }
        Ok(())
    }

    /// Re-keys the row `old` to the key of `remote` and overwrites it with
    /// `remote` as synced. Either both happen or neither does.
    pub(crate) fn complete_create(&mut self, old: RecordKey, remote: R) -> StoreResult<()> {
        let new = remote.key();
        let seq = *self.index.get(&old).ok_or(StoreError::NotFound(old))?;
        if new != old && self.index.contains_key(&new) {
            return Err(StoreError::DuplicateKey(new));
        }
        self.index.remove(&old);
        self.index.insert(new, seq);
        self.rows.insert(seq, remote.with_status(SyncStatus::Synced));
        Ok(())
    }

    /// Next temporary key: one below the smallest key in use, never above -1.
    pub(crate) fn next_local_key(&self) -> RecordKey {
        self.index.keys().copied().min().unwrap_or(0).min(0) - 1
    }

    /// Replaces synced rows with `snapshot`, keeping pending rows.
    ///
    /// With a `parent` scope only synced rows of that parent are candidates
    /// for removal. Returns the number of snapshot rows written.
    pub(crate) fn replace_synced(&mut self, snapshot: Vec<R>, parent: Option<RecordKey>) -> usize {
        let incoming: HashMap<RecordKey, R> = snapshot
            .into_iter()
            .map(|record| (record.key(), record))
            .collect();

        let stale: Vec<RecordKey> = self
            .rows
            .values()
            .filter(|row| !row.status().is_pending() && !incoming.contains_key(&row.key()))
            .filter(|row| parent.map_or(true, |p| row.parent_key() == Some(p)))
            .map(|row| row.key())
            .collect();
        for key in stale {
            self.remove(key);
        }

        let mut written = 0;
        // Insert in key order so new rows get a deterministic creation order.
        let mut incoming: Vec<R> = incoming.into_values().collect();
        incoming.sort_by_key(|record| record.key());
        for record in incoming {
            match self.get(record.key()) {
                Some(existing) if existing.status().is_pending() => {}
                Some(_) => {
                    let _ = self.update(record);
                    written += 1;
                }
                None => {
                    let _ = self.insert(record);
                    written += 1;
                }
            }
        }
        written
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medisync_model::{Diagnosis, Patient};

    #[test]
    fn iteration_follows_insert_order() {
        let mut table = Table::default();
        table.insert(Patient::new(9, "A", "A")).unwrap();
        table.insert(Patient::new(2, "B", "B")).unwrap();
        table.insert(Patient::new(5, "C", "C")).unwrap();
        let keys: Vec<_> = table.iter().map(|p| p.id).collect();
        assert_eq!(keys, vec![9, 2, 5]);
    }

    #[test]
    fn replace_key_keeps_position() {
        let mut table = Table::default();
        table.insert(Patient::new(-1, "A", "A")).unwrap();
        table.insert(Patient::new(3, "B", "B")).unwrap();
        table.replace_key(-1, 40).unwrap();
        let keys: Vec<_> = table.iter().map(|p| p.id).collect();
        assert_eq!(keys, vec![40, 3]);
        assert!(table.get(-1).is_none());
        assert_eq!(table.get(40).unwrap().id, 40);
    }

    #[test]
    fn replace_key_rejects_collision() {
        let mut table = Table::default();
        table.insert(Patient::new(-1, "A", "A")).unwrap();
        table.insert(Patient::new(3, "B", "B")).unwrap();
        assert!(matches!(
            table.replace_key(-1, 3),
            Err(StoreError::DuplicateKey(3))
        ));
    }

    #[test]
    fn complete_create_swaps_key_and_status_together() {
        let mut table = Table::default();
        table.insert(Patient::new(5, "Kept", "First")).unwrap();
        table
            .insert(Patient::new(-1, "Ada", "Lovelace").with_status(SyncStatus::PendingCreate))
            .unwrap();

        table
            .complete_create(-1, Patient::new(1000, "Ada", "Lovelace"))
            .unwrap();

        let keys: Vec<_> = table.iter().map(|p| p.id).collect();
        assert_eq!(keys, vec![5, 1000]);
        assert!(table.get(-1).is_none());
        assert_eq!(table.get(1000).unwrap().status(), SyncStatus::Synced);
    }

    #[test]
    fn failed_complete_create_leaves_row_untouched() {
        let mut table = Table::default();
        table.insert(Patient::new(5, "Taken", "Key")).unwrap();
        table
            .insert(Patient::new(-1, "Ada", "Lovelace").with_status(SyncStatus::PendingCreate))
            .unwrap();

        assert!(matches!(
            table.complete_create(-1, Patient::new(5, "Ada", "Lovelace")),
            Err(StoreError::DuplicateKey(5))
        ));
        assert_eq!(table.get(-1).unwrap().status(), SyncStatus::PendingCreate);
        assert_eq!(table.get(5).unwrap().first_name, "Taken");
    }

    #[test]
    fn local_keys_stay_below_existing() {
        let mut table: Table<Patient> = Table::default();
        assert_eq!(table.next_local_key(), -1);
        table.insert(Patient::new(12, "A", "A")).unwrap();
        assert_eq!(table.next_local_key(), -1);
        table.insert(Patient::new(-3, "B", "B")).unwrap();
        assert_eq!(table.next_local_key(), -4);
    }

    #[test]
    fn replace_synced_preserves_pending_rows() {
        let mut table = Table::default();
        table.insert(Patient::new(1, "Old", "Synced")).unwrap();
        table.insert(Patient::new(2, "Gone", "Remotely")).unwrap();
        table
            .insert(Patient::new(3, "Local", "Edit").with_status(SyncStatus::PendingUpdate))
            .unwrap();

        let written = table.replace_synced(
            vec![
                Patient::new(1, "New", "Synced"),
                Patient::new(3, "Remote", "Edit"),
                Patient::new(4, "Brand", "New"),
            ],
            None,
        );

        assert_eq!(written, 2);
        assert_eq!(table.get(1).unwrap().first_name, "New");
        assert!(table.get(2).is_none());
        assert_eq!(table.get(3).unwrap().first_name, "Local");
        assert_eq!(table.get(4).unwrap().status(), SyncStatus::Synced);
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn scoped_replace_leaves_other_parents() {
        let mut table = Table::default();
        table.insert(Diagnosis::new(1, 10, "E11", "Diabetes")).unwrap();
        table.insert(Diagnosis::new(2, 20, "I10", "Hypertension")).unwrap();

        table.replace_synced(vec![Diagnosis::new(3, 10, "J45", "Asthma")], Some(10));

        assert!(table.get(1).is_none());
        assert!(table.get(2).is_some());
        assert!(table.get(3).is_some());
    }
}
