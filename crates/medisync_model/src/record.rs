//! The capability interface shared by every synchronized record.

use crate::kind::EntityKind;
use crate::status::SyncStatus;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Integer key of a record.
///
/// Remote-assigned keys are positive. Keys assigned locally to records
/// created while offline are negative and are replaced by the remote key
/// once the create is pushed.
pub type RecordKey = i64;

/// Returns true if `key` is a temporary, locally-assigned key.
pub fn is_temporary_key(key: RecordKey) -> bool {
    key < 0
}

/// A record that can be mirrored between the local store and the remote.
///
/// The synchronizer only needs a key, a status, and (for child entities)
/// the key of the owning patient. Everything else is opaque payload that
/// travels through serde.
pub trait SyncRecord:
    Clone + std::fmt::Debug + Send + Sync + Serialize + DeserializeOwned + 'static
{
    /// The entity kind this record type belongs to.
    const KIND: EntityKind;

    /// Returns the record key.
    fn key(&self) -> RecordKey;

    /// Replaces the record key.
    fn set_key(&mut self, key: RecordKey);

    /// Returns the sync status.
    fn status(&self) -> SyncStatus;

    /// Replaces the sync status.
    fn set_status(&mut self, status: SyncStatus);

    /// Returns the key of the parent patient, if this kind has one.
    fn parent_key(&self) -> Option<RecordKey> {
        None
    }

    /// Re-points the record at a different parent patient.
    fn set_parent_key(&mut self, _parent: RecordKey) {}

    /// Returns a copy of this record with the given status.
    fn with_status(mut self, status: SyncStatus) -> Self {
        self.set_status(status);
        self
    }
}
