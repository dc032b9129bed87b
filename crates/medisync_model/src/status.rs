//! Per-record synchronization status.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Synchronization status of a single local record.
///
/// A [`SyncStatus::Synced`] record exists identically on both replicas as far
/// as the engine knows. Every other status means the local replica diverges
/// from the last-known remote state and the record is *pending*.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStatus {
    /// Local and remote agree.
    #[default]
    Synced,
    /// Created locally, never pushed.
    PendingCreate,
    /// Edited locally after the last successful push.
    PendingUpdate,
    /// Deleted locally; the row is kept until the remote delete succeeds.
    PendingDelete,
}

impl SyncStatus {
    /// All statuses, in declaration order.
    pub const ALL: [SyncStatus; 4] = [
        SyncStatus::Synced,
        SyncStatus::PendingCreate,
        SyncStatus::PendingUpdate,
        SyncStatus::PendingDelete,
    ];

    /// Returns the stored text form of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Synced => "SYNCED",
            SyncStatus::PendingCreate => "PENDING_CREATE",
            SyncStatus::PendingUpdate => "PENDING_UPDATE",
            SyncStatus::PendingDelete => "PENDING_DELETE",
        }
    }

    /// Returns true for every status other than [`SyncStatus::Synced`].
    pub fn is_pending(&self) -> bool {
        !matches!(self, SyncStatus::Synced)
    }

    /// Status after a local edit.
    ///
    /// A record that was never pushed stays a pending create; a soft-deleted
    /// record stays deleted.
    pub fn after_local_edit(self) -> SyncStatus {
        match self {
            SyncStatus::Synced => SyncStatus::PendingUpdate,
            other => other,
        }
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SyncStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| ModelError::UnknownSyncStatus(s.to_string()))
    }
}
