//! Overall sync state and session reports.

use crate::synchronizer::EntityReport;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use uuid::Uuid;

/// The process-wide synchronization state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallSyncState {
    /// No session has run yet.
    #[default]
    Idle,
    /// A session is running.
    Syncing,
    /// The last session reconciled every entity type.
    Completed,
    /// The last session left something unresolved.
    Failed,
    /// The remote is unreachable.
    Offline,
}

impl OverallSyncState {
    /// Returns the state's display name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OverallSyncState::Idle => "IDLE",
            OverallSyncState::Syncing => "SYNCING",
            OverallSyncState::Completed => "COMPLETED",
            OverallSyncState::Failed => "FAILED",
            OverallSyncState::Offline => "OFFLINE",
        }
    }

    /// Returns true while a session is running.
    pub fn is_active(&self) -> bool {
        matches!(self, OverallSyncState::Syncing)
    }

    /// Returns true for states a session can end in.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OverallSyncState::Completed | OverallSyncState::Failed | OverallSyncState::Offline
        )
    }
}

impl fmt::Display for OverallSyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOutcome {
    /// Every entity type synchronized.
    Completed,
    /// At least one entity type failed, or the session panicked.
    Failed,
    /// The remote was unreachable when the session started.
    Offline,
}

impl SessionOutcome {
    /// The overall state this outcome maps to.
    pub fn state(&self) -> OverallSyncState {
        match self {
            SessionOutcome::Completed => OverallSyncState::Completed,
            SessionOutcome::Failed => OverallSyncState::Failed,
            SessionOutcome::Offline => OverallSyncState::Offline,
        }
    }
}

/// Summary of one synchronization session.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    /// Session identifier.
    pub id: Uuid,
    /// When the session started.
    pub started_at: DateTime<Utc>,
    /// When the session finished.
    pub finished_at: DateTime<Utc>,
    /// How the session ended.
    pub outcome: SessionOutcome,
    /// Whether the final state was published. False when connectivity was
    /// lost while the session ran.
    pub published: bool,
    /// Per-entity breakdown, in sync order.
    pub entities: Vec<EntityReport>,
}

impl SessionReport {
    /// Returns true if the session completed.
    pub fn succeeded(&self) -> bool {
        self.outcome == SessionOutcome::Completed
    }

    /// Total records pushed across entity types.
    pub fn pushed(&self) -> usize {
        self.entities.iter().map(EntityReport::pushed).sum()
    }

    /// Total records rejected across entity types.
    pub fn rejected(&self) -> usize {
        self.entities.iter().map(|e| e.rejected.len()).sum()
    }
}
