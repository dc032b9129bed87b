//! Concrete record types.
//!
//! Field names follow the remote API's camelCase JSON. `sync_status` is
//! skipped by serde: it is local bookkeeping, never sent over the wire.

use crate::kind::EntityKind;
use crate::record::{RecordKey, SyncRecord};
use crate::status::SyncStatus;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

macro_rules! impl_sync_record {
    ($ty:ty, $kind:expr) => {
        impl SyncRecord for $ty {
            const KIND: EntityKind = $kind;

            fn key(&self) -> RecordKey {
                self.id
            }

            fn set_key(&mut self, key: RecordKey) {
                self.id = key;
            }

            fn status(&self) -> SyncStatus {
                self.sync_status
            }

            fn set_status(&mut self, status: SyncStatus) {
                self.sync_status = status;
            }
        }
    };
    ($ty:ty, $kind:expr, parent) => {
        impl SyncRecord for $ty {
            const KIND: EntityKind = $kind;

            fn key(&self) -> RecordKey {
                self.id
            }

            fn set_key(&mut self, key: RecordKey) {
                self.id = key;
            }

            fn status(&self) -> SyncStatus {
                self.sync_status
            }

            fn set_status(&mut self, status: SyncStatus) {
                self.sync_status = status;
            }

            fn parent_key(&self) -> Option<RecordKey> {
                Some(self.patient_id)
            }

            fn set_parent_key(&mut self, parent: RecordKey) {
                self.patient_id = parent;
            }
        }
    };
}

/// A patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Patient {
    /// Record key.
    pub id: RecordKey,
    /// Given name.
    pub first_name: String,
    /// Family name.
    pub last_name: String,
    /// Date of birth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_of_birth: Option<NaiveDate>,
    /// Administrative gender.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    /// Contact phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Local sync status.
    #[serde(skip)]
    pub sync_status: SyncStatus,
}

impl Patient {
    /// Creates a patient with only the required fields set.
    pub fn new(id: RecordKey, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id,
            first_name: first_name.into(),
            last_name: last_name.into(),
            date_of_birth: None,
            gender: None,
            phone: None,
            notes: None,
            sync_status: SyncStatus::Synced,
        }
    }

    /// Returns "First Last".
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

impl_sync_record!(Patient, EntityKind::Patient);

/// A diagnosis recorded for a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnosis {
    /// Record key.
    pub id: RecordKey,
    /// Owning patient.
    pub patient_id: RecordKey,
    /// Classification code (e.g. ICD-10).
    pub code: String,
    /// Human-readable description.
    pub description: String,
    /// Date the diagnosis was made.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosed_on: Option<NaiveDate>,
    /// Whether the condition is resolved.
    #[serde(default)]
    pub resolved: bool,
    /// Local sync status.
    #[serde(skip)]
    pub sync_status: SyncStatus,
}

impl Diagnosis {
    /// Creates an unresolved diagnosis.
    pub fn new(
        id: RecordKey,
        patient_id: RecordKey,
        code: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id,
            patient_id,
            code: code.into(),
            description: description.into(),
            diagnosed_on: None,
            resolved: false,
            sync_status: SyncStatus::Synced,
        }
    }
}

impl_sync_record!(Diagnosis, EntityKind::Diagnosis, parent);

/// A medication prescribed to a patient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Medication {
    /// Record key.
    pub id: RecordKey,
    /// Owning patient.
    pub patient_id: RecordKey,
    /// Drug name.
    pub name: String,
    /// Dose per administration, e.g. "500 mg".
    pub dosage: String,
    /// Administration frequency, e.g. "twice daily".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    /// First day of the prescription.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    /// Last day of the prescription.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    /// Local sync status.
    #[serde(skip)]
    pub sync_status: SyncStatus,
}

impl Medication {
    /// Creates a medication with no schedule.
    pub fn new(
        id: RecordKey,
        patient_id: RecordKey,
        name: impl Into<String>,
        dosage: impl Into<String>,
    ) -> Self {
        Self {
            id,
            patient_id,
            name: name.into(),
            dosage: dosage.into(),
            frequency: None,
            start_date: None,
            end_date: None,
            sync_status: SyncStatus::Synced,
        }
    }
}

impl_sync_record!(Medication, EntityKind::Medication, parent);

/// A dated entry on a patient's timeline (visit, lab result, note).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// Record key.
    pub id: RecordKey,
    /// Owning patient.
    pub patient_id: RecordKey,
    /// Short title.
    pub title: String,
    /// Event category, e.g. "visit" or "lab".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    /// Longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// When the event happened.
    pub occurred_at: DateTime<Utc>,
    /// Local sync status.
    #[serde(skip)]
    pub sync_status: SyncStatus,
}

impl Event {
    /// Creates an event.
    pub fn new(
        id: RecordKey,
        patient_id: RecordKey,
        title: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            patient_id,
            title: title.into(),
            category: None,
            description: None,
            occurred_at,
            sync_status: SyncStatus::Synced,
        }
    }
}

impl_sync_record!(Event, EntityKind::Event, parent);

/// A measurable target attached to a goal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    /// What is measured, e.g. "HbA1c".
    pub name: String,
    /// Target value.
    pub target: f64,
    /// Unit of the target value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

/// A goal within a care plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    /// Goal description.
    pub description: String,
    /// Whether the goal has been met.
    #[serde(default)]
    pub achieved: bool,
    /// Measures that track the goal.
    #[serde(default)]
    pub measures: Vec<Measure>,
}

/// A care plan. Goals and measures are nested and travel with the plan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CarePlan {
    /// Record key.
    pub id: RecordKey,
    /// Owning patient.
    pub patient_id: RecordKey,
    /// Plan title.
    pub title: String,
    /// Goals of the plan.
    #[serde(default)]
    pub goals: Vec<Goal>,
    /// Local sync status.
    #[serde(skip)]
    pub sync_status: SyncStatus,
}

impl CarePlan {
    /// Creates a plan with no goals.
    pub fn new(id: RecordKey, patient_id: RecordKey, title: impl Into<String>) -> Self {
        Self {
            id,
            patient_id,
            title: title.into(),
            goals: Vec::new(),
            sync_status: SyncStatus::Synced,
        }
    }
}

impl_sync_record!(CarePlan, EntityKind::CarePlan, parent);

/// An audit trail entry describing who did what.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// Record key.
    pub id: RecordKey,
    /// Patient the action concerned, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patient_id: Option<RecordKey>,
    /// Action name, e.g. "patient.update".
    pub action: String,
    /// User who performed the action.
    pub actor: String,
    /// When the action happened.
    pub recorded_at: DateTime<Utc>,
    /// Local sync status.
    #[serde(skip)]
    pub sync_status: SyncStatus,
}

impl AuditEvent {
    /// Creates an audit entry.
    pub fn new(
        id: RecordKey,
        action: impl Into<String>,
        actor: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            patient_id: None,
            action: action.into(),
            actor: actor.into(),
            recorded_at,
            sync_status: SyncStatus::Synced,
        }
    }
}

impl SyncRecord for AuditEvent {
    const KIND: EntityKind = EntityKind::AuditEvent;

    fn key(&self) -> RecordKey {
        self.id
    }

    fn set_key(&mut self, key: RecordKey) {
        self.id = key;
    }

    fn status(&self) -> SyncStatus {
        self.sync_status
    }

    fn set_status(&mut self, status: SyncStatus) {
        self.sync_status = status;
    }

    fn parent_key(&self) -> Option<RecordKey> {
        self.patient_id
    }

    fn set_parent_key(&mut self, parent: RecordKey) {
        self.patient_id = Some(parent);
    }
}
