//! Entity kinds and their synchronization order.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The entity types MediSync mirrors.
///
/// Variants are declared in dependency order: every later kind references
/// patient ids, so patients must be reconciled first. The derived `Ord`
/// is the order in which a session synchronizes them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EntityKind {
    /// Patients.
    #[serde(rename = "patients")]
    Patient,
    /// Diagnoses attached to a patient.
    #[serde(rename = "diagnoses")]
    Diagnosis,
    /// Medications prescribed to a patient.
    #[serde(rename = "medications")]
    Medication,
    /// Timeline events for a patient.
    #[serde(rename = "events")]
    Event,
    /// Care plans with their goals and measures.
    #[serde(rename = "care_plans")]
    CarePlan,
    /// Audit trail entries.
    #[serde(rename = "audit_events")]
    AuditEvent,
}

impl EntityKind {
    /// All kinds in synchronization order.
    pub const ALL: [EntityKind; 6] = [
        EntityKind::Patient,
        EntityKind::Diagnosis,
        EntityKind::Medication,
        EntityKind::Event,
        EntityKind::CarePlan,
        EntityKind::AuditEvent,
    ];

    /// Short name used for tables, logs and the CLI.
    pub fn name(&self) -> &'static str {
        match self {
            EntityKind::Patient => "patients",
            EntityKind::Diagnosis => "diagnoses",
            EntityKind::Medication => "medications",
            EntityKind::Event => "events",
            EntityKind::CarePlan => "care_plans",
            EntityKind::AuditEvent => "audit_events",
        }
    }

    /// REST resource path, relative to the API base URL.
    pub fn resource_path(&self) -> &'static str {
        match self {
            EntityKind::Patient => "/patients",
            EntityKind::Diagnosis => "/diagnoses",
            EntityKind::Medication => "/medications",
            EntityKind::Event => "/events",
            EntityKind::CarePlan => "/care-plans",
            EntityKind::AuditEvent => "/audit-events",
        }
    }

    /// Returns true if records of this kind reference a patient.
    pub fn has_patient_parent(&self) -> bool {
        !matches!(self, EntityKind::Patient)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EntityKind {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ModelError::UnknownEntityKind(s.to_string()))
    }
}
