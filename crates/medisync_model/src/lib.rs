//! # MediSync Model
//!
//! Record types and synchronization status for MediSync.
//!
//! This crate provides:
//! - [`SyncStatus`], the closed per-record status enum
//! - [`EntityKind`], the entity types in dependency order
//! - [`SyncRecord`], the capability interface every synchronized record implements
//! - Concrete records: [`Patient`], [`Diagnosis`], [`Medication`], [`Event`],
//!   [`CarePlan`] and [`AuditEvent`]
//!
//! This is a pure data crate with no I/O operations.
//!
//! ## Wire format
//!
//! Records serialize to camelCase JSON. The sync status is local-only
//! state and is never part of the serialized record; stores persist it
//! alongside the record and validate it when reading back.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod entities;
mod error;
mod kind;
mod record;
mod status;

pub use entities::{AuditEvent, CarePlan, Diagnosis, Event, Goal, Measure, Medication, Patient};
pub use error::{ModelError, ModelResult};
pub use kind::EntityKind;
pub use record::{is_temporary_key, RecordKey, SyncRecord};
pub use status::SyncStatus;
