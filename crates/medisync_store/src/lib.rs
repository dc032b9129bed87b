//! # MediSync Store
//!
//! Local record stores with per-record sync status tracking.
//!
//! This crate defines the [`RecordStore`] contract the sync engine relies
//! on, plus two implementations:
//!
//! - [`InMemoryStore`] - For tests and ephemeral sessions
//! - [`JsonFileStore`] - One JSON file per table, written atomically
//!
//! ## Record lifecycle
//!
//! The provided methods on [`RecordStore`] apply the local half of the
//! status lifecycle:
//!
//! ```text
//! stage_create  ─► PENDING_CREATE (temporary negative key)
//! stage_update  ─► SYNCED → PENDING_UPDATE, pending states unchanged
//! stage_delete  ─► PENDING_CREATE → removed
//!                  SYNCED / PENDING_UPDATE → PENDING_DELETE (hidden)
//! ```
//!
//! Only the sync engine moves a record back to `SYNCED`.
//!
//! ## Example
//!
//! ```rust
//! use medisync_model::{Patient, SyncRecord, SyncStatus};
//! use medisync_store::{InMemoryStore, RecordStore};
//!
//! let store = InMemoryStore::<Patient>::new();
//! let staged = store.stage_create(Patient::new(0, "Ada", "Lovelace")).unwrap();
//! assert_eq!(staged.status(), SyncStatus::PendingCreate);
//! assert!(staged.key() < 0);
//! assert_eq!(store.pending().unwrap().len(), 1);
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod file;
mod memory;
mod store;
mod table;

pub use error::{StoreError, StoreResult};
pub use file::JsonFileStore;
pub use memory::InMemoryStore;
pub use store::{LocalDelete, RecordStore};
