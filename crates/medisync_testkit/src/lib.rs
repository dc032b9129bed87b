//! # MediSync Testkit
//!
//! Test utilities for MediSync.
//!
//! This crate provides:
//! - A scriptable in-memory remote ([`MockGateway`])
//! - A scriptable reachability probe ([`ScriptedProbe`])
//! - A store with scripted write failures ([`FaultyStore`])
//! - Fixtures wiring stores, remotes and a coordinator together
//! - Property-based test generators using proptest
//!
//! ## Usage
//!
//! ```rust,ignore
//! use medisync_testkit::prelude::*;
//!
//! #[tokio::test]
//! async fn offline_create_is_pushed() {
//!     let stack = TestStack::new();
//!     stack.patients.store.stage_create(patient("Ada", "Lovelace")).unwrap();
//!     assert!(stack.coordinator.synchronize_all().await);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;
pub mod probe;
pub mod remote;
pub mod store;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::probe::*;
    pub use crate::remote::*;
    pub use crate::store::*;
}

pub use fixtures::*;
pub use generators::*;
pub use probe::*;
pub use remote::*;
pub use store::*;
