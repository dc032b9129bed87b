//! # MediSync Sync Engine
//!
//! Offline-first synchronization between local record stores and a REST
//! service.
//!
//! This crate provides:
//! - Connectivity prober (periodic TCP reachability checks)
//! - REST gateway over an abstract HTTP client
//! - Generic per-entity synchronizer (push-then-pull)
//! - Session coordinator with a single in-progress guard
//! - Entity repository applying the local record lifecycle
//!
//! ## Architecture
//!
//! The engine implements a **push-then-pull** model per entity type:
//! 1. Push pending creates, then updates, then deletes, in creation order
//! 2. If no push hit a network failure, pull a fresh snapshot
//! 3. Replace local synced rows with the snapshot; pending rows are kept
//!
//! The coordinator runs entity types in dependency order (patients first)
//! and publishes the overall state through `tokio::sync::watch` channels.
//!
//! ## Key Invariants
//!
//! - At most one session runs at a time
//! - A record only becomes `SYNCED` after its own push succeeded
//! - Each record's push is atomic: it advances or stays as it was
//! - Network failures abort the push phase; rejections skip one record
//! - Sessions never return errors; failures surface as state and reports

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod connectivity;
mod coordinator;
mod error;
mod gateway;
mod http;
mod repository;
mod state;
mod synchronizer;

pub use config::SyncConfig;
pub use connectivity::{ConnectivityProber, ReachabilityProbe, TcpProbe};
pub use coordinator::{CoordinatorStats, SyncCoordinator};
pub use error::{FailureClass, SyncError, SyncResult};
pub use gateway::{RemoteGateway, RestGateway};
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, ReqwestClient};
pub use repository::EntityRepository;
pub use state::{OverallSyncState, SessionOutcome, SessionReport};
pub use synchronizer::{
    EntityReport, EntitySync, EntitySynchronizer, KeyRemap, PushAbort, RejectedRecord,
};
