//! Generic entity synchronizer.
//!
//! One [`EntitySynchronizer`] reconciles one entity type. A pass pushes
//! pending creates, updates and deletes (in that order, each in creation
//! order), then pulls a fresh snapshot if no push hit a network failure.
//!
//! # Failure handling
//!
//! | Failure                         | Effect                               |
//! |---------------------------------|--------------------------------------|
//! | timeout, refused, 5xx, store    | abort the push phase, skip the pull  |
//! | 4xx other than 404              | record rejected, left unchanged      |
//! | 404 on update or delete         | row hard-deleted locally             |
//! | 404 on create                   | treated as a rejection               |
//! | create under a temporary parent | rejected without a remote call       |
//! | store failure after a create    | remote copy deleted, push aborted    |

use crate::error::{FailureClass, SyncError, SyncResult};
use crate::gateway::RemoteGateway;
use async_trait::async_trait;
use medisync_model::{is_temporary_key, EntityKind, RecordKey, SyncRecord, SyncStatus};
use medisync_store::RecordStore;
use serde::Serialize;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// A temporary key replaced by the remote-assigned key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyRemap {
    /// Key the record had locally.
    pub old: RecordKey,
    /// Key assigned by the remote.
    pub new: RecordKey,
}

/// A record the remote refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RejectedRecord {
    /// Local key of the record.
    pub key: RecordKey,
    /// Status the record was pushed with (unchanged afterwards).
    pub status: SyncStatus,
    /// Why the remote refused it.
    pub reason: String,
}

/// Why a push phase stopped early.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushAbort {
    /// Record being pushed when the failure happened, if any.
    pub key: Option<RecordKey>,
    /// The failure.
    pub reason: String,
}

/// What one synchronizer pass did.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityReport {
    /// Entity type.
    pub kind: EntityKind,
    /// Pending creates accepted by the remote.
    pub created: usize,
    /// Pending updates accepted by the remote.
    pub updated: usize,
    /// Pending deletes confirmed by the remote.
    pub deleted: usize,
    /// Updates or deletes answered with 404; the rows were dropped.
    pub vanished: usize,
    /// Records the remote refused.
    pub rejected: Vec<RejectedRecord>,
    /// Set if a network failure stopped the push phase.
    pub aborted: Option<PushAbort>,
    /// Temporary keys replaced during this pass.
    pub remaps: Vec<KeyRemap>,
    /// Rows written by the pull; `None` if the pull did not run or failed.
    pub pulled: Option<usize>,
    /// Why the pull failed.
    pub pull_error: Option<String>,
}

impl EntityReport {
    /// Creates an empty report.
    pub fn new(kind: EntityKind) -> Self {
        Self {
            kind,
            created: 0,
            updated: 0,
            deleted: 0,
            vanished: 0,
            rejected: Vec::new(),
            aborted: None,
            remaps: Vec::new(),
            pulled: None,
            pull_error: None,
        }
    }

    /// True iff every pending record was resolved and the pull succeeded.
    pub fn succeeded(&self) -> bool {
        self.aborted.is_none()
            && self.rejected.is_empty()
            && self.pull_error.is_none()
            && self.pulled.is_some()
    }

    /// Number of pending records resolved against the remote.
    pub fn pushed(&self) -> usize {
        self.created + self.updated + self.deleted + self.vanished
    }

    /// Number of remote writes attempted successfully.
    pub fn remote_writes(&self) -> usize {
        self.created + self.updated + self.deleted
    }
}

/// Result of pushing one record.
enum Pushed {
    Created(Option<KeyRemap>),
    Updated,
    Deleted,
    Vanished,
}

/// Reconciles one entity type between a store and a gateway.
pub struct EntitySynchronizer<R, G: ?Sized, S: ?Sized> {
    gateway: Arc<G>,
    store: Arc<S>,
    scope: Option<RecordKey>,
    _record: PhantomData<fn() -> R>,
}

impl<R, G, S> EntitySynchronizer<R, G, S>
where
    R: SyncRecord,
    G: RemoteGateway<R> + ?Sized,
    S: RecordStore<R> + ?Sized,
{
    /// Creates a synchronizer over the whole collection.
    pub fn new(gateway: Arc<G>, store: Arc<S>) -> Self {
        Self {
            gateway,
            store,
            scope: None,
            _record: PhantomData,
        }
    }

    /// Limits the pull to the records of one patient.
    ///
    /// The push phase still covers every pending row in the store.
    pub fn scoped(mut self, parent: RecordKey) -> Self {
        self.scope = Some(parent);
        self
    }

    /// Returns the parent scope, if any.
    pub fn scope(&self) -> Option<RecordKey> {
        self.scope
    }

    /// Returns the store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Returns every record not yet synced, in creation order.
    pub fn pending_records(&self) -> SyncResult<Vec<R>> {
        Ok(self.store.pending()?)
    }

    /// Runs a full pass and returns what it did.
    pub async fn run(&self) -> EntityReport {
        let kind = R::KIND;
        let mut report = EntityReport::new(kind);

        let pending = match self.pending_records() {
            Ok(pending) => pending,
            Err(e) => {
                warn!(entity = %kind, error = %e, "cannot read pending records");
                report.aborted = Some(PushAbort {
                    key: None,
                    reason: e.to_string(),
                });
                return report;
            }
        };
        debug!(entity = %kind, pending = pending.len(), "push started");

        'push: for phase in [
            SyncStatus::PendingCreate,
            SyncStatus::PendingUpdate,
            SyncStatus::PendingDelete,
        ] {
            for record in pending.iter().filter(|r| r.status() == phase) {
                let pushed = match phase {
                    SyncStatus::PendingCreate => self.push_create(record).await,
                    SyncStatus::PendingUpdate => self.push_update(record).await,
                    _ => self.push_delete(record).await,
                };
                match pushed {
                    Ok(Pushed::Created(remap)) => {
                        report.created += 1;
                        report.remaps.extend(remap);
                    }
                    Ok(Pushed::Updated) => report.updated += 1,
                    Ok(Pushed::Deleted) => report.deleted += 1,
                    Ok(Pushed::Vanished) => report.vanished += 1,
                    Err(e) if e.failure_class() == FailureClass::Transient => {
                        warn!(entity = %kind, key = record.key(), error = %e, "push aborted");
                        report.aborted = Some(PushAbort {
                            key: Some(record.key()),
                            reason: e.to_string(),
                        });
                        break 'push;
                    }
                    Err(e) => {
                        warn!(entity = %kind, key = record.key(), status = %phase, error = %e, "record rejected");
                        report.rejected.push(RejectedRecord {
                            key: record.key(),
                            status: phase,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        if report.aborted.is_none() {
            match self.pull().await {
                Ok(pulled) => report.pulled = Some(pulled),
                Err(e) => {
                    warn!(entity = %kind, error = %e, "pull failed");
                    report.pull_error = Some(e.to_string());
                }
            }
        }

        info!(
            entity = %kind,
            created = report.created,
            updated = report.updated,
            deleted = report.deleted,
            rejected = report.rejected.len(),
            pulled = report.pulled.unwrap_or(0),
            ok = report.succeeded(),
            "entity sync finished"
        );
        report
    }

    /// Runs a full pass. True iff everything pending was resolved and the
    /// pull succeeded.
    pub async fn synchronize(&self) -> bool {
        self.run().await.succeeded()
    }

    /// Discards every record not yet synced. Returns the number removed.
    pub fn delete_unsynchronized(&self) -> SyncResult<usize> {
        let removed = self.store.delete_unsynchronized()?;
        info!(entity = %R::KIND, removed, "discarded unsynchronized records");
        Ok(removed)
    }

    /// Re-points children of remapped parents at their new keys.
    pub fn apply_parent_remaps(&self, remaps: &[KeyRemap]) -> SyncResult<usize> {
        if !R::KIND.has_patient_parent() {
            return Ok(0);
        }
        let mut changed = 0;
        for remap in remaps {
            changed += self.store.reparent(remap.old, remap.new)?;
        }
        if changed > 0 {
            debug!(entity = %R::KIND, changed, "children re-pointed");
        }
        Ok(changed)
    }

    async fn push_create(&self, record: &R) -> SyncResult<Pushed> {
        let key = record.key();
        if let Some(parent) = record.parent_key().filter(|p| is_temporary_key(*p)) {
            return Err(SyncError::UnsyncedParent { parent });
        }
        let remote = match self.gateway.create(record).await {
            Ok(remote) => remote,
            Err(SyncError::NotFound { .. }) => {
                return Err(SyncError::Rejected {
                    status: 404,
                    message: "collection not found".into(),
                })
            }
            Err(e) => return Err(e),
        };
        let new_key = remote.key();
        if let Err(e) = self.store.complete_create(key, remote) {
            // The row is still PENDING_CREATE and will be posted again.
            warn!(entity = %R::KIND, key, remote_key = new_key, error = %e, "cannot record create; withdrawing it");
            if let Err(undo) = self.gateway.delete(new_key).await {
                warn!(entity = %R::KIND, remote_key = new_key, error = %undo, "remote create left in place");
            }
            return Err(e.into());
        }
        let remap = (new_key != key).then_some(KeyRemap { old: key, new: new_key });
        Ok(Pushed::Created(remap))
    }

    async fn push_update(&self, record: &R) -> SyncResult<Pushed> {
        let key = record.key();
        match self.gateway.update(key, record).await {
            Ok(mut remote) => {
                remote.set_key(key);
                self.store.store_synced(remote)?;
                Ok(Pushed::Updated)
            }
            Err(SyncError::NotFound { .. }) => {
                self.store.hard_delete(key)?;
                Ok(Pushed::Vanished)
            }
            Err(e) => Err(e),
        }
    }

    async fn push_delete(&self, record: &R) -> SyncResult<Pushed> {
        let key = record.key();
        match self.gateway.delete(key).await {
            Ok(()) => {
                self.store.hard_delete(key)?;
                Ok(Pushed::Deleted)
            }
            Err(SyncError::NotFound { .. }) => {
                self.store.hard_delete(key)?;
                Ok(Pushed::Vanished)
            }
            Err(e) => Err(e),
        }
    }

    async fn pull(&self) -> SyncResult<usize> {
        let snapshot = match self.scope {
            Some(parent) => self.gateway.list_by_parent(parent).await?,
            None => self.gateway.list().await?,
        };
        Ok(self.store.replace_synced(snapshot, self.scope)?)
    }
}

/// Object-safe view of a synchronizer, used by the coordinator to hold
/// synchronizers of different entity types side by side.
#[async_trait]
pub trait EntitySync: Send + Sync {
    /// Entity type this synchronizer handles.
    fn kind(&self) -> EntityKind;

    /// Runs a full pass.
    async fn run(&self) -> EntityReport;

    /// Runs a full pass and reduces it to success or failure.
    async fn synchronize(&self) -> bool {
        self.run().await.succeeded()
    }

    /// Number of records not yet synced.
    fn pending_count(&self) -> SyncResult<usize>;

    /// Discards every record not yet synced.
    fn delete_unsynchronized(&self) -> SyncResult<usize>;

    /// Re-points children of remapped parents.
    fn apply_parent_remaps(&self, remaps: &[KeyRemap]) -> SyncResult<usize>;
}

#[async_trait]
impl<R, G, S> EntitySync for EntitySynchronizer<R, G, S>
where
    R: SyncRecord,
    G: RemoteGateway<R> + ?Sized + 'static,
    S: RecordStore<R> + ?Sized + 'static,
{
    fn kind(&self) -> EntityKind {
        R::KIND
    }

    async fn run(&self) -> EntityReport {
        EntitySynchronizer::run(self).await
    }

    fn pending_count(&self) -> SyncResult<usize> {
        Ok(self.pending_records()?.len())
    }

    fn delete_unsynchronized(&self) -> SyncResult<usize> {
        EntitySynchronizer::delete_unsynchronized(self)
    }

    fn apply_parent_remaps(&self, remaps: &[KeyRemap]) -> SyncResult<usize> {
        EntitySynchronizer::apply_parent_remaps(self, remaps)
    }
}
