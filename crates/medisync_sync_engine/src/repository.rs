//! Local-first CRUD for one entity type.
//!
//! The repository is what the application writes through. When the remote
//! is reachable a mutation is applied there first; otherwise, or on a
//! network failure, it is staged locally with a pending status for the
//! next sync session.

use crate::connectivity::ConnectivityProber;
use crate::error::{SyncError, SyncResult};
use crate::gateway::RemoteGateway;
use medisync_model::{is_temporary_key, RecordKey, SyncRecord, SyncStatus};
use medisync_store::{LocalDelete, RecordStore};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Local-first CRUD over a store, a gateway and the connectivity signal.
pub struct EntityRepository<R, G: ?Sized, S: ?Sized> {
    gateway: Arc<G>,
    store: Arc<S>,
    prober: Arc<ConnectivityProber>,
    _record: PhantomData<fn() -> R>,
}

impl<R, G, S> EntityRepository<R, G, S>
where
    R: SyncRecord,
    G: RemoteGateway<R> + ?Sized,
    S: RecordStore<R> + ?Sized,
{
    /// Creates a repository.
    pub fn new(gateway: Arc<G>, store: Arc<S>, prober: Arc<ConnectivityProber>) -> Self {
        Self {
            gateway,
            store,
            prober,
            _record: PhantomData,
        }
    }

    /// Returns the store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Uses the published signal while monitoring runs, a fresh probe
    /// otherwise.
    async fn remote_reachable(&self) -> bool {
        if self.prober.is_monitoring() {
            self.prober.is_available()
        } else {
            self.prober.is_reachable_now().await
        }
    }

    /// Creates a record.
    ///
    /// Returns the stored record: `SYNCED` with the remote key if the
    /// remote accepted it, or `PENDING_CREATE` with a temporary key if the
    /// remote could not be reached. A record whose parent has not reached
    /// the remote yet is always staged locally.
    ///
    /// # Errors
    ///
    /// A remote rejection is returned and nothing is stored.
    pub async fn create(&self, record: R) -> SyncResult<R> {
        let parent_is_local = record.parent_key().is_some_and(is_temporary_key);
        if !parent_is_local && self.remote_reachable().await {
            match self.gateway.create(&record).await {
                Ok(remote) => {
                    let remote = remote.with_status(SyncStatus::Synced);
                    self.store.store_synced(remote.clone())?;
                    return Ok(remote);
                }
                Err(e) if e.is_retryable() => {
                    debug!(entity = %R::KIND, error = %e, "remote create failed; staging locally");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(self.store.stage_create(record)?)
    }

    /// Updates a record.
    ///
    /// The edit is staged first. If the record was synced and the remote is
    /// reachable, the update is pushed at once.
    ///
    /// # Errors
    ///
    /// Fails for unknown or soft-deleted keys. A remote rejection is
    /// returned and the edit stays pending. A remote 404 drops the row and
    /// returns [`SyncError::NotFound`].
    pub async fn update(&self, record: R) -> SyncResult<R> {
        let key = record.key();
        let was_synced = self
            .store
            .get_by_id(key)?
            .is_some_and(|current| current.status() == SyncStatus::Synced);
        let staged = self.store.stage_update(record)?;
        if !was_synced || !self.remote_reachable().await {
            return Ok(staged);
        }

        match self.gateway.update(key, &staged).await {
            Ok(mut remote) => {
                remote.set_key(key);
                let remote = remote.with_status(SyncStatus::Synced);
                self.store.store_synced(remote.clone())?;
                Ok(remote)
            }
            Err(SyncError::NotFound { .. }) => {
                self.store.hard_delete(key)?;
                Err(SyncError::NotFound { key: Some(key) })
            }
            Err(e) if e.is_retryable() => {
                debug!(entity = %R::KIND, key, error = %e, "remote update failed; left pending");
                Ok(staged)
            }
            Err(e) => Err(e),
        }
    }

    /// Deletes a record.
    ///
    /// A record that was never pushed is removed without contacting the
    /// remote. Anything else is soft-deleted and, if the remote is
    /// reachable, deleted there at once; the row is gone when that
    /// succeeds. Returns what happened locally.
    pub async fn delete(&self, key: RecordKey) -> SyncResult<LocalDelete> {
        let outcome = self.store.stage_delete(key)?;
        if outcome == LocalDelete::Discarded || !self.remote_reachable().await {
            return Ok(outcome);
        }

        match self.gateway.delete(key).await {
            Ok(()) | Err(SyncError::NotFound { .. }) => {
                self.store.hard_delete(key)?;
                Ok(outcome)
            }
            Err(e) if e.is_retryable() => {
                debug!(entity = %R::KIND, key, error = %e, "remote delete failed; left pending");
                Ok(outcome)
            }
            Err(e) => Err(e),
        }
    }

    /// Returns every visible record.
    pub fn list(&self) -> SyncResult<Vec<R>> {
        Ok(self.store.get_all()?)
    }

    /// Returns the visible records of one patient.
    pub fn list_by_parent(&self, parent: RecordKey) -> SyncResult<Vec<R>> {
        Ok(self.store.get_by_parent(parent)?)
    }

    /// Returns a visible record.
    pub fn get(&self, key: RecordKey) -> SyncResult<Option<R>> {
        Ok(self
            .store
            .get_by_id(key)?
            .filter(|record| record.status() != SyncStatus::PendingDelete))
    }
}
