//! Local-first CRUD through the entity repository.

use medisync_model::{Diagnosis, Patient, SyncRecord, SyncStatus};
use medisync_store::{InMemoryStore, LocalDelete, RecordStore};
use medisync_sync_engine::{ConnectivityProber, EntityRepository, SyncError};
use medisync_testkit::prelude::*;
use std::sync::Arc;

struct Fixture {
    lane: Lane<Patient>,
    probe: Arc<ScriptedProbe>,
    repository: EntityRepository<Patient, MockGateway<Patient>, InMemoryStore<Patient>>,
}

fn fixture(reachable: bool) -> Fixture {
    let lane = Lane::new();
    let probe = Arc::new(ScriptedProbe::new(reachable));
    let prober = Arc::new(ConnectivityProber::new(probe.clone(), TEST_PROBE_INTERVAL));
    let repository = lane.repository(&prober);
    Fixture {
        lane,
        probe,
        repository,
    }
}

#[tokio::test]
async fn online_create_is_synced_immediately() {
    let f = fixture(true);
    let created = f.repository.create(patient("Ada", "Lovelace")).await.unwrap();
    assert_eq!(created.id, FIRST_REMOTE_ID);
    assert_eq!(created.status(), SyncStatus::Synced);
    assert_eq!(f.lane.remote.rows().len(), 1);
    assert_eq!(f.repository.get(created.id).unwrap().unwrap(), created);
}

#[tokio::test]
async fn offline_create_is_staged() {
    let f = fixture(false);
    let created = f.repository.create(patient("Ada", "Lovelace")).await.unwrap();
    assert!(created.key() < 0);
    assert_eq!(created.status(), SyncStatus::PendingCreate);
    assert_eq!(f.lane.remote.call_count(), 0);
}

#[tokio::test]
async fn network_failure_on_create_stages_locally() {
    let f = fixture(true);
    f.lane.remote.set_offline(true);
    let created = f.repository.create(patient("Ada", "Lovelace")).await.unwrap();
    assert_eq!(created.status(), SyncStatus::PendingCreate);
    assert_eq!(f.lane.store.len(), 1);
}

#[tokio::test]
async fn rejected_create_stores_nothing() {
    let f = fixture(true);
    f.lane
        .remote
        .fail_nth(CallKind::Create, 1, Fault::Rejected(400, "bad date".into()));
    let err = f
        .repository
        .create(patient("Ada", "Lovelace"))
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::Rejected { status: 400, .. }));
    assert!(f.lane.store.is_empty());
}

#[tokio::test]
async fn child_of_unsynced_parent_is_staged() {
    let lane = Lane::<Diagnosis>::new();
    let prober = Arc::new(ConnectivityProber::new(
        Arc::new(ScriptedProbe::new(true)),
        TEST_PROBE_INTERVAL,
    ));
    let repository = lane.repository(&prober);

    let staged = repository.create(diagnosis(-1, "J45")).await.unwrap();
    assert_eq!(staged.status(), SyncStatus::PendingCreate);
    assert_eq!(lane.remote.call_count(), 0);
    assert_eq!(repository.list_by_parent(-1).unwrap().len(), 1);
}

#[tokio::test]
async fn online_update_of_synced_record_is_pushed() {
    let f = fixture(true);
    let mut created = f.repository.create(patient("Ada", "Lovelace")).await.unwrap();
    created.phone = Some("555-0199".into());

    let updated = f.repository.update(created).await.unwrap();
    assert_eq!(updated.status(), SyncStatus::Synced);
    assert_eq!(
        f.lane.remote.row(updated.id).unwrap().phone.as_deref(),
        Some("555-0199")
    );
}

#[tokio::test]
async fn offline_update_stays_pending() {
    let f = fixture(true);
    let mut created = f.repository.create(patient("Ada", "Lovelace")).await.unwrap();
    f.probe.set_reachable(false);
    created.notes = Some("follow up".into());

    let updated = f.repository.update(created).await.unwrap();
    assert_eq!(updated.status(), SyncStatus::PendingUpdate);
    assert_eq!(f.lane.remote.write_count(), 1);
}

#[tokio::test]
async fn update_of_pending_create_stays_local() {
    let f = fixture(false);
    let mut created = f.repository.create(patient("Ada", "Lovelace")).await.unwrap();
    f.probe.set_reachable(true);
    created.first_name = "Augusta".into();

    let updated = f.repository.update(created).await.unwrap();
    assert_eq!(updated.status(), SyncStatus::PendingCreate);
    assert_eq!(f.lane.remote.call_count(), 0);
}

#[tokio::test]
async fn update_of_vanished_record_drops_it() {
    let f = fixture(true);
    let created = f.repository.create(patient("Ada", "Lovelace")).await.unwrap();
    f.lane.remote.remove_remote(created.id);

    let err = f.repository.update(created.clone()).await.unwrap_err();
    assert!(matches!(err, SyncError::NotFound { .. }));
    assert!(f.lane.store.get_by_id(created.id).unwrap().is_none());
}

#[tokio::test]
async fn delete_of_pending_create_makes_no_remote_call() {
    let f = fixture(false);
    let created = f.repository.create(patient("Tmp", "Row")).await.unwrap();
    f.probe.set_reachable(true);

    assert_eq!(
        f.repository.delete(created.key()).await.unwrap(),
        LocalDelete::Discarded
    );
    assert!(f.lane.store.is_empty());
    assert_eq!(f.lane.remote.call_count(), 0);
}

#[tokio::test]
async fn online_delete_removes_everywhere() {
    let f = fixture(true);
    let created = f.repository.create(patient("Ada", "Lovelace")).await.unwrap();

    f.repository.delete(created.id).await.unwrap();
    assert!(f.lane.store.is_empty());
    assert!(f.lane.remote.rows().is_empty());
}

#[tokio::test]
async fn offline_delete_is_soft() {
    let f = fixture(true);
    let created = f.repository.create(patient("Ada", "Lovelace")).await.unwrap();
    f.probe.set_reachable(false);

    assert_eq!(
        f.repository.delete(created.id).await.unwrap(),
        LocalDelete::MarkedForDeletion
    );
    assert!(f.repository.get(created.id).unwrap().is_none());
    assert!(f.repository.list().unwrap().is_empty());
    assert_eq!(
        f.lane.store.get_by_id(created.id).unwrap().unwrap().status(),
        SyncStatus::PendingDelete
    );

    let err = f.repository.update(created).await.unwrap_err();
    assert!(matches!(err, SyncError::Store(_)));
}
