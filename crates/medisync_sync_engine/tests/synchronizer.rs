//! Push-then-pull behavior of a single entity synchronizer.

use medisync_model::{Diagnosis, Patient, SyncRecord, SyncStatus};
use medisync_store::{InMemoryStore, LocalDelete, RecordStore};
use medisync_sync_engine::EntitySync;
use medisync_testkit::prelude::*;
use std::sync::Arc;

fn synced_lane(rows: Vec<Patient>) -> Lane<Patient> {
    let lane = Lane::with_store(Arc::new(InMemoryStore::with_rows(rows.clone()).unwrap()));
    lane.remote.seed(rows);
    lane
}

#[tokio::test]
async fn second_synchronize_makes_no_writes() {
    let lane = synced_lane(vec![Patient::new(1, "Grace", "Hopper")]);
    lane.store.stage_create(patient("Ada", "Lovelace")).unwrap();
    let mut edited = lane.store.get_by_id(1).unwrap().unwrap();
    edited.notes = Some("allergic to penicillin".into());
    lane.store.stage_update(edited).unwrap();

    let sync = lane.synchronizer();
    assert!(sync.synchronize().await);
    let writes = lane.remote.write_count();
    assert_eq!(writes, 2);

    assert!(sync.synchronize().await);
    assert_eq!(lane.remote.write_count(), writes);
}

#[tokio::test]
async fn offline_create_becomes_synced_with_remote_key() {
    let lane = Lane::<Patient>::new();
    let staged = lane.store.stage_create(patient("Ada", "Lovelace")).unwrap();
    assert_eq!(staged.status(), SyncStatus::PendingCreate);
    assert!(staged.key() < 0);

    let report = lane.synchronizer().run().await;
    assert!(report.succeeded());

    let rows = lane.store.get_all().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, FIRST_REMOTE_ID);
    assert_eq!(rows[0].status(), SyncStatus::Synced);
    assert!(lane.store.get_by_id(staged.key()).unwrap().is_none());
}

#[tokio::test]
async fn soft_delete_is_hidden_then_removed() {
    let lane = synced_lane(vec![Patient::new(7, "Alan", "Turing")]);
    assert_eq!(
        lane.store.stage_delete(7).unwrap(),
        LocalDelete::MarkedForDeletion
    );
    assert_eq!(
        lane.store.get_by_id(7).unwrap().unwrap().status(),
        SyncStatus::PendingDelete
    );
    assert!(lane.store.get_all().unwrap().is_empty());

    assert!(lane.synchronizer().synchronize().await);
    assert!(lane.store.get_by_id(7).unwrap().is_none());
    assert!(lane.remote.row(7).is_none());
}

#[tokio::test]
async fn create_then_delete_never_reaches_remote() {
    let lane = Lane::<Patient>::new();
    let staged = lane.store.stage_create(patient("Tmp", "Row")).unwrap();
    assert_eq!(
        lane.store.stage_delete(staged.key()).unwrap(),
        LocalDelete::Discarded
    );
    assert_eq!(lane.store.len(), 0);

    assert!(lane.synchronizer().synchronize().await);
    assert_eq!(lane.remote.write_count(), 0);
    assert!(lane
        .remote
        .calls()
        .iter()
        .all(|call| !call.kind.is_write()));
}

#[tokio::test]
async fn network_failure_aborts_remaining_pushes() {
    let lane = Lane::<Patient>::new();
    let first = lane.store.stage_create(patient("A", "One")).unwrap();
    let second = lane.store.stage_create(patient("B", "Two")).unwrap();
    let third = lane.store.stage_create(patient("C", "Three")).unwrap();
    lane.remote
        .fail_nth(CallKind::Create, 2, Fault::ConnectionRefused);

    let report = lane.synchronizer().run().await;
    assert!(!report.succeeded());
    assert_eq!(report.created, 1);
    assert_eq!(report.aborted.as_ref().unwrap().key, Some(second.key()));
    assert!(report.pulled.is_none());

    assert!(lane.store.get_by_id(first.key()).unwrap().is_none());
    assert_eq!(
        lane.store.get_by_id(FIRST_REMOTE_ID).unwrap().unwrap().status(),
        SyncStatus::Synced
    );
    for key in [second.key(), third.key()] {
        assert_eq!(
            lane.store.get_by_id(key).unwrap().unwrap().status(),
            SyncStatus::PendingCreate
        );
    }
    assert!(lane
        .remote
        .calls()
        .iter()
        .all(|call| call.kind != CallKind::List));
}

#[tokio::test]
async fn server_error_on_update_leaves_record_pending() {
    let lane = synced_lane(vec![Patient::new(3, "Mary", "Seacole")]);
    let mut edited = lane.store.get_by_id(3).unwrap().unwrap();
    edited.phone = Some("555-0101".into());
    lane.store.stage_update(edited).unwrap();
    lane.remote.fail_key(3, Fault::ServerError(503));

    assert!(!lane.synchronizer().synchronize().await);
    let row = lane.store.get_by_id(3).unwrap().unwrap();
    assert_eq!(row.status(), SyncStatus::PendingUpdate);
    assert_eq!(row.phone.as_deref(), Some("555-0101"));
}

#[tokio::test]
async fn rejection_skips_record_and_continues() {
    let lane = Lane::<Patient>::new();
    let bad = lane.store.stage_create(patient("", "Nameless")).unwrap();
    lane.store.stage_create(patient("Good", "Row")).unwrap();
    lane.remote.fail_key(
        bad.key(),
        Fault::Rejected(422, "firstName is required".into()),
    );

    let report = lane.synchronizer().run().await;
    assert!(!report.succeeded());
    assert_eq!(report.created, 1);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].key, bad.key());
    assert!(report.rejected[0].reason.contains("firstName"));
    assert!(report.pulled.is_some());

    assert_eq!(
        lane.store.get_by_id(bad.key()).unwrap().unwrap().status(),
        SyncStatus::PendingCreate
    );
    assert_eq!(lane.remote.rows().len(), 1);
}

#[tokio::test]
async fn not_found_on_update_or_delete_drops_row() {
    let lane = synced_lane(vec![
        Patient::new(1, "Gone", "Updated"),
        Patient::new(2, "Gone", "Deleted"),
    ]);
    let mut edited = lane.store.get_by_id(1).unwrap().unwrap();
    edited.first_name = "Still".into();
    lane.store.stage_update(edited).unwrap();
    lane.store.stage_delete(2).unwrap();
    lane.remote.remove_remote(1);
    lane.remote.remove_remote(2);

    let report = lane.synchronizer().run().await;
    assert!(report.succeeded());
    assert_eq!(report.vanished, 2);
    assert_eq!(lane.store.len(), 0);
}

#[tokio::test]
async fn pull_replaces_synced_rows_and_keeps_pending_ones() {
    let lane = synced_lane(vec![
        Patient::new(1, "Kept", "Local"),
        Patient::new(2, "Removed", "Remotely"),
        Patient::new(3, "Changed", "Remotely"),
    ]);
    // Local edit the remote refuses: the remote copy must not overwrite it.
    let mut edited = lane.store.get_by_id(1).unwrap().unwrap();
    edited.last_name = "Edited".into();
    lane.store.stage_update(edited).unwrap();
    lane.remote
        .fail_key(1, Fault::Rejected(409, "version conflict".into()));

    lane.remote.remove_remote(2);
    lane.remote.seed([
        Patient::new(3, "Changed", "Upstream"),
        Patient::new(4, "Brand", "New"),
    ]);

    let report = lane.synchronizer().run().await;
    assert_eq!(report.pulled, Some(2));

    let local = lane.store.get_by_id(1).unwrap().unwrap();
    assert_eq!(local.last_name, "Edited");
    assert_eq!(local.status(), SyncStatus::PendingUpdate);
    assert!(lane.store.get_by_id(2).unwrap().is_none());
    assert_eq!(lane.store.get_by_id(3).unwrap().unwrap().last_name, "Upstream");
    assert_eq!(
        lane.store.get_by_id(4).unwrap().unwrap().status(),
        SyncStatus::Synced
    );
}

#[tokio::test]
async fn scoped_pull_leaves_other_patients_alone() {
    let rows = vec![
        Diagnosis::new(10, 1, "J45", "Asthma"),
        Diagnosis::new(20, 2, "E11", "Type 2 diabetes"),
    ];
    let lane: Lane<Diagnosis> =
        Lane::with_store(Arc::new(InMemoryStore::with_rows(rows.clone()).unwrap()));
    lane.remote.seed(rows);
    lane.remote.remove_remote(20);
    lane.remote.seed([Diagnosis::new(11, 1, "I10", "Hypertension")]);

    let sync = lane.synchronizer().scoped(1);
    assert!(sync.synchronize().await);

    assert_eq!(lane.store.get_by_parent(1).unwrap().len(), 2);
    assert!(lane.store.get_by_id(20).unwrap().is_some());
    assert!(lane
        .remote
        .calls()
        .iter()
        .any(|call| call.kind == CallKind::ListByParent && call.key == Some(1)));
}

#[tokio::test]
async fn pending_records_are_in_creation_order() {
    let lane = synced_lane(vec![Patient::new(5, "Old", "Row")]);
    lane.store.stage_create(patient("First", "New")).unwrap();
    lane.store.stage_delete(5).unwrap();
    lane.store.stage_create(patient("Second", "New")).unwrap();

    let sync = lane.synchronizer();
    let pending: Vec<_> = sync
        .pending_records()
        .unwrap()
        .iter()
        .map(|p| p.first_name.clone())
        .collect();
    assert_eq!(pending, vec!["Old", "First", "Second"]);
    assert_eq!(EntitySync::pending_count(&sync).unwrap(), 3);
}

#[tokio::test]
async fn delete_unsynchronized_discards_pending_rows() {
    let lane = synced_lane(vec![Patient::new(1, "Synced", "Row")]);
    lane.store.stage_create(patient("Pending", "Create")).unwrap();
    lane.store.stage_delete(1).unwrap();

    let sync = lane.synchronizer();
    assert_eq!(sync.delete_unsynchronized().unwrap(), 2);
    assert!(sync.pending_records().unwrap().is_empty());
    assert!(lane.store.get_all().unwrap().is_empty());
}

#[tokio::test]
async fn failed_local_write_after_create_leaves_both_sides_unchanged() {
    let lane: Lane<Patient, FaultyStore<Patient>> = Lane::with_store(Arc::new(FaultyStore::new()));
    let staged = lane.store.stage_create(patient("Ada", "Lovelace")).unwrap();
    lane.store.fail_next_writes(1);

    let report = lane.synchronizer().run().await;
    assert!(!report.succeeded());
    assert_eq!(report.created, 0);
    assert_eq!(report.aborted.as_ref().unwrap().key, Some(staged.key()));
    assert_eq!(lane.store.failed_writes(), 1);

    let rows = lane.store.scan(&|_| true).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, staged.key());
    assert_eq!(rows[0].status(), SyncStatus::PendingCreate);
    assert!(lane.remote.rows().is_empty());

    assert!(lane.synchronizer().synchronize().await);
    let remote = lane.remote.rows();
    assert_eq!(remote.len(), 1);
    let rows = lane.store.scan(&|_| true).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].id, remote[0].id);
    assert_eq!(rows[0].status(), SyncStatus::Synced);
}

#[tokio::test]
async fn child_of_unsynced_parent_is_not_posted() {
    let lane = Lane::<Diagnosis>::new();
    let orphan = lane.store.stage_create(diagnosis(-4, "J45")).unwrap();
    let anchored = lane.store.stage_create(diagnosis(3, "E11")).unwrap();

    let report = lane.synchronizer().run().await;
    assert!(!report.succeeded());
    assert_eq!(report.created, 1);
    assert_eq!(report.rejected.len(), 1);
    assert_eq!(report.rejected[0].key, orphan.key());
    assert!(report.pulled.is_some());

    assert_eq!(
        lane.store.get_by_id(orphan.key()).unwrap().unwrap().status(),
        SyncStatus::PendingCreate
    );
    assert!(lane.store.get_by_id(anchored.key()).unwrap().is_none());
    assert!(lane
        .remote
        .calls()
        .iter()
        .all(|call| call.key != Some(orphan.key())));
}
