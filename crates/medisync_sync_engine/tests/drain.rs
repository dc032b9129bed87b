//! Property tests: a healthy remote drains every pending record.

use medisync_model::{Patient, RecordKey, SyncRecord};
use medisync_store::{InMemoryStore, RecordStore};
use medisync_sync_engine::EntitySync;
use medisync_testkit::prelude::*;
use proptest::prelude::*;
use std::sync::Arc;

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

fn lane_with(synced: usize) -> Lane<Patient> {
    let rows: Vec<Patient> = (1..=synced as RecordKey)
        .map(|id| Patient::new(id, "Seed", format!("Row{id}")))
        .collect();
    let lane = Lane::with_store(Arc::new(InMemoryStore::with_rows(rows.clone()).unwrap()));
    lane.remote.seed(rows);
    lane
}

fn snapshot(rows: &[Patient]) -> Vec<(RecordKey, String)> {
    let mut rows: Vec<_> = rows.iter().map(|p| (p.id, p.last_name.clone())).collect();
    rows.sort();
    rows
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn healthy_remote_converges(synced in 0usize..6, edits in local_edits_strategy(24)) {
        let lane = lane_with(synced);
        apply_edits(lane.store.as_ref(), &edits);
        let sync = lane.synchronizer();

        let rt = runtime();
        prop_assert!(rt.block_on(sync.synchronize()));
        prop_assert!(sync.pending_records().unwrap().is_empty());
        prop_assert_eq!(
            snapshot(&lane.store.get_all().unwrap()),
            snapshot(&lane.remote.rows())
        );
        prop_assert!(lane.store.get_all().unwrap().iter().all(|p| p.key() > 0));

        let writes = lane.remote.write_count();
        prop_assert!(rt.block_on(sync.synchronize()));
        prop_assert_eq!(lane.remote.write_count(), writes);
    }

    #[test]
    fn transient_fault_is_recovered_next_pass(
        synced in 0usize..4,
        edits in local_edits_strategy(16),
        nth in 1usize..4,
        fault in transient_fault_strategy(),
    ) {
        let lane = lane_with(synced);
        apply_edits(lane.store.as_ref(), &edits);
        let pending_before = EntitySync::pending_count(&lane.synchronizer()).unwrap();
        lane.remote.fail_nth(CallKind::Create, nth, fault.clone());
        lane.remote.fail_nth(CallKind::Update, nth, fault.clone());
        lane.remote.fail_nth(CallKind::Delete, nth, fault);
        let sync = lane.synchronizer();

        let rt = runtime();
        let first = rt.block_on(sync.run());
        if first.aborted.is_some() {
            prop_assert!(!first.succeeded());
            prop_assert!(sync.pending_records().unwrap().len() <= pending_before);
            prop_assert!(!sync.pending_records().unwrap().is_empty());
        }

        lane.remote.clear_faults();
        prop_assert!(rt.block_on(sync.synchronize()));
        prop_assert!(sync.pending_records().unwrap().is_empty());
        prop_assert_eq!(
            snapshot(&lane.store.get_all().unwrap()),
            snapshot(&lane.remote.rows())
        );
    }
}
