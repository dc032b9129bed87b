//! Property-based test generators using proptest.

use crate::remote::Fault;
use medisync_model::{Patient, RecordKey, SyncRecord, SyncStatus};
use medisync_store::RecordStore;
use proptest::prelude::*;

/// Strategy for plausible person names.
pub fn name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[A-Z][a-z]{1,11}").expect("Invalid regex")
}

/// Strategy for patients without a key.
pub fn patient_strategy() -> impl Strategy<Value = Patient> {
    (name_strategy(), name_strategy(), prop::option::of("[0-9]{3}-[0-9]{4}"))
        .prop_map(|(first, last, phone)| {
            let mut patient = Patient::new(0, first, last);
            patient.phone = phone;
            patient
        })
}

/// Strategy for faults that abort a push phase.
pub fn transient_fault_strategy() -> impl Strategy<Value = Fault> {
    prop_oneof![
        Just(Fault::ConnectionRefused),
        Just(Fault::Timeout),
        (500u16..504).prop_map(Fault::ServerError),
    ]
}

/// Strategy for faults that reject a single record.
pub fn rejection_fault_strategy() -> impl Strategy<Value = Fault> {
    prop_oneof![Just(400u16), Just(409u16), Just(422u16)]
        .prop_map(|status| Fault::Rejected(status, "scripted rejection".into()))
}

/// A local mutation applied through the store's lifecycle helpers.
#[derive(Debug, Clone)]
pub enum LocalEdit {
    /// Create a new patient offline.
    Create(Patient),
    /// Rename the n-th visible patient (modulo the count).
    Rename(usize, String),
    /// Delete the n-th visible patient (modulo the count).
    Delete(usize),
}

/// Strategy for a single local mutation.
pub fn local_edit_strategy() -> impl Strategy<Value = LocalEdit> {
    prop_oneof![
        patient_strategy().prop_map(LocalEdit::Create),
        (0usize..32, name_strategy()).prop_map(|(i, name)| LocalEdit::Rename(i, name)),
        (0usize..32).prop_map(LocalEdit::Delete),
    ]
}

/// Strategy for a sequence of local mutations.
pub fn local_edits_strategy(max: usize) -> impl Strategy<Value = Vec<LocalEdit>> {
    prop::collection::vec(local_edit_strategy(), 0..max)
}

/// Applies `edits` to `store` the way the application would.
pub fn apply_edits<S>(store: &S, edits: &[LocalEdit])
where
    S: RecordStore<Patient> + ?Sized,
{
    for edit in edits {
        let visible = store.get_all().expect("store read failed");
        match edit {
            LocalEdit::Create(patient) => {
                store
                    .stage_create(patient.clone())
                    .expect("stage_create failed");
            }
            LocalEdit::Rename(i, name) if !visible.is_empty() => {
                let mut record = visible[i % visible.len()].clone();
                record.last_name = name.clone();
                store.stage_update(record).expect("stage_update failed");
            }
            LocalEdit::Delete(i) if !visible.is_empty() => {
                let key = visible[i % visible.len()].key();
                store.stage_delete(key).expect("stage_delete failed");
            }
            _ => {}
        }
    }
}

/// Returns the keys of `records` with the given status.
pub fn keys_with_status<R: SyncRecord>(records: &[R], status: SyncStatus) -> Vec<RecordKey> {
    records
        .iter()
        .filter(|r| r.status() == status)
        .map(SyncRecord::key)
        .collect()
}
