//! Test fixtures.
//!
//! A [`Lane`] pairs a local store with a mock remote for one entity type;
//! a [`TestStack`] wires one lane per entity type to a coordinator driven
//! by a [`ScriptedProbe`].

use crate::probe::ScriptedProbe;
use crate::remote::MockGateway;
use chrono::{TimeZone, Utc};
use medisync_model::{
    AuditEvent, CarePlan, Diagnosis, Event, Medication, Patient, RecordKey, SyncRecord,
};
use medisync_store::{InMemoryStore, JsonFileStore, RecordStore};
use medisync_sync_engine::{
    ConnectivityProber, EntityRepository, EntitySync, EntitySynchronizer, ReachabilityProbe,
    SyncCoordinator,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Probe interval used by test stacks.
pub const TEST_PROBE_INTERVAL: Duration = Duration::from_millis(10);

/// A local store and its remote for one entity type.
pub struct Lane<R, S: ?Sized = InMemoryStore<R>> {
    /// Local store.
    pub store: Arc<S>,
    /// Mock remote.
    pub remote: Arc<MockGateway<R>>,
}

impl<R: SyncRecord> Lane<R> {
    /// Creates an empty in-memory lane.
    pub fn new() -> Self {
        Self::with_store(Arc::new(InMemoryStore::new()))
    }
}

impl<R: SyncRecord> Default for Lane<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R, S> Lane<R, S>
where
    R: SyncRecord,
    S: RecordStore<R> + 'static,
{
    /// Creates a lane over an existing store.
    pub fn with_store(store: Arc<S>) -> Self {
        Self {
            store,
            remote: Arc::new(MockGateway::new()),
        }
    }

    /// Creates a synchronizer over this lane.
    pub fn synchronizer(&self) -> EntitySynchronizer<R, MockGateway<R>, S> {
        EntitySynchronizer::new(Arc::clone(&self.remote), Arc::clone(&self.store))
    }

    /// Creates a repository over this lane.
    pub fn repository(&self, prober: &Arc<ConnectivityProber>) -> EntityRepository<R, MockGateway<R>, S> {
        EntityRepository::new(
            Arc::clone(&self.remote),
            Arc::clone(&self.store),
            Arc::clone(prober),
        )
    }

    /// Returns the synchronizer as a trait object for a coordinator.
    pub fn entity_sync(&self) -> Arc<dyn EntitySync> {
        Arc::new(self.synchronizer())
    }
}

/// One lane per entity type, a scripted probe and a coordinator.
pub struct TestStack {
    /// Patients.
    pub patients: Lane<Patient>,
    /// Diagnoses.
    pub diagnoses: Lane<Diagnosis>,
    /// Medications.
    pub medications: Lane<Medication>,
    /// Events.
    pub events: Lane<Event>,
    /// Care plans.
    pub care_plans: Lane<CarePlan>,
    /// Audit events.
    pub audit_events: Lane<AuditEvent>,
    /// Probe driving the prober.
    pub probe: Arc<ScriptedProbe>,
    /// Connectivity prober.
    pub prober: Arc<ConnectivityProber>,
    /// Coordinator over every lane.
    pub coordinator: SyncCoordinator,
}

impl TestStack {
    /// Creates a stack whose remote is reachable.
    pub fn new() -> Self {
        Self::with_reachability(true)
    }

    /// Creates a stack whose remote is unreachable.
    pub fn offline() -> Self {
        Self::with_reachability(false)
    }

    /// Creates a stack with the given initial reachability.
    pub fn with_reachability(reachable: bool) -> Self {
        let patients = Lane::new();
        let diagnoses = Lane::new();
        let medications = Lane::new();
        let events = Lane::new();
        let care_plans = Lane::new();
        let audit_events = Lane::new();
        let probe = Arc::new(ScriptedProbe::new(reachable));
        let scripted: Arc<dyn ReachabilityProbe> = probe.clone();
        let prober = Arc::new(ConnectivityProber::new(scripted, TEST_PROBE_INTERVAL));
        // Registered out of order on purpose; the coordinator sorts them.
        let coordinator = SyncCoordinator::new(
            Arc::clone(&prober),
            vec![
                audit_events.entity_sync(),
                events.entity_sync(),
                patients.entity_sync(),
                care_plans.entity_sync(),
                medications.entity_sync(),
                diagnoses.entity_sync(),
            ],
        );
        Self {
            patients,
            diagnoses,
            medications,
            events,
            care_plans,
            audit_events,
            probe,
            prober,
            coordinator,
        }
    }

    /// Makes every remote refuse connections (or accept them again).
    pub fn set_remotes_offline(&self, offline: bool) {
        self.patients.remote.set_offline(offline);
        self.diagnoses.remote.set_offline(offline);
        self.medications.remote.set_offline(offline);
        self.events.remote.set_offline(offline);
        self.care_plans.remote.set_offline(offline);
        self.audit_events.remote.set_offline(offline);
    }

    /// Total calls made to every remote.
    pub fn remote_calls(&self) -> usize {
        self.patients.remote.call_count()
            + self.diagnoses.remote.call_count()
            + self.medications.remote.call_count()
            + self.events.remote.call_count()
            + self.care_plans.remote.call_count()
            + self.audit_events.remote.call_count()
    }

    /// Total successful writes made to every remote.
    pub fn remote_writes(&self) -> usize {
        self.patients.remote.write_count()
            + self.diagnoses.remote.write_count()
            + self.medications.remote.write_count()
            + self.events.remote.write_count()
            + self.care_plans.remote.write_count()
            + self.audit_events.remote.write_count()
    }
}

impl Default for TestStack {
    fn default() -> Self {
        Self::new()
    }
}

/// File-backed stores in a temporary directory.
pub struct TempStores {
    dir: TempDir,
}

impl TempStores {
    /// Creates an empty temporary directory.
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Returns the directory path.
    pub fn path(&self) -> &std::path::Path {
        self.dir.path()
    }

    /// Opens the store for `R` in the directory.
    pub fn open<R: SyncRecord>(&self) -> Arc<JsonFileStore<R>> {
        Arc::new(JsonFileStore::open(self.dir.path()).expect("Failed to open file store"))
    }
}

impl Default for TempStores {
    fn default() -> Self {
        Self::new()
    }
}

/// A patient with no key yet.
pub fn patient(first: &str, last: &str) -> Patient {
    Patient::new(0, first, last)
}

/// A diagnosis for `patient_id` with no key yet.
pub fn diagnosis(patient_id: RecordKey, code: &str) -> Diagnosis {
    Diagnosis::new(0, patient_id, code, format!("Diagnosis {code}"))
}

/// A medication for `patient_id` with no key yet.
pub fn medication(patient_id: RecordKey, name: &str) -> Medication {
    Medication::new(0, patient_id, name, "10 mg")
}

/// An event for `patient_id` with no key yet.
pub fn event(patient_id: RecordKey, title: &str) -> Event {
    let at = Utc
        .with_ymd_and_hms(2024, 5, 1, 9, 30, 0)
        .single()
        .expect("valid timestamp");
    Event::new(0, patient_id, title, at)
}

/// A care plan for `patient_id` with no key yet.
pub fn care_plan(patient_id: RecordKey, title: &str) -> CarePlan {
    CarePlan::new(0, patient_id, title)
}

/// An audit entry with no key yet.
pub fn audit_event(action: &str) -> AuditEvent {
    AuditEvent::new(0, action, "nurse.jo", Utc::now())
}
