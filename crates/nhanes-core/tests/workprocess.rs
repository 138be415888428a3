mod common;

use nhanes_core::{
    BulkSelection, PipelineError, TransformationManager, WorkProcessTracker, builtin_registry,
};
use nhanes_model::{Cycle, Dataset, PipelineOptions, RuleId, SystemConfig, WorkProcess, WorkStatus};
use nhanes_store::{DataStore, MemoryStore};

use common::{CYCLE, FailingStore, double_age_store, normalized, raw, seed_catalog};

fn enable_auto_create(store: &dyn DataStore) {
    store
        .set_system_config(&SystemConfig {
            config_key: SystemConfig::AUTO_CREATE_WORKPROCESS.to_string(),
            config_check: true,
            config_value: String::new(),
        })
        .unwrap();
}

fn loaded_pair(store: &dyn DataStore) {
    let mut process = WorkProcess::new("DEMO", CYCLE, WorkStatus::Complete);
    process.records_raw = 2;
    process.records_normalization = 2;
    process.n_samples = 2;
    process.n_variables = 1;
    process.chk_raw = true;
    process.chk_normalization = true;
    process.time_raw = 1.5;
    store.save_work_process(&process).unwrap();
}

#[test]
fn delete_cascade_keeps_normalized_rows() {
    let (store, _) = double_age_store();
    let options = PipelineOptions::default();
    TransformationManager::new(&store, builtin_registry(), options.clone())
        .apply(None)
        .unwrap();
    loaded_pair(&store);
    let tracker = WorkProcessTracker::new(&store, &options);

    let process = tracker.set_status("DEMO", CYCLE, WorkStatus::Delete).unwrap();

    assert_eq!(process.status, WorkStatus::Pending);
    assert_eq!(process.records_raw, 0);
    assert_eq!(process.records_normalization, 0);
    assert_eq!(process.n_samples, 0);
    assert!(!process.chk_raw && !process.chk_normalization);
    assert_eq!(store.count_observations("DEMO", CYCLE, "nhanes").unwrap(), 0);
    assert_eq!(normalized(&store, "AGE_DOUBLED").len(), 2);
    assert_eq!(store.work_process("DEMO", CYCLE).unwrap().unwrap(), process);
}

#[test]
fn failed_cascade_leaves_error() {
    let store = FailingStore::failing_deletes();
    seed_catalog(&store);
    store
        .insert_observations(&[raw("DEMO", "AGE_YEARS", 1, 0, "30")])
        .unwrap();
    loaded_pair(&store);
    let options = PipelineOptions::default();
    let tracker = WorkProcessTracker::new(&store, &options);

    let err = tracker.set_status("DEMO", CYCLE, WorkStatus::Delete).unwrap_err();

    assert!(matches!(err, PipelineError::Store(_)), "{err:?}");
    let process = store.work_process("DEMO", CYCLE).unwrap().unwrap();
    assert_eq!(process.status, WorkStatus::Error);
    assert_eq!(process.records_raw, 2);
    assert_eq!(store.count_observations("DEMO", CYCLE, "nhanes").unwrap(), 1);
}

#[test]
fn set_status_on_unknown_pair_fails() {
    let store = MemoryStore::new();
    let options = PipelineOptions::default();
    let tracker = WorkProcessTracker::new(&store, &options);
    let err = tracker.set_status("DEMO", CYCLE, WorkStatus::Pending).unwrap_err();
    assert!(matches!(err, PipelineError::Configuration(_)));
}

#[test]
fn purge_allows_rerun() {
    let (store, id) = double_age_store();
    let options = PipelineOptions::default();
    let manager = TransformationManager::new(&store, builtin_registry(), options.clone());
    manager.apply(None).unwrap();
    let tracker = WorkProcessTracker::new(&store, &options);

    assert_eq!(tracker.purge_rule(id).unwrap(), 2);
    let process = store.work_process_rule(id).unwrap().unwrap();
    assert_eq!(process.status, WorkStatus::Pending);
    assert_eq!(process.attempt_count, 0);
    assert!(normalized(&store, "AGE_DOUBLED").is_empty());

    assert_eq!(manager.apply(None).unwrap().completed(), 1);
    assert_eq!(normalized(&store, "AGE_DOUBLED").len(), 2);
}

#[test]
fn mark_rules_limits_operator_statuses() {
    let (store, id) = double_age_store();
    let options = PipelineOptions::default();
    let tracker = WorkProcessTracker::new(&store, &options);

    assert_eq!(tracker.mark_rules(&[id], WorkStatus::Standby).unwrap(), 1);
    assert_eq!(
        store.work_process_rule(id).unwrap().unwrap().status,
        WorkStatus::Standby
    );
    assert!(tracker.mark_rules(&[id], WorkStatus::Error).is_err());
    assert!(tracker.mark_rules(&[RuleId::new(42)], WorkStatus::Pending).is_err());
}

#[test]
fn mark_rules_with_an_unknown_id_writes_nothing() {
    let (store, id) = double_age_store();
    let options = PipelineOptions::default();
    let tracker = WorkProcessTracker::new(&store, &options);

    let err = tracker
        .mark_rules(&[id, RuleId::new(99)], WorkStatus::Standby)
        .unwrap_err();

    assert_eq!(err.to_string(), "configuration error: rule 99 does not exist");
    assert!(store.work_process_rule(id).unwrap().is_none());
}

#[test]
fn ensure_rule_processes_creates_pending_rows() {
    let (store, id) = double_age_store();
    let options = PipelineOptions::default();
    let tracker = WorkProcessTracker::new(&store, &options);

    assert_eq!(tracker.ensure_rule_processes().unwrap(), 1);
    assert_eq!(tracker.ensure_rule_processes().unwrap(), 0);
    assert_eq!(
        store.work_process_rule(id).unwrap().unwrap().status,
        WorkStatus::Pending
    );
}

#[test]
fn registration_creates_standby_pairs_when_enabled() {
    let store = MemoryStore::new();
    let options = PipelineOptions::default();
    let tracker = WorkProcessTracker::new(&store, &options);

    tracker.register_cycle(&Cycle::new("2015-2016").unwrap()).unwrap();
    assert_eq!(tracker.register_dataset(&Dataset::new("DEMO").unwrap()).unwrap(), 0);
    assert!(store.work_processes().unwrap().is_empty());

    enable_auto_create(&store);
    assert_eq!(tracker.register_dataset(&Dataset::new("BPX").unwrap()).unwrap(), 1);
    assert_eq!(tracker.register_cycle(&Cycle::new(CYCLE).unwrap()).unwrap(), 2);
    let process = store.work_process("BPX", CYCLE).unwrap().unwrap();
    assert_eq!(process.status, WorkStatus::Standby);
    assert!(store.work_process("DEMO", "2015-2016").unwrap().is_none());
}

#[test]
fn sync_fills_the_cross_product() {
    let store = MemoryStore::new();
    seed_catalog(&store);
    store.insert_cycle(&Cycle::new("2015-2016").unwrap()).unwrap();
    loaded_pair(&store);
    let options = PipelineOptions::default();
    let tracker = WorkProcessTracker::new(&store, &options);

    // Two datasets by two cycles, one pair already tracked.
    assert_eq!(tracker.sync_work_processes().unwrap(), 3);
    assert_eq!(tracker.sync_work_processes().unwrap(), 0);
    assert_eq!(
        store.work_process("DEMO", CYCLE).unwrap().unwrap().status,
        WorkStatus::Complete
    );
}

#[test]
fn bulk_update_by_group_toggles_download() {
    let store = MemoryStore::new();
    seed_catalog(&store);
    let options = PipelineOptions::default();
    let tracker = WorkProcessTracker::new(&store, &options);
    tracker.sync_work_processes().unwrap();

    let updated = tracker
        .bulk_update(&BulkSelection::groups(["Demographics"]), WorkStatus::Pending, Some(true))
        .unwrap();

    assert_eq!(updated, 1);
    let demo = store.work_process("DEMO", CYCLE).unwrap().unwrap();
    assert_eq!(demo.status, WorkStatus::Pending);
    assert!(demo.is_download);
    let rx = store.work_process("RXQ_RX", CYCLE).unwrap().unwrap();
    assert_eq!(rx.status, WorkStatus::Standby);
    assert!(!rx.is_download);

    assert!(
        tracker
            .bulk_update(&BulkSelection::default(), WorkStatus::Delete, None)
            .is_err()
    );
}
