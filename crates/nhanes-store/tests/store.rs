use nhanes_model::{
    Cycle, Dataset, Observation, ObservationKey, Rule, RuleId, RuleVariable, SystemConfig,
    Variable, VariableRole, VariableType, WorkProcess, WorkProcessRule, WorkStatus,
};
use nhanes_store::{DataStore, MemoryStore, ObservationFilter, SourceScope, SqliteStore, StoreError};

fn obs(version: &str, dataset: &str, variable: &str, sample: i64, value: &str) -> Observation {
    Observation::new(
        ObservationKey::new(version, "2017-2018", dataset, sample, 0),
        variable,
        value,
    )
}

fn temp_sqlite() -> (tempfile::TempDir, SqliteStore) {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SqliteStore::open(&dir.path().join("nhanes.sqlite")).expect("open store");
    (dir, store)
}

/// Runs the same scenario against both adapters.
fn for_each_store(check: impl Fn(&dyn DataStore)) {
    check(&MemoryStore::new());
    let (_dir, sqlite) = temp_sqlite();
    check(&sqlite);
}

#[test]
fn scoped_fetch_filters_by_dataset() {
    for_each_store(|store| {
        store
            .insert_observations(&[
                obs("nhanes", "DEMO", "RIDAGEYR", 1, "20"),
                obs("nhanes", "DEMO_B", "RIDAGEYR", 1, "30"),
                obs("nhanes", "DEMO", "RIAGENDR", 1, "1"),
            ])
            .unwrap();
        let scoped = ObservationFilter::new(vec![SourceScope::new(
            "RIDAGEYR",
            Some("DEMO".to_string()),
        )]);
        let rows = store.fetch_observations(&scoped).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].value, "20");

        let any = ObservationFilter::new(vec![SourceScope::new("RIDAGEYR", None)]);
        assert_eq!(store.fetch_observations(&any).unwrap().len(), 2);
    });
}

#[test]
fn sources_scoped_to_different_datasets_combine_as_sets() {
    for_each_store(|store| {
        store
            .insert_observations(&[
                obs("nhanes", "DEMO", "AGE_YEARS", 1, "30"),
                obs("nhanes", "BMX", "AGE_YEARS", 2, "45"),
                obs("nhanes", "BMX", "RXDDRGID", 2, "x"),
                obs("nhanes", "RXQ_RX", "AGE_YEARS", 3, "50"),
            ])
            .unwrap();
        let filter = ObservationFilter::new(vec![
            SourceScope::new("AGE_YEARS", Some("DEMO".to_string())),
            SourceScope::new("RXDDRGID", Some("BMX".to_string())),
        ]);
        let rows = store.fetch_observations(&filter).unwrap();
        let seen: Vec<(&str, &str, &str)> = rows
            .iter()
            .map(|row| (row.dataset.as_str(), row.variable.as_str(), row.value.as_str()))
            .collect();
        assert_eq!(
            seen,
            vec![
                ("BMX", "AGE_YEARS", "45"),
                ("BMX", "RXDDRGID", "x"),
                ("DEMO", "AGE_YEARS", "30"),
            ]
        );
    });
}

#[test]
fn one_unscoped_source_lifts_the_dataset_restriction() {
    for_each_store(|store| {
        store
            .insert_observations(&[
                obs("nhanes", "DEMO", "AGE_YEARS", 1, "30"),
                obs("nhanes", "RXQ_RX", "AGE_YEARS", 3, "50"),
                obs("nhanes", "RXQ_RX", "RXDDRGID", 3, "d00123"),
            ])
            .unwrap();
        let filter = ObservationFilter::new(vec![
            SourceScope::new("AGE_YEARS", Some("DEMO".to_string())),
            SourceScope::new("RXDDRGID", None),
        ]);
        assert_eq!(filter.dataset_names(), None);
        assert_eq!(store.fetch_observations(&filter).unwrap().len(), 3);
    });
}

#[test]
fn fetch_can_exclude_a_version() {
    for_each_store(|store| {
        store
            .insert_observations(&[
                obs("nhanes", "DEMO", "RIDAGEYR", 1, "20"),
                obs("normalized", "DEMO", "RIDAGEYR", 1, "20"),
            ])
            .unwrap();
        let filter = ObservationFilter::new(vec![SourceScope::new("RIDAGEYR", None)])
            .excluding_version("normalized");
        let rows = store.fetch_observations(&filter).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].version, "nhanes");
    });
}

#[test]
fn duplicate_insert_is_atomic() {
    for_each_store(|store| {
        store
            .insert_observations(&[obs("nhanes", "DEMO", "RIDAGEYR", 1, "20")])
            .unwrap();
        let err = store
            .insert_observations(&[
                obs("nhanes", "DEMO", "RIDAGEYR", 2, "25"),
                obs("nhanes", "DEMO", "RIDAGEYR", 1, "99"),
            ])
            .unwrap_err();
        assert!(matches!(err, StoreError::Duplicate { .. }), "{err:?}");
        assert_eq!(store.count_observations("DEMO", "2017-2018", "nhanes").unwrap(), 1);
    });
}

#[test]
fn rule_output_tagging_and_deletion() {
    for_each_store(|store| {
        let rule = RuleId::new(4);
        store
            .insert_observations(&[
                obs("normalized", "DEMO", "AGE_DOUBLE", 1, "40").with_rule(rule),
                obs("nhanes", "DEMO", "RIDAGEYR", 1, "20"),
            ])
            .unwrap();
        assert!(store.has_rule_output(rule).unwrap());
        assert!(!store.has_rule_output(RuleId::new(5)).unwrap());
        assert_eq!(store.delete_rule_output(rule).unwrap(), 1);
        assert!(!store.has_rule_output(rule).unwrap());
        assert_eq!(store.count_observations("DEMO", "2017-2018", "nhanes").unwrap(), 1);
    });
}

#[test]
fn pair_delete_keeps_normalized_rows() {
    for_each_store(|store| {
        store
            .insert_observations(&[
                obs("nhanes", "DEMO", "RIDAGEYR", 1, "20"),
                obs("nhanes", "DEMO", "RIAGENDR", 1, "2"),
                obs("normalized", "DEMO", "AGE_DOUBLE", 1, "40"),
                obs("nhanes", "BMX", "BMXWT", 1, "70"),
            ])
            .unwrap();
        assert_eq!(
            store
                .delete_observations("DEMO", "2017-2018", "normalized")
                .unwrap(),
            2
        );
        assert_eq!(store.count_observations("DEMO", "2017-2018", "normalized").unwrap(), 1);
        assert_eq!(store.count_observations("BMX", "2017-2018", "nhanes").unwrap(), 1);
    });
}

#[test]
fn rules_and_variables_round_trip() {
    for_each_store(|store| {
        let id = RuleId::new(2);
        store.insert_rule(&Rule::new(id, "double_age")).unwrap();
        store
            .insert_rule_variable(&RuleVariable::source(id, "RIDAGEYR", Some("DEMO")))
            .unwrap();
        store
            .insert_rule_variable(&RuleVariable::target(id, "AGE_DOUBLE", None))
            .unwrap();
        let rows = store.rule_variables(id).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].role, VariableRole::Source);
        assert_eq!(rows[1].dataset, None);

        let orphan = RuleVariable::source(RuleId::new(99), "X", None);
        assert!(matches!(
            store.insert_rule_variable(&orphan),
            Err(StoreError::NotFound { .. })
        ));
        assert!(store.insert_rule(&Rule::new(RuleId::new(3), "double_age")).is_err());
    });
}

#[test]
fn variable_type_compare_and_set() {
    for_each_store(|store| {
        store
            .insert_variable(&Variable::new("AGE_DOUBLE", VariableType::Other).unwrap())
            .unwrap();
        assert!(
            store
                .compare_and_set_variable_type(
                    "AGE_DOUBLE",
                    VariableType::Other,
                    VariableType::Numeric
                )
                .unwrap()
        );
        assert!(
            !store
                .compare_and_set_variable_type(
                    "AGE_DOUBLE",
                    VariableType::Other,
                    VariableType::Text
                )
                .unwrap()
        );
        assert_eq!(
            store.variable("AGE_DOUBLE").unwrap().unwrap().variable_type,
            VariableType::Numeric
        );
        assert!(
            store
                .compare_and_set_variable_type("MISSING", VariableType::Other, VariableType::Text)
                .is_err()
        );
    });
}

#[test]
fn work_process_records_upsert() {
    for_each_store(|store| {
        let mut process = WorkProcessRule::new(RuleId::new(1));
        store.save_work_process_rule(&process).unwrap();
        process.mark_error("boom");
        process.execution_time_ms = Some(12);
        store.save_work_process_rule(&process).unwrap();
        let stored = store.work_process_rule(RuleId::new(1)).unwrap().unwrap();
        assert_eq!(stored.status, WorkStatus::Error);
        assert_eq!(stored.attempt_count, 1);
        assert_eq!(stored.execution_time_ms, Some(12));
        assert_eq!(store.work_process_rules().unwrap().len(), 1);

        let mut pair = WorkProcess::new("DEMO", "2017-2018", WorkStatus::Standby);
        pair.records_raw = 10;
        pair.chk_raw = true;
        store.save_work_process(&pair).unwrap();
        let stored = store.work_process("DEMO", "2017-2018").unwrap().unwrap();
        assert_eq!(stored.records_raw, 10);
        assert!(stored.chk_raw);
        assert!(store.work_process("DEMO", "1999-2000").unwrap().is_none());
    });
}

#[test]
fn catalog_and_config_round_trip() {
    for_each_store(|store| {
        store
            .insert_cycle(&Cycle::new("2017-2018").unwrap().with_year_code("J"))
            .unwrap();
        assert!(store.insert_cycle(&Cycle::new("2017-2018").unwrap()).is_err());
        store
            .insert_dataset(&Dataset::new("DEMO").unwrap().in_group("Demographics"))
            .unwrap();
        assert_eq!(store.cycles().unwrap()[0].year_code.as_deref(), Some("J"));
        assert_eq!(
            store.datasets().unwrap()[0].group.as_deref(),
            Some("Demographics")
        );

        assert!(store.system_config("auto_create_workprocess").unwrap().is_none());
        store
            .set_system_config(&SystemConfig {
                config_key: "auto_create_workprocess".to_string(),
                config_check: false,
                config_value: "true".to_string(),
            })
            .unwrap();
        let config = store.system_config("auto_create_workprocess").unwrap().unwrap();
        assert!(config.is_enabled());
    });
}

#[test]
fn sqlite_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nhanes.sqlite");
    {
        let store = SqliteStore::open(&path).unwrap();
        store
            .insert_observations(&[obs("nhanes", "DEMO", "RIDAGEYR", 1, "20")])
            .unwrap();
    }
    let store = SqliteStore::open(&path).unwrap();
    assert_eq!(store.count_observations("DEMO", "2017-2018", "nhanes").unwrap(), 1);
}
