use std::collections::BTreeMap;

use nhanes_model::{Observation, ObservationKey, VariableType};
use nhanes_transform::{MissingCells, pivot, set_data_types, unpivot};
use proptest::prelude::*;

fn obs(dataset: &str, sample: i64, sequence: i64, variable: &str, value: &str) -> Observation {
    Observation::new(
        ObservationKey::new("nhanes", "2017-2018", dataset, sample, sequence),
        variable,
        value,
    )
}

#[test]
fn rows_sharing_a_key_round_trip() {
    let rows = vec![
        obs("DEMO", 7, 0, "RIDAGEYR", "30"),
        obs("DEMO", 7, 0, "RIAGENDR", "2"),
        obs("DEMO", 7, 0, "DMDEDUC2", "4"),
    ];
    let variables: Vec<String> = rows.iter().map(|r| r.variable.clone()).collect();
    let wide = pivot(&rows, &variables).unwrap();
    assert_eq!(wide.row_count(), 1);
    let back = unpivot(&wide.data, &variables, MissingCells::Skip).unwrap();
    assert_eq!(back, rows);
}

#[test]
fn colliding_cells_keep_one_value() {
    // Which duplicate survives depends on input order and is not asserted.
    let rows = vec![
        obs("DEMO", 1, 0, "RIDAGEYR", "30"),
        obs("DEMO", 1, 0, "RIDAGEYR", "31"),
    ];
    let wide = pivot(&rows, &[]).unwrap();
    assert_eq!(wide.row_count(), 1);
    assert_eq!(wide.collisions, 1);
    let back = unpivot(&wide.data, &["RIDAGEYR".to_string()], MissingCells::Skip).unwrap();
    assert_eq!(back.len(), 1);
    assert!(back[0].value == "30" || back[0].value == "31");
}

#[test]
fn numeric_coercion_is_idempotent() {
    let rows = vec![
        obs("DEMO", 1, 0, "RIDAGEYR", "30"),
        obs("DEMO", 2, 0, "RIDAGEYR", "n/a"),
    ];
    let mut wide = pivot(&rows, &[]).unwrap().into_data();
    let types = vec![("RIDAGEYR".to_string(), VariableType::Numeric)];
    let first = set_data_types(&mut wide, &types).unwrap();
    let snapshot = wide.clone();
    let second = set_data_types(&mut wide, &types).unwrap();
    assert_eq!(first.lost_in("RIDAGEYR"), 1);
    assert_eq!(second.total_lost(), 0);
    assert!(wide.equals_missing(&snapshot));
}

fn arb_rows() -> impl Strategy<Value = Vec<Observation>> {
    let cell = (
        prop::sample::select(vec!["DEMO", "BMX"]),
        0i64..6,
        0i64..3,
        prop::sample::select(vec!["V1", "V2", "V3", "V4"]),
        "[a-z0-9]{1,6}",
    );
    prop::collection::vec(cell, 0..40).prop_map(|cells| {
        // Keep the first value per (key, variable) so the input has no
        // collisions.
        let mut unique: BTreeMap<(String, i64, i64, String), String> = BTreeMap::new();
        for (dataset, sample, sequence, variable, value) in cells {
            unique
                .entry((dataset.to_string(), sample, sequence, variable.to_string()))
                .or_insert(value);
        }
        unique
            .into_iter()
            .map(|((dataset, sample, sequence, variable), value)| {
                obs(&dataset, sample, sequence, &variable, &value)
            })
            .collect()
    })
}

proptest! {
    #[test]
    fn pivot_then_unpivot_returns_the_same_triples(rows in arb_rows()) {
        let variables: Vec<String> = ["V1", "V2", "V3", "V4"].iter().map(|v| v.to_string()).collect();
        let wide = pivot(&rows, &variables).unwrap();
        let present = wide.variable_columns();
        let back = unpivot(&wide.data, &present, MissingCells::Skip).unwrap();

        let mut expected: Vec<_> = rows
            .iter()
            .map(|r| (r.key(), r.variable.clone(), r.value.clone()))
            .collect();
        let mut actual: Vec<_> = back
            .iter()
            .map(|r| (r.key(), r.variable.clone(), r.value.clone()))
            .collect();
        expected.sort();
        actual.sort();
        prop_assert_eq!(actual, expected);
    }
}
