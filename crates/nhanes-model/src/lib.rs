pub mod catalog;
pub mod enums;
pub mod error;
pub mod ids;
pub mod observation;
pub mod options;
pub mod rule;
pub mod workprocess;

pub use catalog::{Cycle, Dataset, Group, SystemConfig, Variable};
pub use enums::{CoercionMode, VariableRole, VariableType, WorkStatus};
pub use error::{ModelError, Result};
pub use ids::RuleId;
pub use observation::{Observation, ObservationKey};
pub use options::PipelineOptions;
pub use rule::{Rule, RuleVariable, RuleVariables};
pub use workprocess::{WorkProcess, WorkProcessRule};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_variables_split_by_role() {
        let id = RuleId::new(1);
        let rows = vec![
            RuleVariable::source(id, "RIDAGEYR", Some("DEMO")),
            RuleVariable::target(id, "AGE_DOUBLE", None),
            RuleVariable::source(id, "RIDAGEYR", Some("DEMO_B")),
        ];
        let vars = RuleVariables::from_rows(rows);
        assert_eq!(vars.source_names(), vec!["RIDAGEYR"]);
        assert_eq!(vars.target_names(), vec!["AGE_DOUBLE"]);
        assert!(vars.is_runnable());
    }

    #[test]
    fn work_process_rule_serializes() {
        let process = WorkProcessRule::new(RuleId::new(7));
        let json = serde_json::to_string(&process).expect("serialize process");
        let round: WorkProcessRule = serde_json::from_str(&json).expect("deserialize process");
        assert_eq!(round.rule_id, RuleId::new(7));
        assert_eq!(round.status, WorkStatus::Pending);
    }
}
