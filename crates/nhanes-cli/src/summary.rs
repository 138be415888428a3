use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ColumnConstraint, ContentArrangement, Table, Width,
};

use nhanes_core::{BatchReport, OutcomeKind, RuleRegistry};
use nhanes_model::{Rule, WorkProcess, WorkProcessRule, WorkStatus};

pub fn print_batch_summary(report: &BatchReport) {
    println!("{}", batch_table(report));
    if !report.unknown.is_empty() {
        let ids: Vec<String> = report.unknown.iter().map(ToString::to_string).collect();
        eprintln!("Unknown or inactive rules: {}", ids.join(", "));
    }
}

pub fn batch_table(report: &BatchReport) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("ID"),
        header_cell("Rule"),
        header_cell("Outcome"),
        header_cell("Rows"),
        header_cell("Time (ms)"),
        header_cell("Message"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    align_column(&mut table, 4, CellAlignment::Right);
    for outcome in &report.outcomes {
        table.add_row(vec![
            Cell::new(outcome.rule_id),
            Cell::new(&outcome.rule_name)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            outcome_cell(outcome.kind),
            count_cell(outcome.rows_written),
            outcome
                .duration_ms
                .map_or_else(|| dim_cell("-"), Cell::new),
            message_cell(&outcome.message, outcome.kind),
        ]);
    }
    table.add_row(vec![
        dim_cell("-"),
        Cell::new("TOTAL")
            .fg(Color::Cyan)
            .add_attribute(Attribute::Bold),
        Cell::new(format!(
            "{} ok, {} applied, {} skipped, {} failed",
            report.completed(),
            report.already_applied(),
            report.skipped(),
            report.failed()
        ))
        .add_attribute(Attribute::Bold),
        count_cell(report.rows_written()).add_attribute(Attribute::Bold),
        dim_cell("-"),
        dim_cell("-"),
    ]);
    table
}

/// One line of the `rules` listing.
pub struct RuleRow {
    pub rule: Rule,
    pub process: Option<WorkProcessRule>,
    pub description: String,
}

impl RuleRow {
    /// The stored description wins; otherwise the registered code's
    /// description is shown, or nothing when the module is not registered.
    pub fn new(
        rule: Rule,
        process: Option<WorkProcessRule>,
        registry: &RuleRegistry,
        entry_point: &str,
    ) -> Self {
        let description = if rule.description.is_empty() {
            registry
                .resolve(&rule.module, entry_point)
                .map(|code| code.description().to_string())
                .unwrap_or_default()
        } else {
            rule.description.clone()
        };
        Self {
            rule,
            process,
            description,
        }
    }
}

pub fn rules_table(rows: &[RuleRow]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("ID"),
        header_cell("Name"),
        header_cell("Description"),
        header_cell("Version"),
        header_cell("Active"),
        header_cell("Status"),
        header_cell("Attempts"),
        header_cell("Last run"),
        header_cell("Log"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    align_column(&mut table, 4, CellAlignment::Center);
    align_column(&mut table, 6, CellAlignment::Right);
    for row in rows {
        let rule = &row.rule;
        let (status, attempts, last_run, log) = match &row.process {
            Some(process) => (
                status_cell(process.status),
                Cell::new(process.attempt_count),
                process.last_synced_at.map_or_else(
                    || dim_cell("-"),
                    |at| Cell::new(at.format("%Y-%m-%d %H:%M:%S")),
                ),
                Cell::new(&process.execution_logs),
            ),
            None => (dim_cell("-"), dim_cell("-"), dim_cell("-"), dim_cell("-")),
        };
        let description = if row.description.is_empty() {
            dim_cell("-")
        } else {
            Cell::new(&row.description)
        };
        table.add_row(vec![
            Cell::new(rule.id),
            Cell::new(&rule.name).add_attribute(Attribute::Bold),
            description,
            Cell::new(&rule.version),
            flag_cell(rule.is_active),
            status,
            attempts,
            last_run,
            log,
        ]);
    }
    table
}

pub fn status_table(processes: &[WorkProcess]) -> Table {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Dataset"),
        header_cell("Cycle"),
        header_cell("Status"),
        header_cell("Download"),
        header_cell("Raw"),
        header_cell("Normalized"),
        header_cell("Samples"),
        header_cell("Variables"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 2, CellAlignment::Center);
    align_column(&mut table, 3, CellAlignment::Center);
    for column in 4..8 {
        align_column(&mut table, column, CellAlignment::Right);
    }
    for process in processes {
        table.add_row(vec![
            Cell::new(&process.dataset)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(&process.cycle),
            status_cell(process.status),
            flag_cell(process.is_download),
            count_cell(process.records_raw),
            count_cell(process.records_normalization),
            count_cell(process.n_samples),
            count_cell(process.n_variables),
        ]);
    }
    table
}

pub fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_width(120);
    if table.column_count() >= 8 {
        table.set_constraints(vec![
            ColumnConstraint::LowerBoundary(Width::Fixed(6)),
            ColumnConstraint::UpperBoundary(Width::Percentage(25)),
            ColumnConstraint::LowerBoundary(Width::Fixed(6)),
            ColumnConstraint::LowerBoundary(Width::Fixed(6)),
            ColumnConstraint::LowerBoundary(Width::Fixed(8)),
            ColumnConstraint::LowerBoundary(Width::Fixed(6)),
            ColumnConstraint::LowerBoundary(Width::Fixed(7)),
            ColumnConstraint::UpperBoundary(Width::Percentage(40)),
        ]);
    }
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(140);
    if table.column_count() >= 6 {
        table.set_constraints(vec![
            ColumnConstraint::LowerBoundary(Width::Fixed(4)),
            ColumnConstraint::UpperBoundary(Width::Percentage(25)),
            ColumnConstraint::LowerBoundary(Width::Fixed(10)),
            ColumnConstraint::LowerBoundary(Width::Fixed(6)),
            ColumnConstraint::LowerBoundary(Width::Fixed(9)),
            ColumnConstraint::UpperBoundary(Width::Percentage(50)),
        ]);
    }
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn outcome_cell(kind: OutcomeKind) -> Cell {
    let cell = Cell::new(kind.as_str());
    match kind {
        OutcomeKind::Completed => cell.fg(Color::Green).add_attribute(Attribute::Bold),
        OutcomeKind::AlreadyApplied => cell.fg(Color::Cyan),
        OutcomeKind::Skipped => cell.fg(Color::DarkGrey),
        OutcomeKind::Failed => cell.fg(Color::Red).add_attribute(Attribute::Bold),
    }
}

fn status_cell(status: WorkStatus) -> Cell {
    let cell = Cell::new(status.as_code());
    match status {
        WorkStatus::Complete => cell.fg(Color::Green),
        WorkStatus::Error => cell.fg(Color::Red).add_attribute(Attribute::Bold),
        WorkStatus::Pending => cell.fg(Color::Yellow),
        WorkStatus::Standby | WorkStatus::NoFile => cell.fg(Color::DarkGrey),
        WorkStatus::Delete => cell.fg(Color::Magenta),
    }
}

fn message_cell(message: &str, kind: OutcomeKind) -> Cell {
    if kind == OutcomeKind::Failed {
        Cell::new(message).fg(Color::Red)
    } else {
        dim_cell(message)
    }
}

fn flag_cell(flag: bool) -> Cell {
    if flag {
        Cell::new("✓")
            .fg(Color::Green)
            .add_attribute(Attribute::Bold)
    } else {
        dim_cell("-")
    }
}

fn count_cell<T: Default + PartialOrd + ToString>(count: T) -> Cell {
    if count > T::default() {
        Cell::new(count)
    } else {
        dim_cell(count)
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nhanes_core::RuleOutcome;
    use nhanes_model::RuleId;

    fn outcome(id: i64, kind: OutcomeKind, rows: usize) -> RuleOutcome {
        RuleOutcome {
            rule_id: RuleId::new(id),
            rule_name: format!("r{id}"),
            kind,
            status: WorkStatus::Complete,
            message: String::new(),
            rows_written: rows,
            duration_ms: Some(3),
        }
    }

    #[test]
    fn batch_table_has_total_row() {
        let report = BatchReport {
            outcomes: vec![
                outcome(1, OutcomeKind::Completed, 4),
                outcome(2, OutcomeKind::Failed, 0),
            ],
            unknown: Vec::new(),
        };
        let table = batch_table(&report);
        assert_eq!(table.row_iter().count(), 3);
        let rendered = table.to_string();
        assert!(rendered.contains("TOTAL"));
        assert!(rendered.contains("failed"));
    }

    #[test]
    fn rules_table_falls_back_to_code_description() {
        let registry = nhanes_core::builtin_registry();
        let mut described = Rule::new(RuleId::new(2), "pd_by_drug");
        described.description = "PD flag from RXQ_RX".to_string();
        let rows = vec![
            RuleRow::new(Rule::new(RuleId::new(1), "double_age"), None, registry, "rule"),
            RuleRow::new(described, None, registry, "rule"),
            RuleRow::new(Rule::new(RuleId::new(3), "not_registered"), None, registry, "rule"),
        ];
        assert_eq!(rows[0].description, "Doubles the first source variable");
        assert_eq!(rows[1].description, "PD flag from RXQ_RX");
        assert!(rows[2].description.is_empty());

        let rendered = rules_table(&rows).to_string();
        assert!(rendered.contains("Description"));
        assert!(rendered.contains("Doubles the first source variable"));
    }

    #[test]
    fn status_table_lists_each_pair() {
        let processes = vec![
            WorkProcess::new("DEMO", "2017-2018", WorkStatus::Standby),
            WorkProcess::new("BPX", "2017-2018", WorkStatus::Pending),
        ];
        let table = status_table(&processes);
        assert_eq!(table.row_iter().count(), 2);
        assert!(table.to_string().contains("standby"));
    }
}
