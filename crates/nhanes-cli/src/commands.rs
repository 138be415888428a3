use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::{info, info_span};

use nhanes_cli::config::{OptionOverrides, apply_overrides};
use nhanes_core::{
    BatchReport, BulkSelection, TransformationManager, WorkProcessTracker, builtin_registry,
};
use nhanes_model::{PipelineOptions, RuleId, SystemConfig};
use nhanes_store::{DataStore, SqliteStore};

use crate::cli::{ApplyArgs, InitArgs, MarkArgs, PurgeArgs, StatusArgs, WorkprocessCommand};
use crate::summary::{RuleRow, rules_table, status_table};

pub fn open_store(path: &Path) -> Result<SqliteStore> {
    SqliteStore::open(path).with_context(|| format!("open database {}", path.display()))
}

pub fn run_apply(
    store: &dyn DataStore,
    options: PipelineOptions,
    args: &ApplyArgs,
) -> Result<BatchReport> {
    let options = apply_overrides(
        options,
        OptionOverrides {
            timeout_secs: args.timeout,
            no_timeout: args.no_timeout,
        },
    );
    let ids: Vec<RuleId> = args.rules.iter().copied().map(RuleId::new).collect();
    let manager = TransformationManager::new(store, builtin_registry(), options);
    let report = manager
        .apply((!ids.is_empty()).then_some(ids.as_slice()))
        .context("apply transformations")?;
    Ok(report)
}

pub fn run_rules(store: &dyn DataStore, options: &PipelineOptions) -> Result<()> {
    let mut rules = store.rules().context("list rules")?;
    rules.sort_by_key(|rule| rule.id);
    let mut rows = Vec::with_capacity(rules.len());
    for rule in rules {
        let process = store
            .work_process_rule(rule.id)
            .with_context(|| format!("load work process for rule {}", rule.id))?;
        rows.push(RuleRow::new(
            rule,
            process,
            builtin_registry(),
            &options.entry_point,
        ));
    }
    println!("{}", rules_table(&rows));
    Ok(())
}

pub fn run_status(store: &dyn DataStore, args: &StatusArgs) -> Result<()> {
    let mut processes = store.work_processes().context("list work processes")?;
    processes.retain(|process| {
        args.dataset.as_ref().is_none_or(|name| &process.dataset == name)
            && args.cycle.as_ref().is_none_or(|cycle| &process.cycle == cycle)
    });
    processes.sort_by(|a, b| a.key().cmp(&b.key()));
    println!("{}", status_table(&processes));
    Ok(())
}

pub fn run_mark(store: &dyn DataStore, options: &PipelineOptions, args: &MarkArgs) -> Result<()> {
    let ids: Vec<RuleId> = args.rules.iter().copied().map(RuleId::new).collect();
    let status = args.status.into();
    let written = WorkProcessTracker::new(store, options)
        .mark_rules(&ids, status)
        .context("mark rules")?;
    println!("{written} rule(s) set to {status}");
    Ok(())
}

pub fn run_purge(store: &dyn DataStore, options: &PipelineOptions, args: &PurgeArgs) -> Result<()> {
    let id = RuleId::new(args.rule);
    let removed = WorkProcessTracker::new(store, options)
        .purge_rule(id)
        .with_context(|| format!("purge rule {id}"))?;
    println!("rule {id}: {removed} observation(s) removed, status pending");
    Ok(())
}

pub fn run_workprocess(
    store: &dyn DataStore,
    options: &PipelineOptions,
    action: &WorkprocessCommand,
) -> Result<()> {
    let tracker = WorkProcessTracker::new(store, options);
    match action {
        WorkprocessCommand::Set {
            dataset,
            cycle,
            status,
        } => {
            let process = tracker
                .set_status(dataset, cycle, (*status).into())
                .with_context(|| format!("update {dataset} in {cycle}"))?;
            println!("{dataset} {cycle}: {}", process.status);
        }
        WorkprocessCommand::Bulk {
            datasets,
            groups,
            status,
            download,
            no_download,
        } => {
            if datasets.is_empty() && groups.is_empty() {
                bail!("bulk update needs at least one --dataset or --group");
            }
            let selection = BulkSelection {
                datasets: datasets.clone(),
                groups: groups.clone(),
            };
            let is_download = match (download, no_download) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            let updated = tracker
                .bulk_update(&selection, (*status).into(), is_download)
                .context("bulk update")?;
            println!("{updated} work process(es) updated");
        }
    }
    Ok(())
}

pub fn run_sync(store: &dyn DataStore, options: &PipelineOptions) -> Result<()> {
    let span = info_span!("sync");
    let _guard = span.enter();
    let tracker = WorkProcessTracker::new(store, options);
    let rules = tracker
        .ensure_rule_processes()
        .context("create rule work processes")?;
    let pairs = tracker
        .sync_work_processes()
        .context("create dataset work processes")?;
    println!("{rules} rule work process(es) and {pairs} dataset work process(es) created");
    Ok(())
}

pub fn run_init(path: &Path, args: &InitArgs) -> Result<()> {
    let store = open_store(path)?;
    if args.auto_create_workprocess {
        store
            .set_system_config(&SystemConfig {
                config_key: SystemConfig::AUTO_CREATE_WORKPROCESS.to_string(),
                config_check: true,
                config_value: "true".to_string(),
            })
            .context("enable work-process auto-creation")?;
    }
    info!(path = %path.display(), "database initialized");
    println!("Database: {}", path.display());
    Ok(())
}
