//! CLI argument definitions for the NHANES pipeline.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;

use nhanes_model::WorkStatus;

#[derive(Parser)]
#[command(
    name = "nhanes",
    version,
    about = "NHANES normalization - apply transformation rules to survey observations",
    long_about = "Apply registered transformation rules to NHANES observations.\n\n\
                  Each active rule reads its source variables, runs its transformation\n\
                  and writes normalized observations back to the store. Rule and\n\
                  dataset progress is tracked in work-process records."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,

    /// Allow observation values in trace logs.
    #[arg(long = "log-data", global = true)]
    pub log_data: bool,

    /// SQLite database holding observations, catalog and work processes.
    #[arg(
        long = "database",
        value_name = "PATH",
        default_value = "nhanes.sqlite",
        global = true
    )]
    pub database: PathBuf,

    /// TOML file with pipeline options.
    #[arg(long = "config", value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Apply active transformation rules.
    Apply(ApplyArgs),

    /// List rules with their work-process status.
    Rules,

    /// List dataset work processes.
    Status(StatusArgs),

    /// Set the status of one or more rules.
    Mark(MarkArgs),

    /// Delete a rule's output and reset it to pending.
    Purge(PurgeArgs),

    /// Update dataset work processes.
    Workprocess(WorkprocessArgs),

    /// Create missing rule and dataset work processes.
    Sync,

    /// Create the database schema.
    Init(InitArgs),
}

#[derive(Args)]
pub struct ApplyArgs {
    /// Only apply these rule ids (repeatable).
    #[arg(long = "rule", value_name = "ID")]
    pub rules: Vec<i64>,

    /// Per-rule transformation timeout in seconds.
    #[arg(long = "timeout", value_name = "SECS", conflicts_with = "no_timeout")]
    pub timeout: Option<u64>,

    /// Disable the per-rule timeout.
    #[arg(long = "no-timeout")]
    pub no_timeout: bool,
}

#[derive(Args)]
pub struct StatusArgs {
    /// Only show this dataset.
    #[arg(long = "dataset", value_name = "NAME")]
    pub dataset: Option<String>,

    /// Only show this cycle.
    #[arg(long = "cycle", value_name = "CYCLE")]
    pub cycle: Option<String>,
}

#[derive(Args)]
pub struct MarkArgs {
    /// Rule ids to update.
    #[arg(value_name = "ID", required = true)]
    pub rules: Vec<i64>,

    /// New status.
    #[arg(long = "status", value_enum)]
    pub status: RuleStatusArg,
}

#[derive(Args)]
pub struct PurgeArgs {
    /// Rule id whose output is deleted.
    #[arg(value_name = "ID")]
    pub rule: i64,
}

#[derive(Args)]
pub struct WorkprocessArgs {
    #[command(subcommand)]
    pub action: WorkprocessCommand,
}

#[derive(Subcommand)]
pub enum WorkprocessCommand {
    /// Set the status of one dataset in one cycle.
    ///
    /// `delete` removes the pair's raw observations and resets the record.
    Set {
        #[arg(value_name = "DATASET")]
        dataset: String,

        #[arg(value_name = "CYCLE")]
        cycle: String,

        #[arg(long = "status", value_enum)]
        status: StatusArg,
    },

    /// Set the status of every work process matching datasets or groups.
    Bulk {
        /// Dataset names (repeatable).
        #[arg(long = "dataset", value_name = "NAME")]
        datasets: Vec<String>,

        /// Dataset groups (repeatable).
        #[arg(long = "group", value_name = "NAME")]
        groups: Vec<String>,

        #[arg(long = "status", value_enum)]
        status: StatusArg,

        /// Set the download flag.
        #[arg(long = "download", conflicts_with = "no_download")]
        download: bool,

        /// Clear the download flag.
        #[arg(long = "no-download")]
        no_download: bool,
    },
}

#[derive(Args)]
pub struct InitArgs {
    /// Enable automatic work-process creation for new datasets and cycles.
    #[arg(long = "auto-create-workprocess")]
    pub auto_create_workprocess: bool,
}

/// Statuses an operator may assign to a rule.
#[derive(Clone, Copy, ValueEnum)]
pub enum RuleStatusArg {
    Pending,
    Standby,
    Complete,
}

impl From<RuleStatusArg> for WorkStatus {
    fn from(value: RuleStatusArg) -> Self {
        match value {
            RuleStatusArg::Pending => WorkStatus::Pending,
            RuleStatusArg::Standby => WorkStatus::Standby,
            RuleStatusArg::Complete => WorkStatus::Complete,
        }
    }
}

/// Dataset work-process statuses.
#[derive(Clone, Copy, ValueEnum)]
pub enum StatusArg {
    Pending,
    Complete,
    Error,
    Standby,
    Delete,
    NoFile,
}

impl From<StatusArg> for WorkStatus {
    fn from(value: StatusArg) -> Self {
        match value {
            StatusArg::Pending => WorkStatus::Pending,
            StatusArg::Complete => WorkStatus::Complete,
            StatusArg::Error => WorkStatus::Error,
            StatusArg::Standby => WorkStatus::Standby,
            StatusArg::Delete => WorkStatus::Delete,
            StatusArg::NoFile => WorkStatus::NoFile,
        }
    }
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
