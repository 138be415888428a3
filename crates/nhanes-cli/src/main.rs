//! NHANES normalization CLI.

use std::io::{self, IsTerminal};

use anyhow::Result;
use clap::{ColorChoice, Parser};
use tracing::level_filters::LevelFilter;

use nhanes_cli::config::load_options;
use nhanes_cli::logging::{LogConfig, LogFormat, init_logging};

mod cli;
mod commands;
mod summary;

use crate::cli::{Cli, Command, LogFormatArg, LogLevelArg};
use crate::commands::{
    open_store, run_apply, run_init, run_mark, run_purge, run_rules, run_status, run_sync,
    run_workprocess,
};
use crate::summary::print_batch_summary;

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    let log_config = log_config_from_cli(&cli);
    if let Err(error) = init_logging(&log_config) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }
    let exit_code = match run(&cli) {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error:#}");
            1
        }
    };
    std::process::exit(exit_code);
}

fn run(cli: &Cli) -> Result<i32> {
    if let Command::Init(args) = &cli.command {
        run_init(&cli.database, args)?;
        return Ok(0);
    }
    let options = load_options(cli.config.as_deref())?;
    let store = open_store(&cli.database)?;
    match &cli.command {
        Command::Apply(args) => {
            let report = run_apply(&store, options, args)?;
            print_batch_summary(&report);
            return Ok(if report.has_failures() { 1 } else { 0 });
        }
        Command::Rules => run_rules(&store, &options)?,
        Command::Status(args) => run_status(&store, args)?,
        Command::Mark(args) => run_mark(&store, &options, args)?,
        Command::Purge(args) => run_purge(&store, &options, args)?,
        Command::Workprocess(args) => run_workprocess(&store, &options, &args.action)?,
        Command::Sync => run_sync(&store, &options)?,
        Command::Init(_) => {}
    }
    Ok(0)
}

/// Build logging configuration from CLI flags with consistent precedence.
fn log_config_from_cli(cli: &Cli) -> LogConfig {
    let mut config = LogConfig {
        level_filter: cli.verbosity.tracing_level_filter(),
        ..LogConfig::default()
    };
    config.use_env_filter = !(cli.verbosity.is_present() || cli.log_level.is_some());
    if let Some(level) = cli.log_level {
        config.level_filter = match level {
            LogLevelArg::Error => LevelFilter::ERROR,
            LogLevelArg::Warn => LevelFilter::WARN,
            LogLevelArg::Info => LevelFilter::INFO,
            LogLevelArg::Debug => LevelFilter::DEBUG,
            LogLevelArg::Trace => LevelFilter::TRACE,
        };
    }
    config.format = match cli.log_format {
        LogFormatArg::Pretty => LogFormat::Pretty,
        LogFormatArg::Compact => LogFormat::Compact,
        LogFormatArg::Json => LogFormat::Json,
    };
    config.log_file = cli.log_file.clone();
    config.log_data = cli.log_data;
    config.with_ansi = match cli.color.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => cli.log_file.is_none() && io::stderr().is_terminal(),
    };
    config
}
