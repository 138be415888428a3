//! Pipeline options from an optional TOML file plus CLI overrides.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use tracing::debug;

use nhanes_model::PipelineOptions;

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Copy, Default)]
pub struct OptionOverrides {
    pub timeout_secs: Option<u64>,
    pub no_timeout: bool,
}

/// Reads options from `path`, or defaults when no file is given.
pub fn load_options(path: Option<&Path>) -> Result<PipelineOptions> {
    let Some(path) = path else {
        return Ok(PipelineOptions::default());
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("read config {}", path.display()))?;
    let options = parse_options(&text).with_context(|| format!("parse config {}", path.display()))?;
    debug!(path = %path.display(), "loaded pipeline options");
    Ok(options)
}

pub fn parse_options(text: &str) -> Result<PipelineOptions> {
    let options: PipelineOptions = toml::from_str(text)?;
    validate(&options)?;
    Ok(options)
}

pub fn apply_overrides(options: PipelineOptions, overrides: OptionOverrides) -> PipelineOptions {
    if overrides.no_timeout {
        options.with_timeout(None)
    } else if let Some(secs) = overrides.timeout_secs {
        options.with_timeout(Some(Duration::from_secs(secs)))
    } else {
        options
    }
}

fn validate(options: &PipelineOptions) -> Result<()> {
    if !(options.categorical_ratio > 0.0 && options.categorical_ratio <= 1.0) {
        bail!(
            "categorical_ratio must be in (0, 1], got {}",
            options.categorical_ratio
        );
    }
    if options.raw_version == options.normalized_version {
        bail!("raw_version and normalized_version must differ");
    }
    if options.entry_point.trim().is_empty() {
        bail!("entry_point must not be empty");
    }
    Ok(())
}
