//! Library components of the `nhanes` command-line tool.

pub mod config;
pub mod logging;
