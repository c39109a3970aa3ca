//! Command implementations.
//!
//! Each subcommand lives in its own module and delegates to
//! storageops-testkit for catalog loading and suite execution.

pub mod fixtures;
pub mod run;

use storageops_testkit::{ConfigError, SuiteSummary};
use thiserror::Error;

/// CLI-specific error type.
#[derive(Debug, Error)]
pub enum CliError {
    /// Config or fixture catalog could not be loaded.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArg(String),

    /// At least one (driver, fixture) run failed.
    #[error("conformance suite failed: {0}")]
    SuiteFailed(SuiteSummary),
}

pub type Result<T> = std::result::Result<T, CliError>;
