//! CLI error type and its conversion to miette diagnostics.
//!
//! Bundler errors already carry diagnostic codes and help text, so they are
//! reported through their own `Diagnostic` impl. Everything else gets a
//! plain report with a hint where one is useful.

use std::path::PathBuf;

use miette::Report;
use tessel_config::ConfigError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    /// Config discovery, parsing or validation failed
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The pipeline failed
    #[error(transparent)]
    Build(#[from] tessel_bundler::Error),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// `--cwd` does not name a directory
    #[error("Project root not found: {}", .0.display())]
    RootNotFound(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = CliError> = std::result::Result<T, E>;

/// Convert a CLI error into a report for `main` to return.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Build(e) => Report::new(e),
        CliError::Config(e) => config_error_to_miette(e),
        CliError::RootNotFound(path) => miette::miette!(
            help = "Pass an existing directory to --cwd",
            "Project root not found: {}",
            path.display()
        ),
        other => miette::miette!("{}", other),
    }
}

fn config_error_to_miette(err: ConfigError) -> Report {
    let help = match &err {
        ConfigError::NoEntries => {
            Some("Declare [build.entries] in tessel.toml or pass entries to `tessel build`")
        }
        ConfigError::EntryNotFound { .. } => Some("Entry paths are relative to the project root"),
        ConfigError::NotFound => Some("Create tessel.toml or pass --config <path>"),
        _ => None,
    };
    match help {
        Some(help) => miette::miette!(help = help, "Configuration error: {}", err),
        None => miette::miette!("Configuration error: {}", err),
    }
}
