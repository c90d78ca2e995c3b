//! Command implementations.
//!
//! - [`build`] - run the pipeline
//! - [`check`] - validate without building
//!
//! Both start from a [`Project`]: the project root plus its loaded config.

pub mod build;
pub mod check;

use std::path::{Path, PathBuf};

use tessel_bundler::LogLevel;
use tessel_config::{BuildMode, BuildOptions, ConfigDiscovery, MODE_ENV_VAR, TesselConfig, load_from};

use crate::cli::ModeArg;
use crate::error::{CliError, Result};

pub use build::execute as build_execute;
pub use check::execute as check_execute;

/// A project root and the config found for it.
#[derive(Debug, Clone)]
pub struct Project {
    pub root: PathBuf,
    pub config: TesselConfig,
    /// File the config was read from; `None` when running on defaults
    pub config_path: Option<PathBuf>,
}

impl Project {
    /// Resolve the root (`--cwd` or the current directory) and load its config.
    ///
    /// An explicit `config` path is resolved against the root and must
    /// exist. Otherwise `tessel.toml` or the `tessel` field of
    /// `package.json` is used, falling back to defaults.
    pub fn load(cwd: Option<&Path>, config: Option<&Path>) -> Result<Self> {
        let current = std::env::current_dir()?;
        let root = match cwd {
            Some(dir) => current.join(dir),
            None => current,
        };
        if !root.is_dir() {
            return Err(CliError::RootNotFound(root));
        }

        let config_path = match config {
            Some(path) => Some(root.join(path)),
            None => ConfigDiscovery::new(&root).find(),
        };
        let config = match &config_path {
            Some(path) => load_from(path)?,
            None => {
                tracing::debug!(root = %root.display(), "no config file found, using defaults");
                TesselConfig::default()
            }
        };

        Ok(Self {
            root,
            config,
            config_path,
        })
    }

    /// `settings.log_level`, parsed.
    pub fn log_level(&self) -> Result<Option<LogLevel>> {
        self.config
            .settings
            .log_level
            .as_deref()
            .map(|level| {
                level.parse::<LogLevel>().map_err(|e| {
                    CliError::InvalidArgument(format!("settings.log_level: {e}"))
                })
            })
            .transpose()
    }

    /// Build options with the profile for `mode` merged in.
    pub fn options_for(&self, mode: BuildMode) -> Result<BuildOptions> {
        Ok(self.config.clone().for_mode(mode)?.build)
    }

    /// Mode for this run: `--mode`, then `NODE_ENV`, then the config file.
    pub fn mode(&self, flag: Option<ModeArg>) -> BuildMode {
        let env = std::env::var(MODE_ENV_VAR).ok();
        resolve_mode(flag, env.as_deref(), self.config.build.mode)
    }
}

pub(crate) fn resolve_mode(
    flag: Option<ModeArg>,
    env: Option<&str>,
    configured: BuildMode,
) -> BuildMode {
    match (flag, env) {
        (Some(mode), _) => mode.into(),
        (None, Some(value)) if !value.trim().is_empty() => BuildMode::from_env_value(Some(value)),
        _ => configured,
    }
}

/// Parse a command-line entry: `name=path`, or a bare path named after its stem.
pub(crate) fn parse_entry(spec: &str) -> Result<(String, PathBuf)> {
    match spec.split_once('=') {
        Some((name, path)) => {
            if name.is_empty() || path.is_empty() {
                return Err(CliError::InvalidArgument(format!(
                    "entry '{spec}' must be `name=path` or a path"
                )));
            }
            Ok((name.to_string(), PathBuf::from(path)))
        }
        None => {
            let path = PathBuf::from(spec);
            Ok((tessel_config::entry_name_for(&path), path))
        }
    }
}
