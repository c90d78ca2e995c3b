//! File-based config discovery for CLI use
//!
//! Handles finding and loading Tessel configuration files from the filesystem.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::config::TesselConfig;
use crate::error::{ConfigError, Result};

/// Conventional config file name.
pub const CONFIG_FILE: &str = "tessel.toml";

/// Field read from `package.json` when no `tessel.toml` exists.
pub const PACKAGE_FIELD: &str = "tessel";

/// File-based configuration discovery
///
/// Searches for Tessel configuration files in conventional locations and loads them.
/// Library users should prefer `TesselConfig::from_value()`.
///
/// # Example
///
/// ```no_run
/// use tessel_config::ConfigDiscovery;
///
/// let discovery = ConfigDiscovery::new(".");
/// let config = discovery.load().unwrap();
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    /// Create a new config discovery with a root directory
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Find a config file in the root directory
    ///
    /// Searches in this order:
    /// 1. TOML config: tessel.toml
    /// 2. package.json (tessel field)
    pub fn find(&self) -> Option<PathBuf> {
        let toml_path = self.root.join(CONFIG_FILE);
        if toml_path.exists() {
            return Some(toml_path);
        }

        let pkg_path = self.root.join("package.json");
        let content = fs::read_to_string(&pkg_path).ok()?;
        let parsed: Value = serde_json::from_str(&content).ok()?;
        match parsed.get(PACKAGE_FIELD) {
            Some(field) if !field.is_null() => Some(pkg_path),
            _ => None,
        }
    }

    /// Load config from discovered file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no config file is found.
    pub fn load(&self) -> Result<TesselConfig> {
        let path = self.find().ok_or(ConfigError::NotFound)?;
        load_from(&path)
    }

    /// Load the discovered config, or defaults when there is none.
    pub fn load_or_default(&self) -> Result<TesselConfig> {
        match self.find() {
            Some(path) => load_from(&path),
            None => {
                tracing::debug!(root = %self.root.display(), "no config file found, using defaults");
                Ok(TesselConfig::default())
            }
        }
    }

    /// Load config with profile merging
    pub fn load_with_profile(&self, profile: &str) -> Result<TesselConfig> {
        self.load()?.materialize_profile(Some(profile))
    }
}

/// Load config from an explicit file path (`.toml`, `.json` or `package.json`).
pub fn load_from(path: &Path) -> Result<TesselConfig> {
    let content = fs::read_to_string(path)?;

    if path.file_name() == Some(OsStr::new("package.json")) {
        return load_from_package_json(&content);
    }

    let value = match path.extension().and_then(OsStr::to_str) {
        Some("json") => serde_json::from_str(&content).map_err(|e| ConfigError::InvalidValue {
            field: "json".to_string(),
            hint: Some(format!("Invalid JSON syntax: {}", e)),
        })?,
        _ => {
            let toml_val: toml::Value =
                toml::from_str(&content).map_err(|e| ConfigError::InvalidValue {
                    field: "toml".to_string(),
                    hint: Some(format!("Invalid TOML syntax: {}", e)),
                })?;
            serde_json::to_value(toml_val).map_err(|e| ConfigError::InvalidValue {
                field: "toml".to_string(),
                hint: Some(format!("TOML to JSON conversion failed: {}", e)),
            })?
        }
    };

    tracing::debug!(path = %path.display(), "loaded config file");
    TesselConfig::from_value(value)
}

fn load_from_package_json(content: &str) -> Result<TesselConfig> {
    let parsed: Value = serde_json::from_str(content).map_err(|e| ConfigError::InvalidValue {
        field: "package.json".to_string(),
        hint: Some(format!("Invalid JSON: {}", e)),
    })?;

    match parsed.get(PACKAGE_FIELD) {
        Some(value) if !value.is_null() => TesselConfig::from_value(value.clone()),
        Some(_) => Err(ConfigError::InvalidValue {
            field: PACKAGE_FIELD.to_string(),
            hint: Some("The 'tessel' field cannot be null".to_string()),
        }),
        None => Err(ConfigError::InvalidValue {
            field: PACKAGE_FIELD.to_string(),
            hint: Some("Add a 'tessel' field to your package.json".to_string()),
        }),
    }
}
