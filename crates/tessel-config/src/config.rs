//! High-level configuration structure for Tessel.
//!
//! This module provides the main `TesselConfig` struct and profile merging logic.
//! For file discovery, see the `discovery` module.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result as ConfigResult};
use crate::mode::BuildMode;
use crate::options::BuildOptions;
use crate::settings::GlobalSettings;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TesselConfig {
    #[serde(default)]
    pub build: BuildOptions,

    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,

    #[serde(default)]
    pub settings: GlobalSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(default)]
    pub build: Value,

    #[serde(default)]
    pub settings: Value,
}

impl TesselConfig {
    /// Create from serde_json::Value
    ///
    /// # Example
    ///
    /// ```
    /// use tessel_config::TesselConfig;
    /// use serde_json::json;
    /// use std::path::PathBuf;
    ///
    /// let config = TesselConfig::from_value(json!({
    ///     "build": {
    ///         "entries": { "index": "src/index.tsx" },
    ///         "output_dir": "../../resources/view"
    ///     }
    /// }))
    /// .unwrap();
    ///
    /// assert_eq!(config.build.output_dir, PathBuf::from("../../resources/view"));
    /// ```
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Convert to serde_json::Value
    pub fn to_value(&self) -> ConfigResult<Value> {
        serde_json::to_value(self).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Deep-merge the named profile over the base config.
    ///
    /// Unknown profile names are ignored so that `production` and
    /// `development` profiles stay optional.
    pub fn materialize_profile(mut self, profile: Option<&str>) -> ConfigResult<Self> {
        let Some(name) = profile else {
            return Ok(self);
        };
        let Some(profile_cfg) = self.profiles.get(name).cloned() else {
            tracing::debug!(profile = name, "no profile override declared");
            return Ok(self);
        };

        if !profile_cfg.build.is_null() {
            self.build = merge_into(&self.build, &profile_cfg.build)?;
        }

        if !profile_cfg.settings.is_null() {
            self.settings = merge_into(&self.settings, &profile_cfg.settings)?;
        }

        Ok(self)
    }

    /// Pin the build mode and apply the profile of the same name.
    ///
    /// The mode is re-applied after merging so a profile cannot silently
    /// switch a production build back to development.
    pub fn for_mode(mut self, mode: BuildMode) -> ConfigResult<Self> {
        self.build.mode = mode;
        let mut config = self.materialize_profile(Some(mode.as_str()))?;
        config.build.mode = mode;
        Ok(config)
    }
}

fn merge_into<T>(base: &T, update: &Value) -> ConfigResult<T>
where
    T: Serialize + for<'de> Deserialize<'de>,
{
    let mut merged =
        serde_json::to_value(base).map_err(|err| ConfigError::InvalidProfileOverride {
            message: err.to_string(),
        })?;
    merge_values(&mut merged, update);
    serde_json::from_value(merged).map_err(|err| ConfigError::InvalidProfileOverride {
        message: err.to_string(),
    })
}

fn merge_values(target: &mut Value, update: &Value) {
    match (target, update) {
        (Value::Object(target_map), Value::Object(update_map)) => {
            for (key, value) in update_map {
                merge_values(target_map.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (target_slot, _) => {
            *target_slot = update.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::PathBuf;

    #[test]
    fn from_value_creates_config() {
        let config = TesselConfig::from_value(json!({
            "build": {
                "entries": { "index": "src/index.tsx" },
                "inline_limit": 4096
            }
        }))
        .unwrap();

        assert_eq!(
            config.build.entries.get("index"),
            Some(&PathBuf::from("src/index.tsx"))
        );
        assert_eq!(config.build.inline_limit, 4096);
    }

    #[test]
    fn to_value_serializes_config() {
        let mut config = TesselConfig::default();
        config.build.clean = false;

        let value = config.to_value().unwrap();
        assert_eq!(value["build"]["clean"], json!(false));
    }

    #[test]
    fn profile_merging_works() {
        let config = TesselConfig::from_value(json!({
            "build": {
                "entries": { "index": "src/index.tsx" },
                "inline_limit": 8192,
                "clean": true
            },
            "profiles": {
                "production": {
                    "build": { "inline_limit": 2048, "clean": false }
                }
            }
        }))
        .unwrap()
        .materialize_profile(Some("production"))
        .unwrap();

        assert_eq!(config.build.inline_limit, 2048);
        assert!(!config.build.clean);
        assert_eq!(config.build.entries.len(), 1);
    }

    #[test]
    fn arrays_are_replaced_not_merged() {
        let config = TesselConfig::from_value(json!({
            "build": { "resolve": { "extensions": [".js", ".ts"] } },
            "profiles": {
                "ci": { "build": { "resolve": { "extensions": [".mjs"] } } }
            }
        }))
        .unwrap()
        .materialize_profile(Some("ci"))
        .unwrap();

        assert_eq!(config.build.resolve.extensions, vec![".mjs"]);
    }

    #[test]
    fn for_mode_pins_mode_over_profile() {
        let config = TesselConfig::from_value(json!({
            "profiles": {
                "production": { "build": { "mode": "development", "workers": 2 } }
            }
        }))
        .unwrap()
        .for_mode(BuildMode::Production)
        .unwrap();

        assert_eq!(config.build.mode, BuildMode::Production);
        assert_eq!(config.build.workers, Some(2));
    }

    #[test]
    fn unknown_profile_is_ignored() {
        let config = TesselConfig::default()
            .materialize_profile(Some("missing"))
            .unwrap();
        assert!(config.build.entries.is_empty());
    }
}
