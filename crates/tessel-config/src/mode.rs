//! Build mode toggle (development vs production).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Environment variable consulted by [`BuildMode::from_env`].
pub const MODE_ENV_VAR: &str = "NODE_ENV";

/// The single environment-derived toggle of a build.
///
/// Production enables minification and turns lint warnings into
/// build-breaking errors. Development leaves output readable and only logs
/// lint warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    #[default]
    Development,
    Production,
}

impl BuildMode {
    /// Read the mode from `NODE_ENV`, defaulting to development.
    pub fn from_env() -> Self {
        Self::from_env_value(std::env::var(MODE_ENV_VAR).ok().as_deref())
    }

    /// Anything other than `production` is treated as development.
    pub fn from_env_value(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("production") => BuildMode::Production,
            _ => BuildMode::Development,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildMode::Development => "development",
            BuildMode::Production => "production",
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, BuildMode::Production)
    }

    /// Whether minifying stages should transform their input.
    pub fn minify(&self) -> bool {
        self.is_production()
    }

    /// Whether lint warnings fail the build.
    pub fn warnings_as_errors(&self) -> bool {
        self.is_production()
    }
}

impl fmt::Display for BuildMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BuildMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(BuildMode::Development),
            "production" | "prod" => Ok(BuildMode::Production),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}
