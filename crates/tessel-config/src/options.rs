//! Core build configuration types.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::mode::BuildMode;
use crate::rules::{RuleOptions, default_rules};

/// Default threshold, in bytes, below which the `url` stage inlines an asset.
pub const DEFAULT_INLINE_LIMIT: u64 = 8192;

fn default_output_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_inline_limit() -> u64 {
    DEFAULT_INLINE_LIMIT
}

fn default_hash_length() -> usize {
    8
}

fn default_manifest() -> String {
    "manifest.json".to_string()
}

fn default_html_filename() -> String {
    "index.html".to_string()
}

fn default_true() -> bool {
    true
}

/// Main build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildOptions {
    /// Logical entry name -> entry path (relative to the project root)
    #[serde(default)]
    pub entries: IndexMap<String, PathBuf>,

    /// Output root consumed by the host runtime
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Development or production
    #[serde(default)]
    pub mode: BuildMode,

    /// Reference resolution options
    #[serde(default)]
    pub resolve: ResolveOptions,

    /// Ordered transform rule table
    #[serde(default = "default_rules")]
    pub rules: Vec<RuleOptions>,

    /// Assets at or below this size (bytes) are inlined as data URIs by the `url` stage
    #[serde(default = "default_inline_limit")]
    pub inline_limit: u64,

    /// Upper bound on concurrent transform jobs (defaults to the CPU count, max 8)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workers: Option<usize>,

    /// Remove files left over from previous builds after a successful emit
    #[serde(default = "default_true")]
    pub clean: bool,

    /// Number of fingerprint characters used in file names
    #[serde(default = "default_hash_length")]
    pub hash_length: usize,

    /// Manifest file name under the output root
    #[serde(default = "default_manifest")]
    pub manifest: String,

    /// HTML document generation (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<HtmlOptions>,
}

impl BuildOptions {
    /// Create from serde_json::Value (for programmatic config)
    ///
    /// # Example
    ///
    /// ```
    /// use tessel_config::BuildOptions;
    /// use serde_json::json;
    /// use std::path::PathBuf;
    ///
    /// let options = BuildOptions::from_value(json!({
    ///     "entries": { "index": "src/index.tsx" },
    ///     "mode": "production"
    /// }))
    /// .unwrap();
    ///
    /// assert_eq!(options.entries["index"], PathBuf::from("src/index.tsx"));
    /// assert!(options.mode.is_production());
    /// ```
    pub fn from_value(value: Value) -> Result<Self, ConfigError> {
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            field: "build".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Convert to serde_json::Value
    pub fn to_value(&self) -> Result<Value, ConfigError> {
        serde_json::to_value(self).map_err(|e| ConfigError::InvalidValue {
            field: "build".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Add an entry point.
    ///
    /// ```
    /// use tessel_config::BuildOptions;
    ///
    /// let options = BuildOptions::default()
    ///     .with_entry("index", "src/index.tsx")
    ///     .with_entry("settings", "src/settings.tsx");
    /// assert_eq!(options.entries.len(), 2);
    /// ```
    pub fn with_entry(mut self, name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        self.entries.insert(name.into(), path.into());
        self
    }

    /// Add an entry point named after the file stem (`src/index.tsx` -> `index`).
    pub fn with_entry_path(self, path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let name = entry_name_for(&path);
        self.with_entry(name, path)
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_mode(mut self, mode: BuildMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_rules(mut self, rules: Vec<RuleOptions>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = Some(workers);
        self
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            entries: IndexMap::new(),
            output_dir: default_output_dir(),
            mode: BuildMode::default(),
            resolve: ResolveOptions::default(),
            rules: default_rules(),
            inline_limit: DEFAULT_INLINE_LIMIT,
            workers: None,
            clean: true,
            hash_length: default_hash_length(),
            manifest: default_manifest(),
            html: None,
        }
    }
}

/// Logical entry name derived from a path: its file stem.
pub fn entry_name_for(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("main")
        .to_string()
}

/// Reference resolution options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolveOptions {
    /// Extensions tried, in order, when a specifier does not name a file
    #[serde(default = "ResolveOptions::default_extensions")]
    pub extensions: Vec<String>,

    /// Roots searched, in order, for bare specifiers
    #[serde(default = "ResolveOptions::default_search_paths")]
    pub search_paths: Vec<PathBuf>,

    /// Bare specifiers the host page provides, mapped to the global holding
    /// the module (`"alt-client" = "alt"`)
    #[serde(default = "ResolveOptions::default_externals")]
    pub externals: BTreeMap<String, String>,
}

impl ResolveOptions {
    fn default_extensions() -> Vec<String> {
        vec![".js".to_string(), ".ts".to_string(), ".tsx".to_string()]
    }

    fn default_search_paths() -> Vec<PathBuf> {
        vec![PathBuf::from("src"), PathBuf::from("node_modules")]
    }

    /// The client runtime modules the game client exposes to the view.
    fn default_externals() -> BTreeMap<String, String> {
        ["alt-client", "alt-shared"]
            .into_iter()
            .map(|module| (module.to_string(), "alt".to_string()))
            .collect()
    }

    pub fn with_external(mut self, specifier: impl Into<String>, global: impl Into<String>) -> Self {
        self.externals.insert(specifier.into(), global.into());
        self
    }
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            extensions: Self::default_extensions(),
            search_paths: Self::default_search_paths(),
            externals: Self::default_externals(),
        }
    }
}

/// HTML document generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HtmlOptions {
    /// Template path relative to the project root
    pub template: PathBuf,

    /// Output file name under the output root
    #[serde(default = "default_html_filename")]
    pub filename: String,

    /// Entry whose files are injected; defaults to the first entry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry: Option<String>,
}
