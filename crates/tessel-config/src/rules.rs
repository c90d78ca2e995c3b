//! Transform rule table configuration.
//!
//! Rules are plain data: a path pattern plus an ordered list of stage names.
//! The bundler resolves the stage names against its stage table once at
//! startup, so a typo in a stage name is reported before any file is read.

use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Declared kind of an asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Script,
    Style,
    Markup,
    Json,
    Binary,
}

impl AssetKind {
    /// Derive a kind from a file extension.
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        match ext.as_str() {
            "js" | "mjs" | "cjs" | "jsx" | "ts" | "tsx" => AssetKind::Script,
            "css" | "scss" | "sass" => AssetKind::Style,
            "html" | "htm" => AssetKind::Markup,
            "json" => AssetKind::Json,
            _ => AssetKind::Binary,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Script => "script",
            AssetKind::Style => "style",
            AssetKind::Markup => "markup",
            AssetKind::Json => "json",
            AssetKind::Binary => "binary",
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of the transform rule table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleOptions {
    /// Optional label used in error messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Regex matched against the project-relative path.
    /// A rule without `test` matches everything (fallback rule).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test: Option<String>,

    /// When non-empty, at least one of these must match as well
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub include: Vec<String>,

    /// Paths matching any of these are rejected by this rule
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,

    /// Declared asset kind; derived from the extension when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<AssetKind>,

    /// Ordered stage names applied to matching assets
    #[serde(default)]
    pub stages: Vec<String>,

    /// Per-rule override of the inlining threshold (bytes)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_limit: Option<u64>,
}

impl RuleOptions {
    pub fn new(test: impl Into<String>, stages: &[&str]) -> Self {
        Self {
            name: None,
            test: Some(test.into()),
            include: Vec::new(),
            exclude: Vec::new(),
            kind: None,
            stages: stages.iter().map(|s| s.to_string()).collect(),
            inline_limit: None,
        }
    }

    /// A catch-all rule.
    pub fn fallback(stages: &[&str]) -> Self {
        Self {
            test: None,
            ..Self::new("", stages)
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn include(mut self, pattern: impl Into<String>) -> Self {
        self.include.push(pattern.into());
        self
    }

    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude.push(pattern.into());
        self
    }

    pub fn kind(mut self, kind: AssetKind) -> Self {
        self.kind = Some(kind);
        self
    }

    pub fn inline_limit(mut self, limit: u64) -> Self {
        self.inline_limit = Some(limit);
        self
    }

    pub fn is_fallback(&self) -> bool {
        self.test.is_none()
    }

    /// Label for diagnostics: the explicit name, the pattern, or `<fallback>`.
    pub fn label(&self) -> String {
        match (&self.name, &self.test) {
            (Some(name), _) => name.clone(),
            (None, Some(test)) => test.clone(),
            (None, None) => "<fallback>".to_string(),
        }
    }
}

/// The rule table used when a config does not declare its own.
///
/// Scripts are linted before anything else touches them, then get the build
/// mode substituted and their module syntax converted. Third-party
/// stylesheets are only picked up from `node_modules`, small images are
/// inlined, and whatever is left is copied as a file.
pub fn default_rules() -> Vec<RuleOptions> {
    vec![
        RuleOptions::new(r"\.tsx?$", &["lint", "env", "script", "esm", "minify"])
            .named("typescript")
            .exclude("node_modules")
            .kind(AssetKind::Script),
        RuleOptions::new(r"\.m?jsx?$", &["env", "script", "esm", "minify"])
            .named("javascript")
            .kind(AssetKind::Script),
        RuleOptions::new(r"\.css$", &["style", "minify"])
            .named("vendor-css")
            .include("node_modules")
            .kind(AssetKind::Style),
        RuleOptions::new(r"\.(scss|sass)$", &["style", "minify"])
            .named("sass")
            .exclude("node_modules")
            .kind(AssetKind::Style),
        RuleOptions::new(r"\.html$", &["markup"])
            .named("html")
            .kind(AssetKind::Markup),
        RuleOptions::new(r"\.json$", &["json"])
            .named("json")
            .kind(AssetKind::Json),
        RuleOptions::new(r"\.(png|svg|ogg|jpe?g)$", &["url"])
            .named("media")
            .kind(AssetKind::Binary),
        RuleOptions::fallback(&["file"])
            .named("file")
            .kind(AssetKind::Binary),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn kind_from_extension() {
        assert_eq!(AssetKind::from_path(&PathBuf::from("a/b.TSX")), AssetKind::Script);
        assert_eq!(AssetKind::from_path(&PathBuf::from("a.scss")), AssetKind::Style);
        assert_eq!(AssetKind::from_path(&PathBuf::from("index.html")), AssetKind::Markup);
        assert_eq!(AssetKind::from_path(&PathBuf::from("data.json")), AssetKind::Json);
        assert_eq!(AssetKind::from_path(&PathBuf::from("logo.png")), AssetKind::Binary);
        assert_eq!(AssetKind::from_path(&PathBuf::from("LICENSE")), AssetKind::Binary);
    }

    #[test]
    fn default_rules_end_with_fallback() {
        let rules = default_rules();
        assert!(rules.last().unwrap().is_fallback());
        assert_eq!(rules.iter().filter(|r| r.is_fallback()).count(), 1);
    }

    #[test]
    fn rule_round_trips_through_json() {
        let rule = RuleOptions::new(r"\.png$", &["url"]).inline_limit(1024);
        let value = serde_json::to_value(&rule).unwrap();
        assert_eq!(value["test"], r"\.png$");
        assert!(value.get("include").is_none());
        let back: RuleOptions = serde_json::from_value(value).unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn label_prefers_name() {
        assert_eq!(RuleOptions::fallback(&["file"]).label(), "<fallback>");
        assert_eq!(RuleOptions::new("x", &[]).label(), "x");
        assert_eq!(RuleOptions::new("x", &[]).named("n").label(), "n");
    }
}
