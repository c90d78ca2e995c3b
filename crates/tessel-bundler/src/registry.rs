//! Rule table resolved against the stage table.
//!
//! Built once per run. Every regex is compiled and every stage name looked up
//! up front, so configuration mistakes surface before any asset is read.

use std::path::Path;
use std::sync::Arc;

use regex::Regex;
use tessel_config::{AssetKind, RuleOptions};

use crate::asset::asset_id;
use crate::stages::{Stage, StageTable};
use crate::{Error, Result};

/// One rule with its patterns compiled and stages looked up.
#[derive(Debug, Clone)]
pub struct ResolvedRule {
    pub label: String,
    test: Option<Regex>,
    include: Vec<Regex>,
    exclude: Vec<Regex>,
    kind: Option<AssetKind>,
    pub stages: Vec<Arc<dyn Stage>>,
    pub inline_limit: Option<u64>,
}

impl ResolvedRule {
    fn resolve(rule: &RuleOptions, table: &StageTable) -> Result<Self> {
        let label = rule.label();

        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| {
                Error::InvalidConfig(format!("rule '{}': invalid pattern '{}': {}", label, pattern, e))
            })
        };

        let test = rule.test.as_deref().map(compile).transpose()?;
        let include = rule
            .include
            .iter()
            .map(|p| compile(p.as_str()))
            .collect::<Result<Vec<_>>>()?;
        let exclude = rule
            .exclude
            .iter()
            .map(|p| compile(p.as_str()))
            .collect::<Result<Vec<_>>>()?;

        let stages = rule
            .stages
            .iter()
            .map(|name| {
                table.get(name).ok_or_else(|| Error::UnknownStage {
                    rule: label.clone(),
                    stage: name.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            label,
            test,
            include,
            exclude,
            kind: rule.kind,
            stages,
            inline_limit: rule.inline_limit,
        })
    }

    /// Whether this rule applies to a root-relative `/`-separated path.
    pub fn matches(&self, relative: &str) -> bool {
        if self.test.as_ref().is_some_and(|test| !test.is_match(relative)) {
            return false;
        }
        if !self.include.is_empty() && !self.include.iter().any(|re| re.is_match(relative)) {
            return false;
        }
        !self.exclude.iter().any(|re| re.is_match(relative))
    }

    /// Declared kind, or the kind implied by the file extension.
    pub fn kind_for(&self, path: &Path) -> AssetKind {
        self.kind.unwrap_or_else(|| AssetKind::from_path(path))
    }

    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }
}

/// Ordered rule table; the first matching rule wins.
#[derive(Debug, Clone)]
pub struct TransformRegistry {
    root: std::path::PathBuf,
    rules: Vec<ResolvedRule>,
}

impl TransformRegistry {
    pub fn new(root: impl AsRef<Path>, rules: &[RuleOptions], table: &StageTable) -> Result<Self> {
        let rules = rules
            .iter()
            .map(|rule| ResolvedRule::resolve(rule, table))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(rules = rules.len(), "transform registry ready");
        Ok(Self {
            root: root.as_ref().to_path_buf(),
            rules,
        })
    }

    /// The first rule matching `path`, by declaration order.
    pub fn rules_for(&self, path: &Path) -> Result<&ResolvedRule> {
        let relative = asset_id(&self.root, path);
        self.rules
            .iter()
            .find(|rule| rule.matches(&relative))
            .ok_or(Error::UnsupportedKind { path: relative })
    }

    pub fn rules(&self) -> &[ResolvedRule] {
        &self.rules
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessel_config::default_rules;

    fn registry() -> TransformRegistry {
        TransformRegistry::new("/p", &default_rules(), &StageTable::with_builtins()).unwrap()
    }

    fn stages_for(path: &str) -> (String, Vec<String>) {
        let registry = registry();
        let rule = registry.rules_for(Path::new(path)).unwrap();
        (
            rule.label.clone(),
            rule.stage_names().into_iter().map(String::from).collect(),
        )
    }

    #[test]
    fn default_table_dispatch() {
        assert_eq!(
            stages_for("/p/src/index.tsx"),
            ("typescript".to_string(), vec!["lint".into(), "script".into(), "minify".into()])
        );
        assert_eq!(stages_for("/p/node_modules/lib/index.js").0, "javascript");
        assert_eq!(stages_for("/p/src/a.scss").0, "sass");
        assert_eq!(stages_for("/p/node_modules/normalize.css/normalize.css").0, "vendor-css");
        assert_eq!(stages_for("/p/src/b.html").0, "html");
        assert_eq!(stages_for("/p/src/strings.json").0, "json");
        assert_eq!(stages_for("/p/src/logo.png").0, "media");
        assert_eq!(stages_for("/p/src/font.woff2").0, "file");
    }

    #[test]
    fn include_and_exclude_are_honoured() {
        // .ts under node_modules is excluded from the typescript rule and
        // falls through to the catch-all.
        assert_eq!(stages_for("/p/node_modules/lib/types.ts").0, "file");
        // Plain .css outside node_modules is not picked up by vendor-css.
        assert_eq!(stages_for("/p/src/plain.css").0, "file");
    }

    #[test]
    fn no_match_without_fallback_is_unsupported() {
        let rules = vec![RuleOptions::new(r"\.js$", &["script"])];
        let registry =
            TransformRegistry::new("/p", &rules, &StageTable::with_builtins()).unwrap();
        let err = registry.rules_for(Path::new("/p/src/a.scss")).unwrap_err();
        assert!(matches!(err, Error::UnsupportedKind { ref path } if path == "src/a.scss"));
    }

    #[test]
    fn unknown_stage_is_reported_at_construction() {
        let rules = vec![RuleOptions::new(r"\.js$", &["script", "babel"]).named("js")];
        let err = TransformRegistry::new("/p", &rules, &StageTable::with_builtins()).unwrap_err();
        match err {
            Error::UnknownStage { rule, stage } => {
                assert_eq!(rule, "js");
                assert_eq!(stage, "babel");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn invalid_pattern_is_invalid_config() {
        let rules = vec![RuleOptions::new(r"\.(js$", &["script"])];
        let err = TransformRegistry::new("/p", &rules, &StageTable::with_builtins()).unwrap_err();
        assert!(matches!(err, Error::InvalidConfig(_)));
    }

    #[test]
    fn declared_kind_wins_over_extension() {
        let registry = registry();
        let rule = registry.rules_for(Path::new("/p/src/font.woff2")).unwrap();
        assert_eq!(rule.kind_for(Path::new("/p/src/font.woff2")), AssetKind::Binary);

        let rules = vec![RuleOptions::fallback(&["file"])];
        let registry =
            TransformRegistry::new("/p", &rules, &StageTable::with_builtins()).unwrap();
        let rule = registry.rules_for(Path::new("/p/src/x.css")).unwrap();
        assert_eq!(rule.kind_for(Path::new("/p/src/x.css")), AssetKind::Style);
    }
}
