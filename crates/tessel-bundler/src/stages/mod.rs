//! Transform stages and the stage table.
//!
//! A stage is one named, synchronous transform over an asset's bytes. It may
//! report references it found and decide the asset's placement. Rules refer
//! to stages by name; the names are looked up in a [`StageTable`] once, when
//! the [`TransformRegistry`](crate::TransformRegistry) is built.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use tessel_config::{AssetKind, BuildMode};

use crate::asset::{Placement, Reference};

pub mod env;
pub mod esm;
pub mod json;
pub mod lint;
pub mod markup;
pub mod minify;
pub mod script;
pub mod style;
pub mod url;

pub use env::EnvStage;
pub use esm::EsmStage;
pub use json::JsonStage;
pub use lint::LintStage;
pub use markup::MarkupStage;
pub use minify::MinifyStage;
pub use script::ScriptStage;
pub use style::StyleStage;
pub use url::{FileStage, UrlStage};

/// Names of the stages registered by [`StageTable::with_builtins`].
pub const BUILTIN_STAGES: &[&str] = &[
    "script", "esm", "env", "style", "markup", "json", "url", "file", "lint", "minify",
];

/// What a stage knows about the asset it is transforming.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    /// Absolute path of the asset
    pub path: &'a Path,
    /// Root-relative display id
    pub id: &'a str,
    pub kind: AssetKind,
    pub mode: BuildMode,
    /// Effective inlining threshold in bytes
    pub inline_limit: u64,
}

/// Result of one stage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageOutput {
    pub bytes: Vec<u8>,
    pub references: Vec<Reference>,
    /// `None` keeps the placement decided by earlier stages
    pub placement: Option<Placement>,
}

impl StageOutput {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            references: Vec::new(),
            placement: None,
        }
    }

    pub fn with_references(mut self, references: Vec<Reference>) -> Self {
        self.references = references;
        self
    }

    pub fn with_placement(mut self, placement: Placement) -> Self {
        self.placement = Some(placement);
        self
    }
}

/// Failure reported by a stage. The executor attaches stage name and path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageError(String);

impl StageError {
    pub fn new(message: impl fmt::Display) -> Self {
        Self(message.to_string())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for StageError {}

/// A named, pure transform over an asset's bytes.
///
/// Stages run on the blocking pool and must not touch shared state.
pub trait Stage: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn apply(&self, ctx: &StageContext<'_>, input: Vec<u8>) -> Result<StageOutput, StageError>;
}

/// Stage name -> implementation.
#[derive(Debug, Clone, Default)]
pub struct StageTable {
    stages: FxHashMap<String, Arc<dyn Stage>>,
}

impl StageTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// A table holding every built-in stage.
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        table.register(Arc::new(ScriptStage));
        table.register(Arc::new(EsmStage));
        table.register(Arc::new(EnvStage));
        table.register(Arc::new(StyleStage));
        table.register(Arc::new(MarkupStage));
        table.register(Arc::new(JsonStage));
        table.register(Arc::new(UrlStage));
        table.register(Arc::new(FileStage));
        table.register(Arc::new(LintStage));
        table.register(Arc::new(MinifyStage));
        table
    }

    /// Register a stage under its own name, replacing any stage of that name.
    pub fn register(&mut self, stage: Arc<dyn Stage>) -> &mut Self {
        let name = stage.name().to_string();
        if self.stages.insert(name.clone(), stage).is_some() {
            tracing::debug!(stage = %name, "replaced registered stage");
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Stage>> {
        self.stages.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.stages.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.stages.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// References to other origins or inline data are left alone.
pub(crate) fn is_external(specifier: &str) -> bool {
    let lower = specifier.trim().to_ascii_lowercase();
    lower.is_empty()
        || lower.starts_with("http:")
        || lower.starts_with("https:")
        || lower.starts_with("//")
        || lower.starts_with("data:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("javascript:")
        || lower.starts_with('#')
        || lower.starts_with("about:")
}

/// Wrap a JSON value as a CommonJS module body.
pub(crate) fn export_module(value: &str) -> Vec<u8> {
    format!("module.exports = {};\n", value).into_bytes()
}

/// Decode bytes as UTF-8 or fail the stage.
pub(crate) fn utf8<'a>(ctx: &StageContext<'_>, bytes: &'a [u8]) -> Result<&'a str, StageError> {
    std::str::from_utf8(bytes)
        .map_err(|e| StageError::new(format!("{} is not valid UTF-8: {}", ctx.id, e)))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn ctx<'a>(path: &'a Path, kind: AssetKind, mode: BuildMode) -> StageContext<'a> {
        StageContext {
            path,
            id: path.to_str().unwrap_or_default(),
            kind,
            mode,
            inline_limit: tessel_config::DEFAULT_INLINE_LIMIT,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Upper;

    impl Stage for Upper {
        fn name(&self) -> &str {
            "script"
        }

        fn apply(&self, _ctx: &StageContext<'_>, input: Vec<u8>) -> Result<StageOutput, StageError> {
            Ok(StageOutput::new(input.to_ascii_uppercase()))
        }
    }

    #[test]
    fn builtins_are_registered() {
        let table = StageTable::with_builtins();
        assert_eq!(table.names().len(), BUILTIN_STAGES.len());
        for name in BUILTIN_STAGES {
            assert!(table.contains(name), "missing {name}");
        }
    }

    #[test]
    fn register_replaces_by_name() {
        let mut table = StageTable::with_builtins();
        table.register(Arc::new(Upper));
        let stage = table.get("script").unwrap();
        let ctx = test_support::ctx(Path::new("a.js"), AssetKind::Script, BuildMode::Development);
        assert_eq!(stage.apply(&ctx, b"abc".to_vec()).unwrap().bytes, b"ABC");
    }

    #[test]
    fn external_references_are_detected() {
        assert!(is_external("https://cdn.example.com/x.js"));
        assert!(is_external("//cdn.example.com/x.js"));
        assert!(is_external("data:image/png;base64,AAAA"));
        assert!(is_external("#icon"));
        assert!(!is_external("./a.scss"));
        assert!(!is_external("normalize.css"));
    }
}
