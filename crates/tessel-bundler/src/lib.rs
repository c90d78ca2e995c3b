#![cfg_attr(docsrs, feature(doc_cfg))]

//! # tessel-bundler
//!
//! Static asset bundling for browser-rendered overlay views.
//!
//! The pipeline discovers an asset graph from named entries, runs each asset
//! through the stage chain picked by the rule table, partitions the graph
//! into content-addressed chunks and commits them, together with a manifest,
//! into an output directory in one all-or-nothing step.
//!
//! ## Quick Start
//!
//! ```no_run
//! use tessel_bundler::Pipeline;
//! use tessel_config::{BuildMode, BuildOptions};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = BuildOptions::default()
//!     .with_entry("index", "src/index.tsx")
//!     .with_output_dir("../../resources/view")
//!     .with_mode(BuildMode::Production);
//!
//! let report = Pipeline::new(".", options).run().await?;
//! for file in &report.files {
//!     println!("{} ({} bytes)", file.name, file.size);
//! }
//! # Ok(()) }
//! ```
//!
//! ### Custom stages
//!
//! ```no_run
//! use std::sync::Arc;
//! use tessel_bundler::{Pipeline, Stage, StageContext, StageError, StageOutput, StageTable};
//! use tessel_config::{BuildOptions, RuleOptions};
//!
//! #[derive(Debug)]
//! struct Banner;
//!
//! impl Stage for Banner {
//!     fn name(&self) -> &str {
//!         "banner"
//!     }
//!
//!     fn apply(&self, _ctx: &StageContext<'_>, input: Vec<u8>) -> Result<StageOutput, StageError> {
//!         let mut out = b"/* overlay */\n".to_vec();
//!         out.extend(input);
//!         Ok(StageOutput::new(out))
//!     }
//! }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut stages = StageTable::with_builtins();
//! stages.register(Arc::new(Banner));
//!
//! let options = BuildOptions::default()
//!     .with_entry("index", "src/index.js")
//!     .with_rules(vec![RuleOptions::new(r"\.js$", &["script", "banner"])]);
//!
//! Pipeline::new(".", options).with_stages(stages).run().await?;
//! # Ok(()) }
//! ```

use std::path::PathBuf;

pub mod asset;
pub mod builder;
pub mod executor;
pub mod graph;
pub mod output;
pub mod pipeline;
pub mod planner;
pub mod registry;
pub mod resolver;
pub mod runtime;
pub mod stages;

// Logging utilities (optional, enabled with "logging" feature)
#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub mod logging;

#[cfg(feature = "logging")]
#[cfg_attr(docsrs, doc(cfg(feature = "logging")))]
pub use logging::{LogLevel, init_logging, init_logging_from_env};

pub use asset::{Asset, DependencyEdge, Placement, Reference, ReferenceKind};
pub use builder::GraphBuilder;
pub use executor::{TransformExecutor, TransformOutput};
pub use graph::AssetGraph;
pub use output::{EmittedFile, Emitter, Manifest};
pub use pipeline::{BuildReport, BuildState, Pipeline};
pub use planner::{Chunk, ChunkKind, ChunkPlanner};
pub use registry::{ResolvedRule, TransformRegistry};
pub use resolver::Resolver;
pub use runtime::{MemoryRuntime, NativeRuntime, Runtime, RuntimeError, RuntimeResult};
pub use stages::{Stage, StageContext, StageError, StageOutput, StageTable};
pub use tokio_util::sync::CancellationToken;

/// Error types for tessel-bundler operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A reference could not be found on the resolution search path.
    #[error("Unresolved reference '{specifier}' from {from}")]
    UnresolvedReference { specifier: String, from: String },

    /// No rule (and no fallback rule) matches the asset.
    #[error("Unsupported asset kind: no rule matches {path}")]
    UnsupportedKind { path: String },

    /// A rule names a stage that is not in the stage table.
    #[error("Unknown stage '{stage}' in rule '{rule}'")]
    UnknownStage { rule: String, stage: String },

    /// A transform stage failed.
    #[error("Stage '{stage}' failed for {path}: {cause}")]
    Transform {
        stage: String,
        path: String,
        cause: String,
    },

    /// Writing the build output failed. Previous output is left in place.
    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Invalid output path (e.g., directory traversal attempt).
    #[error("Invalid output path: {0}")]
    InvalidOutputPath(String),

    /// The run was cancelled before completion.
    #[error("Build cancelled")]
    Cancelled,

    /// Reading an input through the runtime failed.
    #[error("Runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    /// Configuration could not be validated.
    #[error("Config error: {0}")]
    Config(#[from] tessel_config::ConfigError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for tessel-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Write {
            path: path.into(),
            source,
        }
    }

    /// Name of the failing stage, when the error came out of a stage chain.
    pub fn stage(&self) -> Option<&str> {
        match self {
            Error::Transform { stage, .. } => Some(stage),
            _ => None,
        }
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        Some(Box::new(match self {
            Error::UnresolvedReference { .. } => "UNRESOLVED_REFERENCE",
            Error::UnsupportedKind { .. } => "UNSUPPORTED_KIND",
            Error::UnknownStage { .. } => "UNKNOWN_STAGE",
            Error::Transform { .. } => "TRANSFORM_FAILED",
            Error::Write { .. } => "WRITE_FAILURE",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::InvalidOutputPath(_) => "INVALID_OUTPUT_PATH",
            Error::Cancelled => "CANCELLED",
            Error::Runtime(_) => "RUNTIME_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Io(_) => "IO_ERROR",
        }))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn std::fmt::Display + '_>> {
        match self {
            Error::UnresolvedReference { specifier, .. } => Some(Box::new(format!(
                "Could not find '{}'.\nRelative specifiers resolve against the importing file, bare ones against resolve.search_paths.\nCheck that the file exists and resolve.extensions covers its extension.",
                specifier
            ))),
            Error::UnsupportedKind { .. } => Some(Box::new(
                "Add a rule whose 'test' matches this file, or a fallback rule without 'test'.",
            )),
            Error::UnknownStage { stage, .. } => Some(Box::new(format!(
                "'{}' is not a registered stage. Built-in stages: {}.",
                stage,
                stages::BUILTIN_STAGES.join(", ")
            ))),
            Error::Write { .. } => Some(Box::new(
                "Check disk space and permissions. The previous build output was left untouched.",
            )),
            Error::InvalidConfig(msg) => Some(Box::new(format!(
                "Check your configuration file for syntax errors.\nError: {}",
                msg
            ))),
            Error::InvalidOutputPath(path) => Some(Box::new(format!(
                "The output path '{}' is invalid. Ensure it's within the output directory and doesn't contain '..' components.",
                path
            ))),
            Error::Cancelled => Some(Box::new("No output was written.")),
            _ => None,
        }
    }
}
