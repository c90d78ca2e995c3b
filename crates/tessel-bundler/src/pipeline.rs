//! One build run, from options to committed output.
//!
//! The run moves through `Idle -> Resolving -> Transforming -> Planning ->
//! Emitting -> Done`. The first error from any phase moves it to `Failed`
//! and is returned unchanged; nothing is retried.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use path_clean::PathClean;
use serde::Serialize;
use tessel_config::{BuildMode, BuildOptions, validate_schema};
use tokio_util::sync::CancellationToken;

use crate::builder::{GraphBuilder, default_workers};
use crate::executor::TransformExecutor;
use crate::output::{EmittedFile, Emitter, Manifest, writer};
use crate::planner::ChunkPlanner;
use crate::registry::TransformRegistry;
use crate::resolver::Resolver;
use crate::runtime::{NativeRuntime, Runtime};
use crate::stages::StageTable;
use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildState {
    Idle,
    Resolving,
    Transforming,
    Planning,
    Emitting,
    Done,
    Failed,
}

impl BuildState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, BuildState::Done | BuildState::Failed)
    }

    /// Whether a run may move from `self` to `next`.
    pub fn can_transition_to(&self, next: BuildState) -> bool {
        use BuildState::*;
        match (self, next) {
            (Idle | Done | Failed, Resolving) => true,
            (Resolving, Transforming) => true,
            (Transforming, Planning) => true,
            (Planning, Emitting) => true,
            (Emitting, Done) => true,
            (Resolving | Transforming | Planning | Emitting, Failed) => true,
            _ => false,
        }
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BuildState::Idle => "idle",
            BuildState::Resolving => "resolving",
            BuildState::Transforming => "transforming",
            BuildState::Planning => "planning",
            BuildState::Emitting => "emitting",
            BuildState::Done => "done",
            BuildState::Failed => "failed",
        })
    }
}

/// Time spent in one phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PhaseTiming {
    pub state: BuildState,
    pub duration: Duration,
}

/// Summary of a successful run.
#[derive(Debug, Clone)]
pub struct BuildReport {
    pub mode: BuildMode,
    pub output_dir: PathBuf,
    /// Every file written, the manifest last
    pub files: Vec<EmittedFile>,
    pub manifest: Manifest,
    pub assets: usize,
    pub chunks: usize,
    /// Bytes read from sources
    pub source_size: u64,
    /// Stale files removed from the output directory
    pub removed: usize,
    pub phases: Vec<PhaseTiming>,
    pub duration: Duration,
}

impl BuildReport {
    /// Bytes written, across every emitted file.
    pub fn output_size(&self) -> u64 {
        self.files.iter().map(|file| file.size).sum()
    }
}

#[derive(Debug, Default)]
struct StateLog {
    current: Option<BuildState>,
    entered: Option<Instant>,
    phases: Vec<PhaseTiming>,
    history: Vec<BuildState>,
}

/// A configured build. `run` may be called repeatedly; each call starts over.
#[derive(Debug)]
pub struct Pipeline {
    root: PathBuf,
    options: BuildOptions,
    stages: StageTable,
    runtime: Arc<dyn Runtime>,
    cancel: CancellationToken,
    log: Mutex<StateLog>,
}

impl Pipeline {
    pub fn new(root: impl AsRef<Path>, options: BuildOptions) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            options,
            stages: StageTable::with_builtins(),
            runtime: Arc::new(NativeRuntime::new()),
            cancel: CancellationToken::new(),
            log: Mutex::new(StateLog::default()),
        }
    }

    /// Replace the stage table, e.g. to add custom stages.
    pub fn with_stages(mut self, stages: StageTable) -> Self {
        self.stages = stages;
        self
    }

    /// Read sources through `runtime` instead of the filesystem.
    pub fn with_runtime(mut self, runtime: Arc<dyn Runtime>) -> Self {
        self.runtime = runtime;
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// A clone of the token that cancels this pipeline.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn state(&self) -> BuildState {
        self.log.lock().current.unwrap_or(BuildState::Idle)
    }

    /// Every state entered by the most recent run, in order.
    pub fn history(&self) -> Vec<BuildState> {
        self.log.lock().history.clone()
    }

    pub async fn run(&self) -> Result<BuildReport> {
        let started = Instant::now();
        {
            let mut log = self.log.lock();
            log.history.clear();
            log.phases.clear();
        }
        self.transition(BuildState::Resolving);

        match self.execute(started).await {
            Ok(mut report) => {
                self.transition(BuildState::Done);
                report.phases = self.log.lock().phases.clone();
                report.duration = started.elapsed();
                tracing::info!(
                    files = report.files.len(),
                    bytes = report.output_size(),
                    elapsed_ms = report.duration.as_millis() as u64,
                    "build finished"
                );
                Ok(report)
            }
            Err(err) => {
                let failed_in = self.state();
                self.transition(BuildState::Failed);
                tracing::error!(state = %failed_in, error = %err, "build failed");
                Err(err)
            }
        }
    }

    async fn execute(&self, started: Instant) -> Result<BuildReport> {
        let options = &self.options;

        // Resolving: configuration, rule table and entry points.
        validate_schema(options)?;
        let root = writer::validate_and_normalize_dir(&self.root)?;
        let registry = Arc::new(TransformRegistry::new(&root, &options.rules, &self.stages)?);
        let resolver = Resolver::new(&root, &options.resolve, Arc::clone(&self.runtime));
        for (name, entry) in &options.entries {
            resolver.resolve_entry(name, entry).await?;
        }
        self.check_cancelled()?;

        self.transition(BuildState::Transforming);
        let workers = options.workers.unwrap_or_else(default_workers);
        let builder = GraphBuilder::new(
            resolver,
            registry,
            TransformExecutor::new(options.mode, options.inline_limit),
            Arc::clone(&self.runtime),
        )
        .with_workers(workers)
        .with_cancel(self.cancel.clone());
        let graph = builder.resolve(&options.entries).await?;
        self.check_cancelled()?;

        self.transition(BuildState::Planning);
        let chunks = ChunkPlanner::new().plan(&graph);
        tracing::info!(chunks = chunks.len(), "chunk plan ready");
        self.check_cancelled()?;

        self.transition(BuildState::Emitting);
        let output_dir = root.join(&options.output_dir).clean();
        let emitter = Emitter::new(options).with_project_root(&root);
        let rendered = emitter.render(&graph, &chunks)?;
        self.check_cancelled()?;

        let (removed, rendered) = {
            let output_dir = output_dir.clone();
            tokio::task::spawn_blocking(move || {
                emitter
                    .commit(&rendered, &output_dir)
                    .map(|removed| (removed, rendered))
            })
            .await
            .map_err(|e| Error::Io(std::io::Error::other(e.to_string())))??
        };
        tracing::info!(
            output = %output_dir.display(),
            files = rendered.emitted.len(),
            removed,
            "output committed"
        );

        Ok(BuildReport {
            mode: options.mode,
            output_dir,
            files: rendered.emitted,
            manifest: rendered.manifest,
            assets: graph.len(),
            chunks: chunks.len(),
            source_size: graph.source_size(),
            removed,
            phases: Vec::new(),
            duration: started.elapsed(),
        })
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    fn transition(&self, next: BuildState) {
        let mut log = self.log.lock();
        let now = Instant::now();
        let previous = log.current.unwrap_or(BuildState::Idle);
        debug_assert!(
            previous.can_transition_to(next),
            "invalid build state transition {previous} -> {next}"
        );

        if let (Some(state), Some(entered)) = (log.current, log.entered) {
            if !state.is_terminal() {
                log.phases.push(PhaseTiming {
                    state,
                    duration: now.duration_since(entered),
                });
            }
        }

        log.current = Some(next);
        log.entered = Some(now);
        log.history.push(next);
        tracing::debug!(from = %previous, to = %next, "build state");
    }
}
