//! Asset graph discovery.
//!
//! One coordinator owns the visited set and the graph. Transform jobs run in
//! a `JoinSet` bounded by a `Semaphore`; each job reads its file through the
//! [`Runtime`] and runs the stage chain on the blocking pool, then hands its
//! result back. The coordinator resolves the reported references and
//! schedules every newly seen asset exactly once.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};
use tokio_util::sync::CancellationToken;

use crate::asset::{Asset, DependencyEdge, asset_id, fingerprint_with_externals};
use crate::executor::{TransformExecutor, TransformOutput};
use crate::graph::AssetGraph;
use crate::registry::TransformRegistry;
use crate::resolver::Resolver;
use crate::runtime::{Runtime, RuntimeError};
use crate::{Error, Result};

/// Default worker count: CPU count, capped at 8.
pub fn default_workers() -> usize {
    num_cpus::get().clamp(1, 8)
}

/// What a transform job hands back to the coordinator.
struct Processed {
    path: PathBuf,
    id: String,
    rule: String,
    kind: tessel_config::AssetKind,
    source_size: u64,
    output: TransformOutput,
}

#[derive(Debug, Clone)]
pub struct GraphBuilder {
    resolver: Resolver,
    registry: Arc<TransformRegistry>,
    executor: TransformExecutor,
    runtime: Arc<dyn Runtime>,
    workers: usize,
    cancel: CancellationToken,
}

impl GraphBuilder {
    pub fn new(
        resolver: Resolver,
        registry: Arc<TransformRegistry>,
        executor: TransformExecutor,
        runtime: Arc<dyn Runtime>,
    ) -> Self {
        Self {
            resolver,
            registry,
            executor,
            runtime,
            workers: default_workers(),
            cancel: CancellationToken::new(),
        }
    }

    /// Upper bound on concurrent transform jobs (at least 1).
    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn root(&self) -> &Path {
        self.resolver.root()
    }

    /// Discover and transform everything reachable from `entries`.
    ///
    /// The first error aborts every in-flight job and is returned as is.
    pub async fn resolve(&self, entries: &IndexMap<String, PathBuf>) -> Result<AssetGraph> {
        let mut graph = AssetGraph::new(self.root());
        let mut visited: FxHashSet<PathBuf> = FxHashSet::default();
        let mut jobs: JoinSet<Result<Processed>> = JoinSet::new();
        let semaphore = Arc::new(Semaphore::new(self.workers));

        tracing::debug!(entries = entries.len(), workers = self.workers, "resolving asset graph");

        for (name, entry) in entries {
            let path = self.resolver.resolve_entry(name, entry).await?;
            graph.add_entry(name.clone(), path.clone());
            if visited.insert(path.clone()) {
                self.spawn_job(&mut jobs, &semaphore, path)?;
            }
        }

        loop {
            if self.cancel.is_cancelled() {
                jobs.abort_all();
                return Err(Error::Cancelled);
            }

            let joined = tokio::select! {
                _ = self.cancel.cancelled() => None,
                joined = jobs.join_next() => Some(joined),
            };
            let Some(joined) = joined else {
                jobs.abort_all();
                return Err(Error::Cancelled);
            };

            let processed = match joined {
                None => break,
                Some(Ok(Ok(processed))) => processed,
                Some(Ok(Err(err))) => {
                    jobs.abort_all();
                    return Err(err);
                }
                Some(Err(join_err)) => {
                    jobs.abort_all();
                    if join_err.is_cancelled() {
                        return Err(Error::Cancelled);
                    }
                    return Err(Error::Runtime(RuntimeError::Other(format!(
                        "transform task failed: {}",
                        join_err
                    ))));
                }
            };

            let mut dependencies: Vec<DependencyEdge> = Vec::new();
            let mut externals: BTreeMap<String, String> = BTreeMap::new();
            for reference in &processed.output.references {
                if let Some(global) = self.resolver.external(&reference.specifier) {
                    externals.insert(reference.specifier.clone(), global.to_string());
                    continue;
                }

                let target = match self.resolver.resolve(&reference.specifier, &processed.path).await {
                    Ok(target) => target,
                    Err(err) => {
                        jobs.abort_all();
                        return Err(err);
                    }
                };

                if dependencies
                    .iter()
                    .any(|edge| edge.to == target && edge.kind == reference.kind)
                {
                    continue;
                }

                if visited.insert(target.clone()) {
                    if let Err(err) = self.spawn_job(&mut jobs, &semaphore, target.clone()) {
                        jobs.abort_all();
                        return Err(err);
                    }
                } else {
                    tracing::trace!(
                        from = %processed.id,
                        to = %target.display(),
                        "edge to visited asset"
                    );
                }

                dependencies.push(DependencyEdge {
                    from: processed.path.clone(),
                    to: target,
                    kind: reference.kind,
                    specifier: reference.specifier.clone(),
                });
            }

            let Processed {
                path,
                id,
                rule,
                kind,
                source_size,
                output,
            } = processed;

            tracing::debug!(
                asset = %id,
                rule = %rule,
                placement = ?output.placement,
                dependencies = dependencies.len(),
                externals = externals.len(),
                "asset transformed"
            );

            graph.insert(Asset {
                fingerprint: fingerprint_with_externals(&output.bytes, &externals),
                path,
                id,
                kind,
                rule,
                source_size,
                bytes: output.bytes,
                placement: output.placement,
                dependencies,
                externals,
            });
        }

        tracing::info!(assets = graph.len(), "asset graph resolved");
        Ok(graph)
    }

    /// Look up the rule, then read and transform `path` on the worker pool.
    fn spawn_job(
        &self,
        jobs: &mut JoinSet<Result<Processed>>,
        semaphore: &Arc<Semaphore>,
        path: PathBuf,
    ) -> Result<()> {
        // Unsupported files fail here, before anything is read.
        let rule = self.registry.rules_for(&path)?.clone();
        let id = asset_id(self.root(), &path);
        let runtime = Arc::clone(&self.runtime);
        let semaphore = Arc::clone(semaphore);
        let executor = self.executor;

        jobs.spawn(async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|_| Error::Cancelled)?;

            let bytes = runtime.read_file(&path).await?;
            let source_size = bytes.len() as u64;

            task::spawn_blocking(move || -> Result<Processed> {
                let ctx = executor.context(&path, &id, &rule);
                let output = executor.apply(&ctx, &rule.stages, bytes)?;
                let kind = ctx.kind;
                Ok(Processed {
                    path,
                    id,
                    rule: rule.label,
                    kind,
                    source_size,
                    output,
                })
            })
            .await
            .map_err(|e| Error::Runtime(RuntimeError::Other(format!("transform task failed: {}", e))))?
        });

        Ok(())
    }
}
