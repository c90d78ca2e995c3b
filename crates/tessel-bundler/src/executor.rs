//! Applies a rule's stage chain to one asset.

use std::path::Path;
use std::sync::Arc;

use tessel_config::BuildMode;

use crate::asset::{Placement, Reference};
use crate::registry::ResolvedRule;
use crate::stages::{Stage, StageContext};
use crate::{Error, Result};

/// Bytes, references and placement after the whole chain ran.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformOutput {
    pub bytes: Vec<u8>,
    /// References from every stage, in stage order, without duplicates
    pub references: Vec<Reference>,
    pub placement: Placement,
}

#[derive(Debug, Clone, Copy)]
pub struct TransformExecutor {
    mode: BuildMode,
    inline_limit: u64,
}

impl TransformExecutor {
    pub fn new(mode: BuildMode, inline_limit: u64) -> Self {
        Self { mode, inline_limit }
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    /// Stage context for `path` under `rule`, honouring a per-rule inline limit.
    pub fn context<'a>(&self, path: &'a Path, id: &'a str, rule: &ResolvedRule) -> StageContext<'a> {
        StageContext {
            path,
            id,
            kind: rule.kind_for(path),
            mode: self.mode,
            inline_limit: rule.inline_limit.unwrap_or(self.inline_limit),
        }
    }

    /// Run `stages` strictly in order. The first failure aborts the chain.
    pub fn apply(
        &self,
        ctx: &StageContext<'_>,
        stages: &[Arc<dyn Stage>],
        bytes: Vec<u8>,
    ) -> Result<TransformOutput> {
        let mut bytes = bytes;
        let mut references: Vec<Reference> = Vec::new();
        let mut placement = Placement::default();

        for stage in stages {
            let output = stage.apply(ctx, bytes).map_err(|cause| Error::Transform {
                stage: stage.name().to_string(),
                path: ctx.id.to_string(),
                cause: cause.to_string(),
            })?;

            tracing::trace!(
                asset = ctx.id,
                stage = stage.name(),
                bytes = output.bytes.len(),
                references = output.references.len(),
                "stage applied"
            );

            bytes = output.bytes;
            for reference in output.references {
                if !references.contains(&reference) {
                    references.push(reference);
                }
            }
            if let Some(decided) = output.placement {
                placement = decided;
            }
        }

        Ok(TransformOutput {
            bytes,
            references,
            placement,
        })
    }
}
