//! `env` stage: replaces `process.env.NODE_ENV` with the build mode.
//!
//! The view runs in a browser, where `process` does not exist; libraries
//! branch on the literal instead.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use super::{Stage, StageContext, StageError, StageOutput, utf8};

static NODE_ENV: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(^|[^\w$.])process\s*\.\s*env\s*\.\s*NODE_ENV\b").ok());

#[derive(Debug, Default, Clone, Copy)]
pub struct EnvStage;

impl Stage for EnvStage {
    fn name(&self) -> &str {
        "env"
    }

    fn apply(&self, ctx: &StageContext<'_>, input: Vec<u8>) -> Result<StageOutput, StageError> {
        let source = utf8(ctx, &input)?;
        let Some(re) = NODE_ENV.as_ref() else {
            return Ok(StageOutput::new(input));
        };

        let literal = format!("${{1}}\"{}\"", ctx.mode.as_str());
        match re.replace_all(source, literal.as_str()) {
            Cow::Borrowed(_) => Ok(StageOutput::new(input)),
            Cow::Owned(replaced) => {
                tracing::trace!(asset = ctx.id, mode = %ctx.mode, "substituted NODE_ENV");
                Ok(StageOutput::new(replaced.into_bytes()))
            }
        }
    }
}
