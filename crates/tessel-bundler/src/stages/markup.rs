//! `markup` stage: HTML fragments become script modules exporting the markup.

use std::sync::LazyLock;

use regex::Regex;

use super::{Stage, StageContext, StageError, StageOutput, export_module, is_external, utf8};
use crate::asset::Reference;

static ATTRIBUTE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"(?i)\s(?:src|href)\s*=\s*["']([^"']+)["']"#).ok());

#[derive(Debug, Default, Clone, Copy)]
pub struct MarkupStage;

impl Stage for MarkupStage {
    fn name(&self) -> &str {
        "markup"
    }

    fn apply(&self, ctx: &StageContext<'_>, input: Vec<u8>) -> Result<StageOutput, StageError> {
        let source = utf8(ctx, &input)?;

        let mut references: Vec<Reference> = Vec::new();
        if let Some(re) = ATTRIBUTE.as_ref() {
            for caps in re.captures_iter(source) {
                let Some(value) = caps.get(1) else { continue };
                let value = value.as_str().trim();
                if is_external(value) {
                    continue;
                }
                let reference = Reference::static_ref(value);
                if !references.contains(&reference) {
                    references.push(reference);
                }
            }
        }

        let literal = serde_json::to_string(source).map_err(StageError::new)?;
        Ok(StageOutput::new(export_module(&literal)).with_references(references))
    }
}
