//! `style` stage: reports `@import` and `url()` references of stylesheets.

use std::sync::LazyLock;

use regex::Regex;

use super::{Stage, StageContext, StageError, StageOutput, is_external, utf8};
use crate::asset::Reference;

static IMPORT: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r#"@import\s+(?:url\(\s*)?["']?([^"')\s;]+)["']?\s*\)?"#).ok()
});

static URL: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r#"url\(\s*["']?([^"')]+?)["']?\s*\)"#).ok());

static COMMENTS: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").ok());

#[derive(Debug, Default, Clone, Copy)]
pub struct StyleStage;

impl Stage for StyleStage {
    fn name(&self) -> &str {
        "style"
    }

    fn apply(&self, ctx: &StageContext<'_>, input: Vec<u8>) -> Result<StageOutput, StageError> {
        let references = scan_references(utf8(ctx, &input)?);
        Ok(StageOutput::new(input).with_references(references))
    }
}

/// Static references of a stylesheet in source order.
pub fn scan_references(source: &str) -> Vec<Reference> {
    let stripped = match COMMENTS.as_ref() {
        Some(re) => re.replace_all(source, ""),
        None => source.into(),
    };

    let mut found: Vec<(usize, String)> = Vec::new();
    for re in [IMPORT.as_ref(), URL.as_ref()].into_iter().flatten() {
        for caps in re.captures_iter(&stripped) {
            let Some(spec) = caps.get(1) else { continue };
            let value = spec.as_str().trim();
            if is_external(value) {
                continue;
            }
            found.push((spec.start(), value.to_string()));
        }
    }
    found.sort_by_key(|(pos, _)| *pos);

    let mut references: Vec<Reference> = Vec::new();
    for (_, specifier) in found {
        let reference = Reference::static_ref(specifier);
        if !references.contains(&reference) {
            references.push(reference);
        }
    }
    references
}
