//! `script` stage: reports module references, passes bytes through.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;

use super::{Stage, StageContext, StageError, StageOutput, is_external, utf8};
use crate::asset::{Reference, ReferenceKind};

/// `(pattern, kind)` pairs; capture group 1 is the specifier.
const PATTERNS: &[(&str, ReferenceKind)] = &[
    // import x from "y" / import { a, b } from "y" / import "y"
    (
        r#"(?:^|[^\w$.])import\s*(?:[\w$*{}\s,]+?\s*from\s*)?["']([^"'\n]+)["']"#,
        ReferenceKind::Static,
    ),
    // export * from "y" / export { a } from "y"
    (
        r#"(?:^|[^\w$.])export\s*[\w$*{}\s,]*?\s*from\s*["']([^"'\n]+)["']"#,
        ReferenceKind::Static,
    ),
    (
        r#"(?:^|[^\w$.])require\s*\(\s*["']([^"'\n]+)["']\s*\)"#,
        ReferenceKind::Static,
    ),
    (
        r#"(?:^|[^\w$.])import\s*\(\s*["']([^"'\n]+)["']\s*\)"#,
        ReferenceKind::Lazy,
    ),
];

static REFERENCE_PATTERNS: LazyLock<Vec<(Regex, ReferenceKind)>> = LazyLock::new(|| {
    PATTERNS
        .iter()
        .filter_map(|(pattern, kind)| Regex::new(pattern).ok().map(|re| (re, *kind)))
        .collect()
});

static COMMENTS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/|(?m)^[ \t]*//[^\n]*").ok());

#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptStage;

impl Stage for ScriptStage {
    fn name(&self) -> &str {
        "script"
    }

    fn apply(&self, ctx: &StageContext<'_>, input: Vec<u8>) -> Result<StageOutput, StageError> {
        let references = scan_references(utf8(ctx, &input)?);
        Ok(StageOutput::new(input).with_references(references))
    }
}

/// Replace comments with spaces, keeping line breaks so line numbers hold.
pub(crate) fn blank_comments(source: &str) -> Cow<'_, str> {
    match COMMENTS.as_ref() {
        Some(re) => re.replace_all(source, |caps: &regex::Captures<'_>| {
            caps[0]
                .chars()
                .map(|c| if c == '\n' { '\n' } else { ' ' })
                .collect::<String>()
        }),
        None => Cow::Borrowed(source),
    }
}

/// Module references in source order, without duplicates or external URLs.
pub fn scan_references(source: &str) -> Vec<Reference> {
    let stripped = blank_comments(source);

    let mut found: Vec<(usize, Reference)> = Vec::new();
    for (re, kind) in REFERENCE_PATTERNS.iter() {
        for caps in re.captures_iter(&stripped) {
            let Some(spec) = caps.get(1) else { continue };
            if is_external(spec.as_str()) {
                continue;
            }
            found.push((spec.start(), Reference::new(spec.as_str(), *kind)));
        }
    }

    found.sort_by_key(|(pos, _)| *pos);

    let mut references: Vec<Reference> = Vec::with_capacity(found.len());
    for (_, reference) in found {
        if !references.contains(&reference) {
            references.push(reference);
        }
    }
    references
}
