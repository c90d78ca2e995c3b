//! `lint` stage: a small fixed rule set run over script sources.
//!
//! | rule          | severity |
//! |---------------|----------|
//! | `no-debugger` | error    |
//! | `no-console`  | warning  |
//! | `no-var`      | warning  |
//!
//! Errors always fail the stage. Warnings fail it in production and are
//! logged in development.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use super::script::blank_comments;
use super::{Stage, StageContext, StageError, StageOutput, utf8};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintDiagnostic {
    pub rule: &'static str,
    pub severity: Severity,
    /// 1-based line number
    pub line: usize,
    pub message: &'static str,
}

impl fmt::Display for LintDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {} ({})", self.line, self.message, self.rule)
    }
}

struct LintRule {
    name: &'static str,
    severity: Severity,
    message: &'static str,
    pattern: Regex,
}

static RULES: LazyLock<Vec<LintRule>> = LazyLock::new(|| {
    [
        (
            "no-debugger",
            Severity::Error,
            "unexpected 'debugger' statement",
            r"(?:^|[^\w$.])debugger\b",
        ),
        (
            "no-console",
            Severity::Warning,
            "unexpected console call",
            r"(?:^|[^\w$.])console\s*\.\s*(?:log|info|warn|error|debug|trace)\s*\(",
        ),
        (
            "no-var",
            Severity::Warning,
            "unexpected var, use let or const instead",
            r"(?:^|[^\w$.])var\s+[\w$\[{]",
        ),
    ]
    .into_iter()
    .filter_map(|(name, severity, message, pattern)| {
        Regex::new(pattern).ok().map(|pattern| LintRule {
            name,
            severity,
            message,
            pattern,
        })
    })
    .collect()
});

/// Lint `source`, returning diagnostics ordered by line.
pub fn lint_source(source: &str) -> Vec<LintDiagnostic> {
    let code = blank_comments(source);
    let mut diagnostics = Vec::new();

    for rule in RULES.iter() {
        for found in rule.pattern.find_iter(&code) {
            let line = code[..found.start()].matches('\n').count()
                + usize::from(found.as_str().starts_with('\n'))
                + 1;
            diagnostics.push(LintDiagnostic {
                rule: rule.name,
                severity: rule.severity,
                line,
                message: rule.message,
            });
        }
    }

    diagnostics.sort_by_key(|d| d.line);
    diagnostics
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LintStage;

impl Stage for LintStage {
    fn name(&self) -> &str {
        "lint"
    }

    fn apply(&self, ctx: &StageContext<'_>, input: Vec<u8>) -> Result<StageOutput, StageError> {
        let diagnostics = lint_source(utf8(ctx, &input)?);
        let strict = ctx.mode.warnings_as_errors();

        let mut failures = Vec::new();
        for diagnostic in &diagnostics {
            match diagnostic.severity {
                Severity::Error => failures.push(diagnostic.to_string()),
                Severity::Warning if strict => failures.push(diagnostic.to_string()),
                Severity::Warning => {
                    tracing::warn!(
                        asset = ctx.id,
                        rule = diagnostic.rule,
                        line = diagnostic.line,
                        "{}",
                        diagnostic.message
                    );
                }
            }
        }

        if !failures.is_empty() {
            return Err(StageError::new(format!(
                "{} lint problem{}: {}",
                failures.len(),
                if failures.len() == 1 { "" } else { "s" },
                failures.join("; ")
            )));
        }

        Ok(StageOutput::new(input))
    }
}
