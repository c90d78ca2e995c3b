//! `minify` stage: oxc for scripts, lightningcss for stylesheets.
//!
//! Only active in production builds; development output is left readable.

use std::path::Path;

use lightningcss::printer::PrinterOptions;
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, StyleSheet};
use oxc::allocator::Allocator;
use oxc::codegen::{Codegen, CodegenOptions, CommentOptions};
use oxc::mangler::MangleOptions;
use oxc::minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc::parser::Parser;
use oxc::span::SourceType;
use tessel_config::AssetKind;

use super::{Stage, StageContext, StageError, StageOutput, utf8};

#[derive(Debug, Default, Clone, Copy)]
pub struct MinifyStage;

impl Stage for MinifyStage {
    fn name(&self) -> &str {
        "minify"
    }

    fn apply(&self, ctx: &StageContext<'_>, input: Vec<u8>) -> Result<StageOutput, StageError> {
        if !ctx.mode.minify() {
            return Ok(StageOutput::new(input));
        }

        let minified = match ctx.kind {
            AssetKind::Script => minify_js(ctx.path, utf8(ctx, &input)?)?,
            AssetKind::Style => minify_css(ctx.path, utf8(ctx, &input)?)?,
            _ => return Ok(StageOutput::new(input)),
        };

        tracing::debug!(
            asset = ctx.id,
            before = input.len(),
            after = minified.len(),
            "minified"
        );
        Ok(StageOutput::new(minified.into_bytes()))
    }
}

/// Minify JavaScript or TypeScript source code.
pub fn minify_js(path: &Path, source: &str) -> Result<String, StageError> {
    let allocator = Allocator::default();
    let source_type = SourceType::from_path(path).unwrap_or_else(|_| SourceType::mjs());
    let ret = Parser::new(&allocator, source, source_type).parse();
    if let Some(error) = ret.errors.first() {
        return Err(StageError::new(format!(
            "failed to parse {}: {}{}",
            path.display(),
            error,
            if ret.errors.len() > 1 {
                format!(" (and {} more)", ret.errors.len() - 1)
            } else {
                String::new()
            }
        )));
    }

    let mut program = ret.program;
    let options = MinifierOptions {
        mangle: Some(MangleOptions::default()),
        compress: Some(CompressOptions::smallest()),
    };
    let ret = Minifier::new(options).minify(&allocator, &mut program);
    let code = Codegen::new()
        .with_options(CodegenOptions {
            minify: true,
            comments: CommentOptions::disabled(),
            ..CodegenOptions::default()
        })
        .with_scoping(ret.scoping)
        .build(&program)
        .code;
    Ok(code)
}

/// Minify CSS source code.
pub fn minify_css(path: &Path, source: &str) -> Result<String, StageError> {
    let mut stylesheet = StyleSheet::parse(
        source,
        ParserOptions {
            filename: path.to_string_lossy().to_string(),
            ..Default::default()
        },
    )
    .map_err(|e| StageError::new(format!("failed to parse {}: {}", path.display(), e)))?;

    stylesheet
        .minify(MinifyOptions::default())
        .map_err(|e| StageError::new(format!("failed to minify {}: {}", path.display(), e)))?;

    let result = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..Default::default()
        })
        .map_err(|e| StageError::new(format!("failed to print {}: {}", path.display(), e)))?;

    Ok(result.code)
}
