//! `url` and `file` stages: binary assets are inlined or emitted as files.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use super::{Stage, StageContext, StageError, StageOutput, export_module};
use crate::asset::Placement;

/// Inlines assets at or below the inline limit as `data:` URIs, otherwise
/// marks them to be emitted as files.
#[derive(Debug, Default, Clone, Copy)]
pub struct UrlStage;

impl Stage for UrlStage {
    fn name(&self) -> &str {
        "url"
    }

    fn apply(&self, ctx: &StageContext<'_>, input: Vec<u8>) -> Result<StageOutput, StageError> {
        if input.len() as u64 > ctx.inline_limit {
            tracing::debug!(
                asset = ctx.id,
                size = input.len(),
                limit = ctx.inline_limit,
                "emitting as file"
            );
            return Ok(StageOutput::new(input).with_placement(Placement::File));
        }

        let extension = ctx
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        let uri = data_uri(mime_type(extension), &input);
        let literal = serde_json::to_string(&uri).map_err(StageError::new)?;

        Ok(StageOutput::new(export_module(&literal)).with_placement(Placement::Inlined))
    }
}

/// Marks the asset to be emitted as a file of its own.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileStage;

impl Stage for FileStage {
    fn name(&self) -> &str {
        "file"
    }

    fn apply(&self, _ctx: &StageContext<'_>, input: Vec<u8>) -> Result<StageOutput, StageError> {
        Ok(StageOutput::new(input).with_placement(Placement::File))
    }
}

pub fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, STANDARD.encode(bytes))
}

pub fn mime_type(extension: &str) -> &'static str {
    match extension.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "ogg" => "audio/ogg",
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        "otf" => "font/otf",
        _ => "application/octet-stream",
    }
}
