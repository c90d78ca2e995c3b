//! `json` stage: validates JSON and turns it into a script module.

use super::{Stage, StageContext, StageError, StageOutput, export_module};

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonStage;

impl Stage for JsonStage {
    fn name(&self) -> &str {
        "json"
    }

    fn apply(&self, ctx: &StageContext<'_>, input: Vec<u8>) -> Result<StageOutput, StageError> {
        let value: serde_json::Value = serde_json::from_slice(&input)
            .map_err(|e| StageError::new(format!("invalid JSON in {}: {}", ctx.id, e)))?;
        let compact = serde_json::to_string(&value).map_err(StageError::new)?;
        Ok(StageOutput::new(export_module(&compact)))
    }
}
