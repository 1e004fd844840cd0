//! Load a pipette onto a mount.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{CommandContext, CommandImplementation, CommandResult};
use crate::error::EngineResult;
use crate::types::MountType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadPipetteParams {
    pub pipette_name: String,
    pub mount: MountType,
    #[serde(default)]
    pub pipette_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadPipetteResult {
    pub pipette_id: String,
}

#[async_trait]
impl CommandImplementation for LoadPipetteParams {
    async fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<CommandResult> {
        let pipette_id = ctx
            .equipment
            .load_pipette(&self.pipette_name, self.mount, self.pipette_id.as_deref())?;
        Ok(CommandResult::LoadPipette(LoadPipetteResult { pipette_id }))
    }
}
