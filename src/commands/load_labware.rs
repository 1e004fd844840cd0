//! Load a labware onto the deck, a module or off-deck storage.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{CommandContext, CommandImplementation, CommandResult};
use crate::definitions::LabwareDefinition;
use crate::error::EngineResult;
use crate::types::LabwareLocation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadLabwareParams {
    pub location: LabwareLocation,
    pub load_name: String,
    pub namespace: String,
    pub version: u32,
    /// Id to use instead of a generated one
    #[serde(default)]
    pub labware_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadLabwareResult {
    pub labware_id: String,
    pub definition: LabwareDefinition,
    /// Calibration offset that applied at load time
    pub offset_id: Option<String>,
}

#[async_trait]
impl CommandImplementation for LoadLabwareParams {
    async fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<CommandResult> {
        let loaded = ctx.equipment.load_labware(
            &self.load_name,
            &self.namespace,
            self.version,
            &self.location,
            self.labware_id.as_deref(),
        )?;
        Ok(CommandResult::LoadLabware(LoadLabwareResult {
            labware_id: loaded.labware_id,
            definition: loaded.definition,
            offset_id: loaded.offset_id,
        }))
    }
}
