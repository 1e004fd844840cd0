//! Move a pipette into a well.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{CommandContext, CommandImplementation, CommandResult};
use crate::error::EngineResult;
use crate::types::{Point, WellLocation};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveToWellParams {
    pub pipette_id: String,
    pub labware_id: String,
    pub well_name: String,
    #[serde(default)]
    pub well_location: WellLocation,
    /// Skip the arc and move straight to the well
    #[serde(default)]
    pub force_direct: bool,
    #[serde(default)]
    pub minimum_z_height: Option<f64>,
    #[serde(default)]
    pub speed: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveToWellResult {
    pub position: Point,
}

#[async_trait]
impl CommandImplementation for MoveToWellParams {
    async fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<CommandResult> {
        let position = ctx
            .movement
            .move_to_well(
                &self.pipette_id,
                &self.labware_id,
                &self.well_name,
                Some(&self.well_location),
                self.force_direct,
                self.minimum_z_height,
                self.speed,
            )
            .await?;
        Ok(CommandResult::MoveToWell(MoveToWellResult { position }))
    }
}
