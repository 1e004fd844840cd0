//! Move a pipette along one axis.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{CommandContext, CommandImplementation, CommandResult};
use crate::error::EngineResult;
use crate::types::{MovementAxis, Point};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRelativeParams {
    pub pipette_id: String,
    pub axis: MovementAxis,
    /// Distance in millimeters, negative to move toward the origin
    pub distance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRelativeResult {
    pub position: Point,
}

#[async_trait]
impl CommandImplementation for MoveRelativeParams {
    async fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<CommandResult> {
        let position = ctx
            .movement
            .move_relative(&self.pipette_id, self.axis, self.distance)
            .await?;
        Ok(CommandResult::MoveRelative(MoveRelativeResult { position }))
    }
}
