//! Move a labware to a new location.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::{CommandContext, CommandImplementation, CommandResult};
use crate::config::RobotType;
use crate::error::{EngineError, EngineResult};
use crate::types::{LabwareLocation, LabwareMovementOffsetData, LabwareMovementStrategy};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveLabwareParams {
    pub labware_id: String,
    pub new_location: LabwareLocation,
    #[serde(default)]
    pub strategy: LabwareMovementStrategy,
    /// Extra gripper offsets, ignored by manual moves
    #[serde(flatten)]
    pub offset_data: LabwareMovementOffsetData,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveLabwareResult {
    /// Calibration offset that applies at the new location
    pub offset_id: Option<String>,
}

#[async_trait]
impl CommandImplementation for MoveLabwareParams {
    async fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<CommandResult> {
        let current_location = ctx.state.labware().get_location(&self.labware_id)?.clone();

        // Re-seating a labware where it already is only refreshes its offset
        if current_location != self.new_location {
            ctx.state
                .geometry()
                .ensure_location_not_occupied(self.new_location.clone())?;
        }
        let new_offset_id = ctx
            .equipment
            .find_offset_for_move(&self.labware_id, &self.new_location)?;

        ctx.labware_movement
            .ensure_movement_not_obstructed_by_module(&current_location, &self.new_location)?;

        match self.strategy {
            LabwareMovementStrategy::UsingGripper => {
                if ctx.state.config().robot_type == RobotType::Ot2 {
                    return Err(EngineError::NotSupportedOnRobotType(
                        "Labware movement using a gripper is not supported on the OT-2".to_string(),
                    ));
                }
                if current_location == LabwareLocation::OffDeck || self.new_location == LabwareLocation::OffDeck {
                    return Err(EngineError::LabwareNotOnDeck(format!(
                        "Cannot move labware {} to or from off-deck with the gripper.",
                        self.labware_id
                    )));
                }
                ctx.labware_movement
                    .move_labware_with_gripper(
                        &self.labware_id,
                        &current_location,
                        &self.new_location,
                        &self.offset_data,
                        new_offset_id.as_deref(),
                    )
                    .await?;
            }
            LabwareMovementStrategy::ManualMoveWithPause => {
                info!(
                    "Waiting for labware {} to be moved by hand to {}",
                    self.labware_id, self.new_location
                );
                ctx.run_control.wait_for_resume().await?;
            }
            LabwareMovementStrategy::ManualMoveWithoutPause => {}
        }

        Ok(CommandResult::MoveLabware(MoveLabwareResult {
            offset_id: new_offset_id,
        }))
    }
}
