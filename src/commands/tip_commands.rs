//! Tip pick-up and drop commands.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{CommandContext, CommandImplementation, CommandResult};
use crate::error::{EngineError, EngineResult};
use crate::types::{DropTipWellLocation, Point, WellLocation};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickUpTipParams {
    pub pipette_id: String,
    pub labware_id: String,
    pub well_name: String,
    #[serde(default)]
    pub well_location: WellLocation,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PickUpTipResult {
    pub tip_volume: f64,
    pub tip_length: f64,
    pub tip_diameter: f64,
    pub position: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DropTipParams {
    pub pipette_id: String,
    pub labware_id: String,
    pub well_name: String,
    #[serde(default)]
    pub well_location: DropTipWellLocation,
    /// Home the plunger after dropping; defaults to true
    #[serde(default)]
    pub home_after: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DropTipResult {
    pub position: Point,
}

#[async_trait]
impl CommandImplementation for PickUpTipParams {
    async fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<CommandResult> {
        if !ctx.state.labware().is_tiprack(&self.labware_id)? {
            return Err(EngineError::LabwareIsNotTipRack(format!(
                "Labware {} is not a tip rack.",
                self.labware_id
            )));
        }
        let position = ctx
            .movement
            .move_to_well(
                &self.pipette_id,
                &self.labware_id,
                &self.well_name,
                Some(&self.well_location),
                false,
                None,
                None,
            )
            .await?;
        let tip = ctx
            .tip_handler
            .pick_up_tip(&self.pipette_id, &self.labware_id, &self.well_name)
            .await?;

        Ok(CommandResult::PickUpTip(PickUpTipResult {
            tip_volume: tip.volume,
            tip_length: tip.length,
            tip_diameter: tip.diameter,
            position,
        }))
    }
}

#[async_trait]
impl CommandImplementation for DropTipParams {
    async fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<CommandResult> {
        if !ctx.state.pipettes().get_has_tip(&self.pipette_id) {
            ctx.state.pipettes().get(&self.pipette_id)?;
            return Err(EngineError::TipNotAttached(format!(
                "Pipette {} has no tip to drop.",
                self.pipette_id
            )));
        }
        let well_location =
            ctx.state
                .geometry()
                .get_tip_drop_location(&self.pipette_id, &self.labware_id, &self.well_location)?;

        let position = ctx
            .movement
            .move_to_well(
                &self.pipette_id,
                &self.labware_id,
                &self.well_name,
                Some(&well_location),
                false,
                None,
                None,
            )
            .await?;
        ctx.tip_handler.drop_tip(&self.pipette_id, self.home_after).await?;

        Ok(CommandResult::DropTip(DropTipResult { position }))
    }
}
