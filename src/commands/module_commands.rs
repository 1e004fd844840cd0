//! Thermocycler lid, heater-shaker latch and magnetic module commands.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{CommandContext, CommandImplementation, CommandResult};
use crate::error::EngineResult;
use crate::hardware::ModuleAction;

/// Parameters of a module command that only names its module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModuleIdParams {
    pub module_id: String,
}

/// Module commands report nothing beyond success.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleCommandResult {}

/// Raise the magnets to `height` above the labware base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagneticEngageParams {
    pub module_id: String,
    pub height: f64,
}

pub(crate) async fn open_lid(params: &ModuleIdParams, ctx: &CommandContext<'_>) -> EngineResult<CommandResult> {
    ctx.state.modules().get_thermocycler_lid_status(&params.module_id)?;
    ctx.equipment
        .module_action(&params.module_id, ModuleAction::OpenLid)
        .await?;
    Ok(CommandResult::ThermocyclerOpenLid(ModuleCommandResult {}))
}

pub(crate) async fn close_lid(params: &ModuleIdParams, ctx: &CommandContext<'_>) -> EngineResult<CommandResult> {
    ctx.state.modules().get_thermocycler_lid_status(&params.module_id)?;
    ctx.equipment
        .module_action(&params.module_id, ModuleAction::CloseLid)
        .await?;
    Ok(CommandResult::ThermocyclerCloseLid(ModuleCommandResult {}))
}

pub(crate) async fn open_latch(params: &ModuleIdParams, ctx: &CommandContext<'_>) -> EngineResult<CommandResult> {
    ctx.state.modules().get_heater_shaker_latch_status(&params.module_id)?;
    ctx.equipment
        .module_action(&params.module_id, ModuleAction::OpenLabwareLatch)
        .await?;
    Ok(CommandResult::HeaterShakerOpenLabwareLatch(ModuleCommandResult {}))
}

pub(crate) async fn close_latch(params: &ModuleIdParams, ctx: &CommandContext<'_>) -> EngineResult<CommandResult> {
    ctx.state.modules().get_heater_shaker_latch_status(&params.module_id)?;
    ctx.equipment
        .module_action(&params.module_id, ModuleAction::CloseLabwareLatch)
        .await?;
    Ok(CommandResult::HeaterShakerCloseLabwareLatch(ModuleCommandResult {}))
}

pub(crate) async fn disengage(params: &ModuleIdParams, ctx: &CommandContext<'_>) -> EngineResult<CommandResult> {
    ctx.state.modules().get_magnet_engaged_height(&params.module_id)?;
    ctx.equipment
        .module_action(&params.module_id, ModuleAction::Disengage)
        .await?;
    Ok(CommandResult::MagneticModuleDisengage(ModuleCommandResult {}))
}

#[async_trait]
impl CommandImplementation for MagneticEngageParams {
    async fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<CommandResult> {
        ctx.state.modules().get_magnet_engaged_height(&self.module_id)?;
        ctx.equipment
            .module_action(&self.module_id, ModuleAction::Engage { height: self.height })
            .await?;
        Ok(CommandResult::MagneticModuleEngage(ModuleCommandResult {}))
    }
}
