//! Load an attached module into a deck slot.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{CommandContext, CommandImplementation, CommandResult};
use crate::definitions::ModuleDefinition;
use crate::error::EngineResult;
use crate::types::{DeckSlotLocation, ModuleModel};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadModuleParams {
    pub model: ModuleModel,
    pub location: DeckSlotLocation,
    #[serde(default)]
    pub module_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadModuleResult {
    pub module_id: String,
    pub model: ModuleModel,
    pub serial_number: Option<String>,
    pub definition: ModuleDefinition,
}

#[async_trait]
impl CommandImplementation for LoadModuleParams {
    async fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<CommandResult> {
        let loaded = ctx
            .equipment
            .load_module(self.model, self.location, self.module_id.as_deref())?;
        Ok(CommandResult::LoadModule(LoadModuleResult {
            module_id: loaded.module_id,
            model: self.model,
            serial_number: Some(loaded.serial_number),
            definition: loaded.definition,
        }))
    }
}
