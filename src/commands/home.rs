//! Home the gantry.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{CommandContext, CommandImplementation, CommandResult};
use crate::error::EngineResult;
use crate::types::MotorAxis;

/// Axes to home; `None` homes everything.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HomeParams {
    #[serde(default)]
    pub axes: Option<Vec<MotorAxis>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HomeResult {}

#[async_trait]
impl CommandImplementation for HomeParams {
    async fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<CommandResult> {
        ctx.movement.home(self.axes.clone()).await?;
        Ok(CommandResult::Home(HomeResult {}))
    }
}
