//! Pause the run until resumed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{CommandContext, CommandImplementation, CommandResult};
use crate::error::EngineResult;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitForResumeParams {
    /// Shown to the operator while paused
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaitForResumeResult {}

#[async_trait]
impl CommandImplementation for WaitForResumeParams {
    async fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<CommandResult> {
        ctx.run_control.wait_for_resume().await?;
        Ok(CommandResult::WaitForResume(WaitForResumeResult {}))
    }
}
