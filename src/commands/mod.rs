//! Command models and implementations.
//!
//! A [`Command`] is a queued unit of protocol work. Its parameters and result
//! are closed sum types ([`CommandParams`], [`CommandResult`]) tagged with the
//! command type, so every reducer can match exhaustively on what a command
//! did. Each parameter struct implements [`CommandImplementation`], which runs
//! the command against a [`CommandContext`] bundle of execution handlers.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{EngineResult, ErrorOccurrence};
use crate::execution::{
    EquipmentHandler, LabwareMovementHandler, MovementHandler, RunControlHandler, TipHandler,
};
use crate::state::StateView;

pub mod home;
pub mod load_labware;
pub mod load_module;
pub mod load_pipette;
pub mod module_commands;
pub mod move_labware;
pub mod move_relative;
pub mod move_to_well;
pub mod tip_commands;
pub mod wait_for_resume;

pub use home::{HomeParams, HomeResult};
pub use load_labware::{LoadLabwareParams, LoadLabwareResult};
pub use load_module::{LoadModuleParams, LoadModuleResult};
pub use load_pipette::{LoadPipetteParams, LoadPipetteResult};
pub use module_commands::{MagneticEngageParams, ModuleCommandResult, ModuleIdParams};
pub use move_labware::{MoveLabwareParams, MoveLabwareResult};
pub use move_relative::{MoveRelativeParams, MoveRelativeResult};
pub use move_to_well::{MoveToWellParams, MoveToWellResult};
pub use tip_commands::{DropTipParams, DropTipResult, PickUpTipParams, PickUpTipResult};
pub use wait_for_resume::{WaitForResumeParams, WaitForResumeResult};

/// Lifecycle of a command. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl CommandStatus {
    /// Whether the command has finished, successfully or not.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    /// Whether an update may move a command from this status to `next`.
    ///
    /// Failures go through `FailCommand`, so updates only ever start or
    /// complete a command.
    pub fn can_update_to(&self, next: CommandStatus) -> bool {
        matches!(
            (self, next),
            (Self::Queued, Self::Running) | (Self::Running, Self::Succeeded)
        )
    }
}

/// Whether a command belongs to the protocol or to run setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandIntent {
    #[default]
    Protocol,
    Setup,
}

/// Typed parameters of every supported command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "commandType", content = "params", rename_all = "camelCase")]
pub enum CommandParams {
    LoadLabware(LoadLabwareParams),
    LoadModule(LoadModuleParams),
    LoadPipette(LoadPipetteParams),
    MoveLabware(MoveLabwareParams),
    MoveToWell(MoveToWellParams),
    MoveRelative(MoveRelativeParams),
    Home(HomeParams),
    PickUpTip(PickUpTipParams),
    DropTip(DropTipParams),
    WaitForResume(WaitForResumeParams),
    #[serde(rename = "thermocycler/openLid")]
    ThermocyclerOpenLid(ModuleIdParams),
    #[serde(rename = "thermocycler/closeLid")]
    ThermocyclerCloseLid(ModuleIdParams),
    #[serde(rename = "heaterShaker/openLabwareLatch")]
    HeaterShakerOpenLabwareLatch(ModuleIdParams),
    #[serde(rename = "heaterShaker/closeLabwareLatch")]
    HeaterShakerCloseLabwareLatch(ModuleIdParams),
    #[serde(rename = "magneticModule/engage")]
    MagneticModuleEngage(MagneticEngageParams),
    #[serde(rename = "magneticModule/disengage")]
    MagneticModuleDisengage(ModuleIdParams),
}

/// Typed results, one variant per command type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "commandType", content = "result", rename_all = "camelCase")]
pub enum CommandResult {
    LoadLabware(LoadLabwareResult),
    LoadModule(LoadModuleResult),
    LoadPipette(LoadPipetteResult),
    MoveLabware(MoveLabwareResult),
    MoveToWell(MoveToWellResult),
    MoveRelative(MoveRelativeResult),
    Home(HomeResult),
    PickUpTip(PickUpTipResult),
    DropTip(DropTipResult),
    WaitForResume(WaitForResumeResult),
    #[serde(rename = "thermocycler/openLid")]
    ThermocyclerOpenLid(ModuleCommandResult),
    #[serde(rename = "thermocycler/closeLid")]
    ThermocyclerCloseLid(ModuleCommandResult),
    #[serde(rename = "heaterShaker/openLabwareLatch")]
    HeaterShakerOpenLabwareLatch(ModuleCommandResult),
    #[serde(rename = "heaterShaker/closeLabwareLatch")]
    HeaterShakerCloseLabwareLatch(ModuleCommandResult),
    #[serde(rename = "magneticModule/engage")]
    MagneticModuleEngage(ModuleCommandResult),
    #[serde(rename = "magneticModule/disengage")]
    MagneticModuleDisengage(ModuleCommandResult),
}

impl CommandParams {
    /// Command type tag.
    pub fn command_type(&self) -> &'static str {
        match self {
            Self::LoadLabware(_) => "loadLabware",
            Self::LoadModule(_) => "loadModule",
            Self::LoadPipette(_) => "loadPipette",
            Self::MoveLabware(_) => "moveLabware",
            Self::MoveToWell(_) => "moveToWell",
            Self::MoveRelative(_) => "moveRelative",
            Self::Home(_) => "home",
            Self::PickUpTip(_) => "pickUpTip",
            Self::DropTip(_) => "dropTip",
            Self::WaitForResume(_) => "waitForResume",
            Self::ThermocyclerOpenLid(_) => "thermocycler/openLid",
            Self::ThermocyclerCloseLid(_) => "thermocycler/closeLid",
            Self::HeaterShakerOpenLabwareLatch(_) => "heaterShaker/openLabwareLatch",
            Self::HeaterShakerCloseLabwareLatch(_) => "heaterShaker/closeLabwareLatch",
            Self::MagneticModuleEngage(_) => "magneticModule/engage",
            Self::MagneticModuleDisengage(_) => "magneticModule/disengage",
        }
    }

    /// Run the command implementation for these parameters.
    pub async fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<CommandResult> {
        match self {
            Self::LoadLabware(p) => p.execute(ctx).await,
            Self::LoadModule(p) => p.execute(ctx).await,
            Self::LoadPipette(p) => p.execute(ctx).await,
            Self::MoveLabware(p) => p.execute(ctx).await,
            Self::MoveToWell(p) => p.execute(ctx).await,
            Self::MoveRelative(p) => p.execute(ctx).await,
            Self::Home(p) => p.execute(ctx).await,
            Self::PickUpTip(p) => p.execute(ctx).await,
            Self::DropTip(p) => p.execute(ctx).await,
            Self::WaitForResume(p) => p.execute(ctx).await,
            Self::ThermocyclerOpenLid(p) => module_commands::open_lid(p, ctx).await,
            Self::ThermocyclerCloseLid(p) => module_commands::close_lid(p, ctx).await,
            Self::HeaterShakerOpenLabwareLatch(p) => module_commands::open_latch(p, ctx).await,
            Self::HeaterShakerCloseLabwareLatch(p) => module_commands::close_latch(p, ctx).await,
            Self::MagneticModuleEngage(p) => p.execute(ctx).await,
            Self::MagneticModuleDisengage(p) => module_commands::disengage(p, ctx).await,
        }
    }
}

/// Request to enqueue a command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandCreate {
    #[serde(flatten)]
    pub params: CommandParams,
    #[serde(default)]
    pub intent: CommandIntent,
    #[serde(default)]
    pub key: Option<String>,
}

impl CommandCreate {
    /// Protocol-intent request.
    pub fn protocol(params: CommandParams) -> Self {
        Self {
            params,
            intent: CommandIntent::Protocol,
            key: None,
        }
    }

    /// Setup-intent request.
    pub fn setup(params: CommandParams) -> Self {
        Self {
            params,
            intent: CommandIntent::Setup,
            key: None,
        }
    }
}

/// A queued, running or completed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub id: String,
    pub key: String,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: CommandStatus,
    pub intent: CommandIntent,
    #[serde(flatten)]
    pub params: CommandParams,
    pub result: Option<CommandResult>,
    pub error: Option<ErrorOccurrence>,
}

impl Command {
    /// Command type tag.
    pub fn command_type(&self) -> &'static str {
        self.params.command_type()
    }

    /// Copy of this command marked running.
    pub fn to_running(&self, started_at: DateTime<Utc>) -> Self {
        Self {
            status: CommandStatus::Running,
            started_at: Some(started_at),
            ..self.clone()
        }
    }

    /// Copy of this command marked succeeded with its result.
    pub fn to_succeeded(&self, result: CommandResult, completed_at: DateTime<Utc>) -> Self {
        Self {
            status: CommandStatus::Succeeded,
            result: Some(result),
            completed_at: Some(completed_at),
            ..self.clone()
        }
    }

    /// Copy of this command marked failed.
    pub fn to_failed(&self, error: ErrorOccurrence) -> Self {
        Self {
            status: CommandStatus::Failed,
            completed_at: Some(error.created_at),
            error: Some(error),
            ..self.clone()
        }
    }
}

/// Handlers and state available to a running command.
pub struct CommandContext<'a> {
    /// Snapshot taken when the command started
    pub state: StateView,
    pub equipment: &'a EquipmentHandler,
    pub movement: &'a MovementHandler,
    pub labware_movement: &'a LabwareMovementHandler,
    pub tip_handler: &'a dyn TipHandler,
    pub run_control: &'a RunControlHandler,
}

/// Execution logic of one command type.
#[async_trait]
pub trait CommandImplementation: Send + Sync {
    /// Run the command to completion.
    async fn execute(&self, ctx: &CommandContext<'_>) -> EngineResult<CommandResult>;
}
