//! Actions: the only way state changes.
//!
//! Every mutation of engine state is expressed as an [`Action`] and handed to
//! [`crate::state::StateStore::dispatch`]. Actions are plain data and carry
//! everything a reducer needs (ids, timestamps) so that reducing is a pure
//! function of (state, action).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::commands::{Command, CommandCreate};
use crate::definitions::{LabwareDefinition, ModuleDefinition};
use crate::error::ErrorOccurrence;
use crate::types::{DoorState, LabwareOffsetCreate, Liquid};

/// Who asked for a pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PauseSource {
    /// An external client
    Client,
    /// A running command, such as `waitForResume`
    Protocol,
}

/// Engine-wide events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Action {
    /// Start or resume pulling protocol commands.
    Play { requested_at: DateTime<Utc> },
    /// Stop pulling protocol commands until the next `Play`.
    Pause { source: PauseSource },
    /// Terminate the run without success.
    Stop,
    /// Terminate the run gracefully.
    Finish {
        error: Option<ErrorOccurrence>,
        set_run_status: bool,
    },
    /// Hardware recovery after `Stop`/`Finish` has completed.
    HardwareStopped { completed_at: DateTime<Utc> },
    /// The robot door opened or closed.
    DoorChange { door_state: DoorState },
    /// Add a new command to its queue.
    QueueCommand {
        command_id: String,
        created_at: DateTime<Utc>,
        request: CommandCreate,
    },
    /// Replace a command with a newer copy (Running or Succeeded).
    UpdateCommand { command: Command },
    /// Mark a command failed.
    FailCommand {
        command_id: String,
        error: ErrorOccurrence,
    },
    /// Append a calibration offset.
    AddLabwareOffset {
        labware_offset_id: String,
        created_at: DateTime<Utc>,
        request: LabwareOffsetCreate,
    },
    /// Register a labware definition.
    AddLabwareDefinition { definition: LabwareDefinition },
    /// Register a module found attached to the robot.
    AddModule {
        serial_number: String,
        definition: ModuleDefinition,
    },
    /// Declare a liquid for the run.
    AddLiquid { liquid: Liquid },
    /// Mark every tip in a tip rack clean.
    ResetTips { labware_id: String },
    /// Override (or clear) a pipette's default movement speed.
    SetPipetteMovementSpeed {
        pipette_id: String,
        speed: Option<f64>,
    },
}

impl Action {
    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Play { .. } => "play",
            Self::Pause { .. } => "pause",
            Self::Stop => "stop",
            Self::Finish { .. } => "finish",
            Self::HardwareStopped { .. } => "hardwareStopped",
            Self::DoorChange { .. } => "doorChange",
            Self::QueueCommand { .. } => "queueCommand",
            Self::UpdateCommand { .. } => "updateCommand",
            Self::FailCommand { .. } => "failCommand",
            Self::AddLabwareOffset { .. } => "addLabwareOffset",
            Self::AddLabwareDefinition { .. } => "addLabwareDefinition",
            Self::AddModule { .. } => "addModule",
            Self::AddLiquid { .. } => "addLiquid",
            Self::ResetTips { .. } => "resetTips",
            Self::SetPipetteMovementSpeed { .. } => "setPipetteMovementSpeed",
        }
    }
}
