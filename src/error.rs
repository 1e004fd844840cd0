//! Error types for the protocol engine.
//!
//! `EngineError` is the single error type surfaced by state views, command
//! implementations, and the engine façade. Every variant maps to a stable
//! `error_type()` name, which is what gets recorded on a failed command as an
//! [`ErrorOccurrence`].
//!
//! ## Error Classes
//!
//! - **Referential integrity** (`LabwareNotLoaded`, `LabwareOffsetDoesNotExist`,
//!   `LabwareDefinitionDoesNotExist`, ...): a command or action referenced
//!   something the state does not contain. These are programming errors and
//!   are never retried.
//! - **Planning conflicts** (`LocationIsOccupied`, `LabwareMovementNotAllowed`):
//!   raised before any hardware motion begins.
//! - **Hardware** (`MustHome`, `GripperNotAttached`, `Hardware`): failures
//!   reported by the motion controller. Motion is never retried automatically.
//! - **Run lifecycle** (`RunStopped`, `RobotDoorOpen`, `SetupCommandNotAllowed`):
//!   the action is not allowed in the engine's current state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::commands::CommandStatus;
use crate::config::ConfigError;

/// Convenience alias for results using the engine error type.
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// Every failure the engine can report.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Hardware position is unknown, home before moving: {0}")]
    MustHome(String),

    #[error("Labware not loaded: {0}")]
    LabwareNotLoaded(String),

    #[error("No labware loaded on module: {0}")]
    LabwareNotLoadedOnModule(String),

    #[error("Labware is not on the deck: {0}")]
    LabwareNotOnDeck(String),

    #[error("Labware offset does not exist: {0}")]
    LabwareOffsetDoesNotExist(String),

    #[error("Labware offset already exists: {0}")]
    LabwareOffsetAlreadyExists(String),

    #[error("Labware definition does not exist: {0}")]
    LabwareDefinitionDoesNotExist(String),

    #[error("Labware is not a tip rack: {0}")]
    LabwareIsNotTipRack(String),

    #[error("Location is occupied: {0}")]
    LocationIsOccupied(String),

    #[error("Gripper not attached: {0}")]
    GripperNotAttached(String),

    #[error("{message}")]
    LabwareMovementNotAllowed {
        message: String,
        #[source]
        source: Box<EngineError>,
    },

    #[error("Thermocycler lid is not open: {0}")]
    ThermocyclerNotOpen(String),

    #[error("Heater-Shaker labware latch is not open: {0}")]
    HeaterShakerLabwareLatchNotOpen(String),

    #[error("Module not loaded: {0}")]
    ModuleNotLoaded(String),

    #[error("Module not attached: {0}")]
    ModuleNotAttached(String),

    #[error("Wrong module type: {0}")]
    WrongModuleType(String),

    #[error("No magnet engage height: {0}")]
    NoMagnetEngageHeight(String),

    #[error("Pipette not loaded: {0}")]
    PipetteNotLoaded(String),

    #[error("Tip not attached: {0}")]
    TipNotAttached(String),

    #[error("Well does not exist: {0}")]
    WellDoesNotExist(String),

    #[error("Deck slot does not exist: {0}")]
    SlotDoesNotExist(String),

    #[error("Command does not exist: {0}")]
    CommandDoesNotExist(String),

    #[error("Command already exists: {0}")]
    CommandAlreadyExists(String),

    #[error("Command {command_id} cannot move from {from:?} to {to:?}")]
    InvalidCommandTransition {
        command_id: String,
        from: CommandStatus,
        to: CommandStatus,
    },

    #[error("Run has been stopped: {0}")]
    RunStopped(String),

    #[error("Robot door is open: {0}")]
    RobotDoorOpen(String),

    #[error("Setup command not allowed: {0}")]
    SetupCommandNotAllowed(String),

    #[error("Protocol command failed: {0}")]
    ProtocolCommandFailed(String),

    #[error("Not supported on this robot type: {0}")]
    NotSupportedOnRobotType(String),

    #[error("Motion planning failed: {0}")]
    MotionPlanningFailed(String),

    #[error("Hardware error: {0}")]
    Hardware(#[from] anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl EngineError {
    /// Stable name of the error class, recorded on failed commands.
    pub fn error_type(&self) -> &'static str {
        match self {
            Self::MustHome(_) => "MustHomeError",
            Self::LabwareNotLoaded(_) => "LabwareNotLoadedError",
            Self::LabwareNotLoadedOnModule(_) => "LabwareNotLoadedOnModuleError",
            Self::LabwareNotOnDeck(_) => "LabwareNotOnDeckError",
            Self::LabwareOffsetDoesNotExist(_) => "LabwareOffsetDoesNotExistError",
            Self::LabwareOffsetAlreadyExists(_) => "LabwareOffsetAlreadyExistsError",
            Self::LabwareDefinitionDoesNotExist(_) => "LabwareDefinitionDoesNotExistError",
            Self::LabwareIsNotTipRack(_) => "LabwareIsNotTipRackError",
            Self::LocationIsOccupied(_) => "LocationIsOccupiedError",
            Self::GripperNotAttached(_) => "GripperNotAttachedError",
            Self::LabwareMovementNotAllowed { .. } => "LabwareMovementNotAllowedError",
            Self::ThermocyclerNotOpen(_) => "ThermocyclerNotOpenError",
            Self::HeaterShakerLabwareLatchNotOpen(_) => "HeaterShakerLabwareLatchNotOpenError",
            Self::ModuleNotLoaded(_) => "ModuleNotLoadedError",
            Self::ModuleNotAttached(_) => "ModuleNotAttachedError",
            Self::WrongModuleType(_) => "WrongModuleTypeError",
            Self::NoMagnetEngageHeight(_) => "NoMagnetEngageHeightError",
            Self::PipetteNotLoaded(_) => "PipetteNotLoadedError",
            Self::TipNotAttached(_) => "TipNotAttachedError",
            Self::WellDoesNotExist(_) => "WellDoesNotExistError",
            Self::SlotDoesNotExist(_) => "SlotDoesNotExistError",
            Self::CommandDoesNotExist(_) => "CommandDoesNotExistError",
            Self::CommandAlreadyExists(_) => "CommandAlreadyExistsError",
            Self::InvalidCommandTransition { .. } => "InvalidCommandTransitionError",
            Self::RunStopped(_) => "RunStoppedError",
            Self::RobotDoorOpen(_) => "RobotDoorOpenError",
            Self::SetupCommandNotAllowed(_) => "SetupCommandNotAllowedError",
            Self::ProtocolCommandFailed(_) => "ProtocolCommandFailedError",
            Self::NotSupportedOnRobotType(_) => "NotSupportedOnRobotTypeError",
            Self::MotionPlanningFailed(_) => "MotionPlanningFailedError",
            Self::Hardware(_) => "HardwareError",
            Self::Config(_) => "ConfigurationError",
        }
    }

}

/// Structured record of an error, stored on failed commands and runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorOccurrence {
    /// Unique id of this occurrence
    pub id: String,
    /// When the error was recorded
    pub created_at: DateTime<Utc>,
    /// Stable error class name, see [`EngineError::error_type`]
    pub error_type: String,
    /// Human-readable description
    pub detail: String,
}

impl ErrorOccurrence {
    /// Record `error` under the given id and timestamp.
    pub fn from_error(id: impl Into<String>, created_at: DateTime<Utc>, error: &EngineError) -> Self {
        Self {
            id: id.into(),
            created_at,
            error_type: error.error_type().to_string(),
            detail: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = EngineError::LabwareNotLoaded("labware-1".to_string());
        assert_eq!(err.to_string(), "Labware not loaded: labware-1");
        assert_eq!(err.error_type(), "LabwareNotLoadedError");
    }

    #[test]
    fn test_movement_not_allowed_keeps_source() {
        use std::error::Error;

        let err = EngineError::LabwareMovementNotAllowed {
            message: "Cannot move labware from closed thermocycler".into(),
            source: Box::new(EngineError::ThermocyclerNotOpen("module-1".into())),
        };
        assert_eq!(err.to_string(), "Cannot move labware from closed thermocycler");
        let source = err.source().map(ToString::to_string);
        assert_eq!(
            source.as_deref(),
            Some("Thermocycler lid is not open: module-1")
        );
    }

    #[test]
    fn test_hardware_error_from_anyhow() {
        let err: EngineError = anyhow::anyhow!("motor stalled").into();
        assert_eq!(err.error_type(), "HardwareError");
    }

    #[test]
    fn test_error_occurrence_records_type_and_detail() {
        let now = Utc::now();
        let occurrence = ErrorOccurrence::from_error(
            "error-1",
            now,
            &EngineError::GripperNotAttached("No gripper found".into()),
        );
        assert_eq!(occurrence.error_type, "GripperNotAttachedError");
        assert_eq!(occurrence.detail, "Gripper not attached: No gripper found");
        assert_eq!(occurrence.created_at, now);
    }
}
