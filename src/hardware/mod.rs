//! Hardware control boundary.
//!
//! The engine never talks to motors directly. Everything physical goes through
//! [`HardwareControlApi`], an async capability trait whose methods return
//! `anyhow::Result` so that drivers can surface their own error types. The
//! engine downcasts to [`HardwareError`] where it needs to react to a specific
//! failure (for example turning "position unknown" into a must-home error).
//!
//! [`simulator::SimulatedHardware`] implements the trait in memory.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::EngineError;
use crate::types::{CriticalPoint, Mount, MotorAxis, Point};

pub mod simulator;

pub use simulator::{HardwareCall, SimulatedHardware};

/// Force used to hold labware during a gripper move, in newtons.
pub const LABWARE_GRIP_FORCE: f64 = 15.0;

/// Force used to keep an empty gripper jaw closed, in newtons.
pub const IDLE_STATE_GRIP_FORCE: f64 = 10.0;

/// Failures a hardware driver may report.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HardwareError {
    #[error("Axes must be homed before moving: {0:?}")]
    MustHome(Vec<MotorAxis>),
    #[error("Current position of {0:?} is unknown")]
    PositionUnknown(Mount),
    #[error("No gripper is attached")]
    GripperNotAttached,
    #[error("No instrument attached to {0:?} mount")]
    InstrumentNotAttached(Mount),
    #[error("Module {0} is not connected")]
    ModuleNotConnected(String),
}

/// Module-level hardware operations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ModuleAction {
    OpenLid,
    CloseLid,
    /// Push the thermocycler plate up so the gripper can reach under it
    RaisePlate,
    ReturnFromRaisePlate,
    OpenLabwareLatch,
    CloseLabwareLatch,
    Engage { height: f64 },
    Disengage,
}

/// Physical motion controller consumed by the engine.
#[async_trait]
pub trait HardwareControlApi: Send + Sync {
    /// Move a mount's critical point to an absolute deck position.
    async fn move_to(
        &self,
        mount: Mount,
        abs_position: Point,
        critical_point: Option<CriticalPoint>,
        speed: Option<f64>,
    ) -> Result<()>;

    /// Move a mount by a relative delta.
    async fn move_rel(
        &self,
        mount: Mount,
        delta: Point,
        fail_on_not_homed: bool,
        speed: Option<f64>,
    ) -> Result<()>;

    /// Home the given axes, or every axis when `None`.
    async fn home(&self, axes: Option<Vec<MotorAxis>>) -> Result<()>;

    /// Home a pipette's plunger.
    async fn home_plunger(&self, mount: Mount) -> Result<()>;

    /// Current position of a mount's critical point.
    async fn gantry_position(
        &self,
        mount: Mount,
        critical_point: Option<CriticalPoint>,
        fail_on_not_homed: bool,
    ) -> Result<Point>;

    /// Close the gripper jaw under force control.
    async fn grip(&self, force_newtons: f64) -> Result<()>;

    /// Fully open the gripper jaw.
    async fn ungrip(&self) -> Result<()>;

    /// Whether a gripper is attached.
    fn has_gripper(&self) -> bool;

    /// Highest z the critical point of `mount` can reach.
    async fn get_instrument_max_height(
        &self,
        mount: Mount,
        critical_point: Option<CriticalPoint>,
    ) -> Result<f64>;

    /// Pick up a tip at the current position.
    async fn pick_up_tip(&self, mount: Mount, tip_length: f64) -> Result<()>;

    /// Drop the attached tip at the current position.
    async fn drop_tip(&self, mount: Mount, home_after: bool) -> Result<()>;

    /// Run a module operation on the module with this serial number.
    async fn module_action(&self, serial_number: &str, action: ModuleAction) -> Result<()>;

    /// Halt all motion immediately.
    async fn halt(&self) -> Result<()>;

    /// Halt and reset the motion controller.
    async fn stop(&self, home_after: bool) -> Result<()>;
}

/// Convert a driver failure into an engine error.
pub(crate) fn engine_error_from_hardware(err: anyhow::Error) -> EngineError {
    match err.downcast_ref::<HardwareError>() {
        Some(HardwareError::MustHome(_)) | Some(HardwareError::PositionUnknown(_)) => {
            EngineError::MustHome(err.to_string())
        }
        Some(HardwareError::GripperNotAttached) => EngineError::GripperNotAttached(err.to_string()),
        _ => EngineError::Hardware(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_must_home_maps_to_engine_error() {
        let err = anyhow::Error::new(HardwareError::MustHome(vec![MotorAxis::X]));
        assert!(matches!(engine_error_from_hardware(err), EngineError::MustHome(_)));

        let err = anyhow::Error::new(HardwareError::PositionUnknown(Mount::Left));
        assert!(matches!(engine_error_from_hardware(err), EngineError::MustHome(_)));
    }

    #[test]
    fn test_other_failures_stay_hardware_errors() {
        let err = anyhow::anyhow!("CAN bus timeout");
        assert!(matches!(engine_error_from_hardware(err), EngineError::Hardware(_)));
    }
}
