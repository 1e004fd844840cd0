//! Simulated Hardware
//!
//! In-memory [`HardwareControlApi`] used for tests and dry runs.
//!
//! # Behavior
//!
//! - Axes start unhomed. Moving a mount whose X, Y or Z axis is unhomed fails
//!   with [`HardwareError::MustHome`].
//! - Homing an axis parks it at the home position: X/Y for every mount, Z for
//!   its own mount.
//! - Every call is appended to a log so tests can assert on ordering.
//!
//! # Example
//!
//! ```rust,ignore
//! let hardware = SimulatedHardware::new().with_gripper();
//! hardware.home(None).await?;
//! hardware.move_to(Mount::Extension, Point::new(10.0, 20.0, 30.0), None, None).await?;
//! assert_eq!(hardware.calls().len(), 2);
//! ```

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use super::{HardwareControlApi, HardwareError, ModuleAction};
use crate::types::{CriticalPoint, Mount, MotorAxis, Point};

/// Position every axis parks at when homed.
pub const HOME_POSITION: Point = Point::new(418.0, 353.0, 218.0);

/// Gripper jaw state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GripperJawState {
    Unhomed,
    Open,
    Gripping(f64),
}

/// One recorded hardware call.
#[derive(Debug, Clone, PartialEq)]
pub enum HardwareCall {
    MoveTo {
        mount: Mount,
        position: Point,
        critical_point: Option<CriticalPoint>,
    },
    MoveRel {
        mount: Mount,
        delta: Point,
    },
    Home(Option<Vec<MotorAxis>>),
    HomePlunger(Mount),
    Grip(f64),
    Ungrip,
    PickUpTip {
        mount: Mount,
        tip_length: f64,
    },
    DropTip(Mount),
    Module {
        serial_number: String,
        action: ModuleAction,
    },
    Halt,
    Stop,
}

#[derive(Debug)]
struct SimulatorState {
    homed: HashSet<MotorAxis>,
    positions: HashMap<Mount, Point>,
    tip_lengths: HashMap<Mount, f64>,
    jaw: GripperJawState,
    calls: Vec<HardwareCall>,
    fail_homing: bool,
}

/// In-memory motion controller.
#[derive(Clone)]
pub struct SimulatedHardware {
    state: Arc<Mutex<SimulatorState>>,
    gripper_attached: bool,
}

impl SimulatedHardware {
    /// Simulator with both pipette mounts and no gripper.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SimulatorState {
                homed: HashSet::new(),
                positions: HashMap::new(),
                tip_lengths: HashMap::new(),
                jaw: GripperJawState::Unhomed,
                calls: Vec::new(),
                fail_homing: false,
            })),
            gripper_attached: false,
        }
    }

    /// Attach a gripper to the extension mount.
    pub fn with_gripper(mut self) -> Self {
        self.gripper_attached = true;
        self
    }


    /// Make every subsequent `home` call fail.
    pub fn fail_homing(&self, fail: bool) {
        self.state.lock().fail_homing = fail;
    }

    /// Snapshot of the call log.
    pub fn calls(&self) -> Vec<HardwareCall> {
        self.state.lock().calls.clone()
    }

    /// Clear the call log.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    /// Current gripper jaw state.
    pub fn jaw_state(&self) -> GripperJawState {
        self.state.lock().jaw
    }

    /// Length of the tip attached to `mount`, if any.
    pub fn attached_tip(&self, mount: Mount) -> Option<f64> {
        self.state.lock().tip_lengths.get(&mount).copied()
    }

    fn record(&self, call: HardwareCall) {
        self.state.lock().calls.push(call);
    }

    fn require_homed(state: &SimulatorState, mount: Mount) -> Result<()> {
        let missing: Vec<MotorAxis> = [MotorAxis::X, MotorAxis::Y, MotorAxis::z_for_mount(mount)]
            .into_iter()
            .filter(|axis| !state.homed.contains(axis))
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(HardwareError::MustHome(missing).into())
        }
    }
}

impl Default for SimulatedHardware {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HardwareControlApi for SimulatedHardware {
    async fn move_to(
        &self,
        mount: Mount,
        abs_position: Point,
        critical_point: Option<CriticalPoint>,
        _speed: Option<f64>,
    ) -> Result<()> {
        if mount == Mount::Extension && !self.gripper_attached {
            return Err(HardwareError::GripperNotAttached.into());
        }
        {
            let mut state = self.state.lock();
            Self::require_homed(&state, mount)?;
            state.positions.insert(mount, abs_position);
            state.calls.push(HardwareCall::MoveTo {
                mount,
                position: abs_position,
                critical_point,
            });
        }
        Ok(())
    }

    async fn move_rel(
        &self,
        mount: Mount,
        delta: Point,
        fail_on_not_homed: bool,
        _speed: Option<f64>,
    ) -> Result<()> {
        {
            let mut state = self.state.lock();
            let current = match state.positions.get(&mount) {
                Some(position) => *position,
                None if fail_on_not_homed => {
                    return Err(HardwareError::PositionUnknown(mount).into())
                }
                None => HOME_POSITION,
            };
            if fail_on_not_homed {
                Self::require_homed(&state, mount)?;
            }
            state.positions.insert(mount, current + delta);
            state.calls.push(HardwareCall::MoveRel { mount, delta });
        }
        Ok(())
    }

    async fn home(&self, axes: Option<Vec<MotorAxis>>) -> Result<()> {
        let mut state = self.state.lock();
        state.calls.push(HardwareCall::Home(axes.clone()));
        if state.fail_homing {
            return Err(anyhow!("Simulated homing failure"));
        }

        let axes = axes.unwrap_or_else(|| MotorAxis::ALL.to_vec());
        for axis in axes {
            state.homed.insert(axis);
            let mounts: &[Mount] = match axis {
                MotorAxis::X | MotorAxis::Y => &[Mount::Left, Mount::Right, Mount::Extension],
                MotorAxis::LeftZ => &[Mount::Left],
                MotorAxis::RightZ => &[Mount::Right],
                MotorAxis::ExtensionZ => &[Mount::Extension],
                MotorAxis::ExtensionJaw => {
                    state.jaw = GripperJawState::Open;
                    &[]
                }
                MotorAxis::LeftPlunger | MotorAxis::RightPlunger => &[],
            };
            for mount in mounts {
                let current = state.positions.get(mount).copied().unwrap_or(HOME_POSITION);
                let parked = match axis {
                    MotorAxis::X => Point { x: HOME_POSITION.x, ..current },
                    MotorAxis::Y => Point { y: HOME_POSITION.y, ..current },
                    _ => current.with_z(HOME_POSITION.z),
                };
                state.positions.insert(*mount, parked);
            }
        }
        Ok(())
    }

    async fn home_plunger(&self, mount: Mount) -> Result<()> {
        self.record(HardwareCall::HomePlunger(mount));
        Ok(())
    }

    async fn gantry_position(
        &self,
        mount: Mount,
        _critical_point: Option<CriticalPoint>,
        fail_on_not_homed: bool,
    ) -> Result<Point> {
        let state = self.state.lock();
        if fail_on_not_homed {
            Self::require_homed(&state, mount)?;
        }
        Ok(state.positions.get(&mount).copied().unwrap_or(HOME_POSITION))
    }

    async fn grip(&self, force_newtons: f64) -> Result<()> {
        if !self.gripper_attached {
            return Err(HardwareError::GripperNotAttached.into());
        }
        let mut state = self.state.lock();
        state.jaw = GripperJawState::Gripping(force_newtons);
        state.calls.push(HardwareCall::Grip(force_newtons));
        Ok(())
    }

    async fn ungrip(&self) -> Result<()> {
        if !self.gripper_attached {
            return Err(HardwareError::GripperNotAttached.into());
        }
        let mut state = self.state.lock();
        state.jaw = GripperJawState::Open;
        state.calls.push(HardwareCall::Ungrip);
        Ok(())
    }

    fn has_gripper(&self) -> bool {
        self.gripper_attached
    }

    async fn get_instrument_max_height(
        &self,
        mount: Mount,
        critical_point: Option<CriticalPoint>,
    ) -> Result<f64> {
        let state = self.state.lock();
        let tip_length = match critical_point {
            Some(CriticalPoint::Nozzle) => 0.0,
            _ => state.tip_lengths.get(&mount).copied().unwrap_or(0.0),
        };
        Ok(HOME_POSITION.z - tip_length)
    }

    async fn pick_up_tip(&self, mount: Mount, tip_length: f64) -> Result<()> {
        {
            let mut state = self.state.lock();
            Self::require_homed(&state, mount)?;
            state.tip_lengths.insert(mount, tip_length);
            state.calls.push(HardwareCall::PickUpTip { mount, tip_length });
        }
        Ok(())
    }

    async fn drop_tip(&self, mount: Mount, home_after: bool) -> Result<()> {
        let mut state = self.state.lock();
        if state.tip_lengths.remove(&mount).is_none() {
            return Err(anyhow!("No tip attached to {mount:?} mount"));
        }
        state.calls.push(HardwareCall::DropTip(mount));
        if home_after {
            state.calls.push(HardwareCall::HomePlunger(mount));
        }
        Ok(())
    }

    async fn module_action(&self, serial_number: &str, action: ModuleAction) -> Result<()> {
        self.record(HardwareCall::Module {
            serial_number: serial_number.to_string(),
            action,
        });
        Ok(())
    }

    async fn halt(&self) -> Result<()> {
        self.record(HardwareCall::Halt);
        Ok(())
    }

    async fn stop(&self, home_after: bool) -> Result<()> {
        self.record(HardwareCall::Stop);
        if home_after {
            self.home(None).await?;
        }
        Ok(())
    }
}
