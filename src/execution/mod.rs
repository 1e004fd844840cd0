//! Command execution: the handlers a running command drives.
//!
//! Handlers read state through [`crate::state::StateStore`] snapshots and only
//! ever write to it through the [`ActionDispatcher`]. Hardware is reached
//! through [`crate::hardware::HardwareControlApi`], or skipped entirely when
//! the engine is configured for virtual pipettes, gripper or modules.
//!
//! - [`QueueWorker`] pulls one command at a time and hands it to the
//!   [`CommandExecutor`].
//! - [`MovementHandler`] and [`GantryMover`] move pipettes.
//! - [`LabwareMovementHandler`] moves labware with the gripper.
//! - [`EquipmentHandler`] resolves loads and drives modules.
//! - [`HardwareStopper`] brings the robot to rest at the end of a run.

pub mod action_dispatcher;
pub mod command_executor;
pub mod equipment;
pub mod gantry_mover;
pub mod hardware_stopper;
pub mod labware_movement;
pub mod module_flaggers;
pub mod movement;
pub mod queue_worker;
pub mod run_control;
pub mod thermocycler_plate_lifter;
pub mod tip_handler;

pub use action_dispatcher::{ActionDispatcher, ActionHandler, ActionLogger};
pub use command_executor::CommandExecutor;
pub use equipment::{EquipmentHandler, LoadedLabwareData, LoadedModuleData};
pub use gantry_mover::{create_gantry_mover, GantryMover, HardwareGantryMover, VirtualGantryMover};
pub use hardware_stopper::HardwareStopper;
pub use labware_movement::{combine_offsets, ensure_movement_not_obstructed_by_module, LabwareMovementHandler};
pub use movement::MovementHandler;
pub use queue_worker::QueueWorker;
pub use run_control::RunControlHandler;
pub use thermocycler_plate_lifter::ThermocyclerPlateLifter;
pub use tip_handler::{create_tip_handler, HardwareTipHandler, TipHandler, VirtualTipHandler};
