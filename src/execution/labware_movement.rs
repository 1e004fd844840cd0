//! Gripper-driven labware moves.
//!
//! A gripper move always travels at the homed gripper height and descends only
//! once it is aligned over its target. The jaw opens just before the final
//! descent and is left closed under a low force when the move is done.

use std::sync::Arc;

use tracing::{debug, info};

use super::module_flaggers::{raise_if_labware_in_non_open_thermocycler, raise_if_labware_latched_on_heater_shaker};
use super::ThermocyclerPlateLifter;
use crate::error::{EngineError, EngineResult};
use crate::hardware::{engine_error_from_hardware, HardwareControlApi, IDLE_STATE_GRIP_FORCE, LABWARE_GRIP_FORCE};
use crate::state::{StateStore, StateView};
use crate::types::{
    CriticalPoint, LabwareLocation, LabwareMovementOffsetData, LabwareOffsetVector, Mount, MotorAxis, Point,
};

/// Combine a labware's existing calibration with an extra gripper offset.
///
/// ```
/// use protocol_engine::execution::combine_offsets;
/// use protocol_engine::types::LabwareOffsetVector;
///
/// let current = LabwareOffsetVector::new(1.0, 2.0, 3.0);
/// let additional = LabwareOffsetVector::new(0.0, 0.0, 5.0);
/// assert_eq!(
///     combine_offsets(true, Some(current), Some(additional)),
///     LabwareOffsetVector::new(1.0, 2.0, 8.0)
/// );
/// assert_eq!(combine_offsets(false, Some(current), Some(additional)), additional);
/// ```
pub fn combine_offsets(
    use_current: bool,
    current: Option<LabwareOffsetVector>,
    additional: Option<LabwareOffsetVector>,
) -> LabwareOffsetVector {
    let additional = additional.unwrap_or_default();
    if use_current {
        current.unwrap_or_default() + additional
    } else {
        additional
    }
}

/// Check that neither end of a move is shut inside a module.
pub fn ensure_movement_not_obstructed_by_module(
    state: &StateView,
    current_location: &LabwareLocation,
    new_location: &LabwareLocation,
) -> EngineResult<()> {
    for location in [current_location, new_location] {
        raise_if_labware_in_non_open_thermocycler(state, location).map_err(|source| {
            EngineError::LabwareMovementNotAllowed {
                message: "Cannot move labware to or from a thermocycler with its lid closed.".to_string(),
                source: Box::new(source),
            }
        })?;
        raise_if_labware_latched_on_heater_shaker(state, location).map_err(|source| {
            EngineError::LabwareMovementNotAllowed {
                message: "Cannot move labware to or from a heater-shaker with its latch closed.".to_string(),
                source: Box::new(source),
            }
        })?;
    }
    Ok(())
}

/// Moves labware with the gripper.
pub struct LabwareMovementHandler {
    hardware: Arc<dyn HardwareControlApi>,
    state: Arc<StateStore>,
    plate_lifter: ThermocyclerPlateLifter,
}

impl LabwareMovementHandler {
    pub fn new(
        hardware: Arc<dyn HardwareControlApi>,
        state: Arc<StateStore>,
        plate_lifter: ThermocyclerPlateLifter,
    ) -> Self {
        Self {
            hardware,
            state,
            plate_lifter,
        }
    }

    /// Check module access for a move against current state.
    pub fn ensure_movement_not_obstructed_by_module(
        &self,
        current_location: &LabwareLocation,
        new_location: &LabwareLocation,
    ) -> EngineResult<()> {
        ensure_movement_not_obstructed_by_module(&self.state.view(), current_location, new_location)
    }

    async fn move_gripper_through(&self, waypoints: &[Point]) -> EngineResult<()> {
        for position in waypoints {
            self.hardware
                .move_to(Mount::Extension, *position, Some(CriticalPoint::GripperJawCenter), None)
                .await
                .map_err(engine_error_from_hardware)?;
        }
        Ok(())
    }

    async fn home_gripper_z(&self) -> EngineResult<Point> {
        self.hardware
            .home(Some(vec![MotorAxis::ExtensionZ]))
            .await
            .map_err(engine_error_from_hardware)?;
        self.gripper_position().await
    }

    async fn gripper_position(&self) -> EngineResult<Point> {
        self.hardware
            .gantry_position(Mount::Extension, Some(CriticalPoint::GripperJawCenter), true)
            .await
            .map_err(engine_error_from_hardware)
    }

    /// Safe-height approach over `target`, then the descent onto it.
    fn approach(from: Point, target: Point) -> [Point; 3] {
        [
            from,
            Point::new(target.x, target.y, from.z),
            target,
        ]
    }

    /// Pick up `labware_id` at `current_location` and set it down at `new_location`.
    pub async fn move_labware_with_gripper(
        &self,
        labware_id: &str,
        current_location: &LabwareLocation,
        new_location: &LabwareLocation,
        offset_data: &LabwareMovementOffsetData,
        new_offset_id: Option<&str>,
    ) -> EngineResult<()> {
        if self.state.view().config().use_virtual_gripper {
            debug!("Virtual gripper, skipping motion for labware {}", labware_id);
            return Ok(());
        }
        if !self.hardware.has_gripper() {
            return Err(EngineError::GripperNotAttached(
                "No gripper found for labware movement.".to_string(),
            ));
        }

        info!("Moving labware {} from {} to {} with gripper", labware_id, current_location, new_location);
        self.hardware
            .home(Some(vec![MotorAxis::LeftZ, MotorAxis::RightZ, MotorAxis::ExtensionZ]))
            .await
            .map_err(engine_error_from_hardware)?;
        let homed = self.gripper_position().await?;

        let lifted = self.plate_lifter.lift_plate(current_location).await?;

        let (pick_up_position, drop_position) = {
            let view = self.state.view();
            let labware = view.labware();
            let geometry = view.geometry();

            let current_offset = labware.get_labware_offset_vector(labware_id)?;
            let pick_up_offset = combine_offsets(
                offset_data.use_current_offset,
                Some(current_offset),
                offset_data.pick_up_offset,
            );
            let new_offset = new_offset_id
                .map(|id| labware.get_labware_offset(id).map(|offset| offset.vector))
                .transpose()?;
            let drop_offset = combine_offsets(offset_data.use_current_offset, new_offset, offset_data.drop_offset);

            (
                geometry.get_labware_center(labware_id, current_location)? + pick_up_offset,
                geometry.get_labware_center(labware_id, new_location)? + drop_offset,
            )
        };

        let [start, over_pick_up, pick_up] = Self::approach(homed, pick_up_position);
        debug!("Gripper pick-up at {:?}", pick_up);
        self.move_gripper_through(&[start, over_pick_up]).await?;
        self.hardware.ungrip().await.map_err(engine_error_from_hardware)?;
        self.move_gripper_through(&[pick_up]).await?;
        self.hardware
            .grip(LABWARE_GRIP_FORCE)
            .await
            .map_err(engine_error_from_hardware)?;
        if lifted {
            self.plate_lifter.return_plate(current_location).await?;
        }

        let retracted = self.home_gripper_z().await?;
        debug!("Gripper drop at {:?}", drop_position);
        self.move_gripper_through(&Self::approach(retracted, drop_position)).await?;

        self.hardware.ungrip().await.map_err(engine_error_from_hardware)?;
        self.home_gripper_z().await?;
        self.hardware
            .grip(IDLE_STATE_GRIP_FORCE)
            .await
            .map_err(engine_error_from_hardware)?;
        Ok(())
    }
}
