//! Pipette movement built on the gantry mover and motion planning.

use std::sync::Arc;

use tracing::debug;

use super::GantryMover;
use crate::error::EngineResult;
use crate::state::StateStore;
use crate::types::{MotorAxis, MovementAxis, Point, WellLocation};

/// Moves pipettes between wells and along single axes.
pub struct MovementHandler {
    state: Arc<StateStore>,
    gantry: Arc<dyn GantryMover>,
}

impl MovementHandler {
    pub fn new(state: Arc<StateStore>, gantry: Arc<dyn GantryMover>) -> Self {
        Self { state, gantry }
    }

    /// Move a pipette to a location in a well and return where it ended up.
    #[allow(clippy::too_many_arguments)]
    pub async fn move_to_well(
        &self,
        pipette_id: &str,
        labware_id: &str,
        well_name: &str,
        well_location: Option<&WellLocation>,
        force_direct: bool,
        minimum_z_height: Option<f64>,
        speed: Option<f64>,
    ) -> EngineResult<Point> {
        let view = self.state.view();
        let current_well = view.pipettes().get_current_well().cloned();
        let origin_cp = view
            .motion()
            .get_pipette_location(pipette_id, current_well.as_ref())?
            .critical_point;

        let origin = self
            .gantry
            .get_position(pipette_id, current_well.as_ref(), true)
            .await?;
        let max_travel_z = self.gantry.get_max_travel_z(pipette_id).await?;

        let waypoints = view.motion().get_movement_waypoints_to_well(
            pipette_id,
            labware_id,
            well_name,
            well_location,
            origin,
            origin_cp,
            max_travel_z,
            current_well.as_ref(),
            force_direct,
            minimum_z_height,
        )?;
        let speed = view.pipettes().get_movement_speed(pipette_id, speed);
        debug!(
            "Moving pipette {} to {} of {} through {} waypoints",
            pipette_id,
            well_name,
            labware_id,
            waypoints.len()
        );

        self.gantry.move_to(pipette_id, &waypoints, speed).await
    }

    /// Move a pipette along one axis.
    pub async fn move_relative(&self, pipette_id: &str, axis: MovementAxis, distance: f64) -> EngineResult<Point> {
        let delta = match axis {
            MovementAxis::X => Point::new(distance, 0.0, 0.0),
            MovementAxis::Y => Point::new(0.0, distance, 0.0),
            MovementAxis::Z => Point::new(0.0, 0.0, distance),
        };
        let speed = self.state.view().pipettes().get_movement_speed(pipette_id, None);
        self.gantry.move_relative(pipette_id, delta, speed).await
    }

    /// Home `axes`, or every axis.
    pub async fn home(&self, axes: Option<Vec<MotorAxis>>) -> EngineResult<()> {
        self.gantry.home(axes).await
    }
}
