//! Pipette gantry motion, against hardware or purely from state.
//!
//! Both movers share one contract so that everything above them behaves the
//! same whether or not motors are attached. The choice is made once, when the
//! engine is built, by [`create_gantry_mover`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{EngineError, EngineResult};
use crate::hardware::{engine_error_from_hardware, HardwareControlApi};
use crate::state::StateStore;
use crate::types::{CurrentWell, MotorAxis, Mount, Point, Waypoint};

/// Gantry motion used by pipette movement.
#[async_trait]
pub trait GantryMover: Send + Sync {
    /// Current position of the pipette's critical point.
    async fn get_position(
        &self,
        pipette_id: &str,
        current_well: Option<&CurrentWell>,
        fail_on_not_homed: bool,
    ) -> EngineResult<Point>;

    /// Highest z the pipette can travel at.
    async fn get_max_travel_z(&self, pipette_id: &str) -> EngineResult<f64>;

    /// Visit `waypoints` in order and return the final position.
    async fn move_to(&self, pipette_id: &str, waypoints: &[Waypoint], speed: Option<f64>) -> EngineResult<Point>;

    /// Move by `delta` and return the new position.
    async fn move_relative(&self, pipette_id: &str, delta: Point, speed: Option<f64>) -> EngineResult<Point>;

    /// Home `axes`, or everything when `None`.
    async fn home(&self, axes: Option<Vec<MotorAxis>>) -> EngineResult<()>;
}

fn final_position(waypoints: &[Waypoint]) -> EngineResult<Point> {
    waypoints
        .last()
        .map(|waypoint| waypoint.position)
        .ok_or_else(|| EngineError::MotionPlanningFailed("No waypoints to move through".to_string()))
}

/// Drives the real gantry.
pub struct HardwareGantryMover {
    hardware: Arc<dyn HardwareControlApi>,
    state: Arc<StateStore>,
}

impl HardwareGantryMover {
    pub fn new(hardware: Arc<dyn HardwareControlApi>, state: Arc<StateStore>) -> Self {
        Self { hardware, state }
    }
}

#[async_trait]
impl GantryMover for HardwareGantryMover {
    async fn get_position(
        &self,
        pipette_id: &str,
        current_well: Option<&CurrentWell>,
        fail_on_not_homed: bool,
    ) -> EngineResult<Point> {
        let (mount, critical_point): (Mount, _) = {
            let view = self.state.view();
            let location = view.motion().get_pipette_location(pipette_id, current_well)?;
            (location.mount.into(), location.critical_point)
        };
        self.hardware
            .gantry_position(mount, critical_point, fail_on_not_homed)
            .await
            .map_err(engine_error_from_hardware)
    }

    async fn get_max_travel_z(&self, pipette_id: &str) -> EngineResult<f64> {
        let mount = self.state.view().pipettes().get_hardware_mount(pipette_id)?;
        self.hardware
            .get_instrument_max_height(mount, None)
            .await
            .map_err(engine_error_from_hardware)
    }

    async fn move_to(&self, pipette_id: &str, waypoints: &[Waypoint], speed: Option<f64>) -> EngineResult<Point> {
        let mount = self.state.view().pipettes().get_hardware_mount(pipette_id)?;
        for waypoint in waypoints {
            self.hardware
                .move_to(mount, waypoint.position, waypoint.critical_point, speed)
                .await
                .map_err(engine_error_from_hardware)?;
        }
        final_position(waypoints)
    }

    async fn move_relative(&self, pipette_id: &str, delta: Point, speed: Option<f64>) -> EngineResult<Point> {
        let mount = self.state.view().pipettes().get_hardware_mount(pipette_id)?;
        self.hardware
            .move_rel(mount, delta, true, speed)
            .await
            .map_err(engine_error_from_hardware)?;
        self.get_position(pipette_id, None, true).await
    }

    async fn home(&self, axes: Option<Vec<MotorAxis>>) -> EngineResult<()> {
        self.hardware.home(axes).await.map_err(engine_error_from_hardware)
    }
}

/// Computes positions from state without moving anything.
pub struct VirtualGantryMover {
    state: Arc<StateStore>,
}

impl VirtualGantryMover {
    pub fn new(state: Arc<StateStore>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl GantryMover for VirtualGantryMover {
    async fn get_position(
        &self,
        pipette_id: &str,
        _current_well: Option<&CurrentWell>,
        _fail_on_not_homed: bool,
    ) -> EngineResult<Point> {
        let view = self.state.view();
        view.pipettes().get(pipette_id)?;
        Ok(view.pipettes().get_deck_point(pipette_id).unwrap_or_default())
    }

    async fn get_max_travel_z(&self, pipette_id: &str) -> EngineResult<f64> {
        let view = self.state.view();
        let pipettes = view.pipettes();
        let home_position = pipettes.get_config(pipette_id)?.home_position;
        let tip_length = pipettes.get_attached_tip(pipette_id).map_or(0.0, |tip| tip.length);
        Ok(home_position - tip_length)
    }

    async fn move_to(&self, pipette_id: &str, waypoints: &[Waypoint], _speed: Option<f64>) -> EngineResult<Point> {
        self.state.view().pipettes().get(pipette_id)?;
        final_position(waypoints)
    }

    async fn move_relative(&self, pipette_id: &str, delta: Point, _speed: Option<f64>) -> EngineResult<Point> {
        let origin = self.get_position(pipette_id, None, true).await?;
        Ok(origin + delta)
    }

    async fn home(&self, _axes: Option<Vec<MotorAxis>>) -> EngineResult<()> {
        Ok(())
    }
}

/// Pick the mover for this engine.
pub fn create_gantry_mover(
    hardware: Arc<dyn HardwareControlApi>,
    state: Arc<StateStore>,
    use_virtual_pipettes: bool,
) -> Arc<dyn GantryMover> {
    if use_virtual_pipettes {
        Arc::new(VirtualGantryMover::new(state))
    } else {
        Arc::new(HardwareGantryMover::new(hardware, state))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Action;
    use crate::commands::{
        CommandCreate, CommandParams, CommandResult, LoadPipetteParams, LoadPipetteResult, MoveRelativeParams,
        MoveRelativeResult,
    };
    use crate::config::{DeckType, EngineConfig};
    use crate::definitions::DeckDefinition;
    use crate::hardware::SimulatedHardware;
    use crate::state::State;
    use crate::types::{MountType, MovementAxis};
    use chrono::Utc;

    const PIPETTE: &str = "pipette-1";

    /// Run a command through queued, running and succeeded in the store.
    fn complete(store: &StateStore, id: &str, params: CommandParams, result: CommandResult) {
        store
            .dispatch(&Action::QueueCommand {
                command_id: id.into(),
                created_at: Utc::now(),
                request: CommandCreate::setup(params),
            })
            .unwrap();
        let running = store.view().commands().get(id).unwrap().to_running(Utc::now());
        store
            .dispatch(&Action::UpdateCommand {
                command: running.clone(),
            })
            .unwrap();
        store
            .dispatch(&Action::UpdateCommand {
                command: running.to_succeeded(result, Utc::now()),
            })
            .unwrap();
    }

    /// Store with a loaded pipette whose last deck point is (1, 2, 3).
    fn store_with_pipette() -> Arc<StateStore> {
        let store = StateStore::new(State::new(
            EngineConfig::default(),
            DeckDefinition::standard(DeckType::Ot2Standard),
            vec![],
        ));
        complete(
            &store,
            "load",
            CommandParams::LoadPipette(LoadPipetteParams {
                pipette_name: "p300_single_gen2".into(),
                mount: MountType::Left,
                pipette_id: Some(PIPETTE.into()),
            }),
            CommandResult::LoadPipette(LoadPipetteResult {
                pipette_id: PIPETTE.into(),
            }),
        );
        complete(
            &store,
            "nudge",
            CommandParams::MoveRelative(MoveRelativeParams {
                pipette_id: PIPETTE.into(),
                axis: MovementAxis::Z,
                distance: 3.0,
            }),
            CommandResult::MoveRelative(MoveRelativeResult {
                position: Point::new(1.0, 2.0, 3.0),
            }),
        );
        Arc::new(store)
    }

    #[tokio::test]
    async fn test_virtual_move_to_returns_last_waypoint() {
        let store = store_with_pipette();
        let mover = VirtualGantryMover::new(Arc::clone(&store));
        let waypoints = [
            Waypoint::new(Point::new(1.0, 2.0, 100.0)),
            Waypoint::new(Point::new(50.0, 60.0, 100.0)),
            Waypoint::new(Point::new(50.0, 60.0, 10.0)),
        ];

        let position = mover.move_to(PIPETTE, &waypoints, Some(10.0)).await.unwrap();
        assert_eq!(position, Point::new(50.0, 60.0, 10.0));
        assert_eq!(
            store.view().pipettes().get_deck_point(PIPETTE),
            Some(Point::new(1.0, 2.0, 3.0))
        );
    }

    #[tokio::test]
    async fn test_virtual_move_relative_offsets_deck_point() {
        let store = store_with_pipette();
        let mover = VirtualGantryMover::new(Arc::clone(&store));

        let position = mover
            .move_relative(PIPETTE, Point::new(0.0, 0.0, 5.0), None)
            .await
            .unwrap();
        assert_eq!(position, Point::new(1.0, 2.0, 8.0));
        assert_eq!(
            store.view().pipettes().get_deck_point(PIPETTE),
            Some(Point::new(1.0, 2.0, 3.0))
        );
    }

    #[tokio::test]
    async fn test_empty_waypoints_fail_planning() {
        let store = store_with_pipette();
        let hardware = SimulatedHardware::new();
        hardware.home(None).await.unwrap();

        let movers: [Arc<dyn GantryMover>; 2] = [
            Arc::new(VirtualGantryMover::new(Arc::clone(&store))),
            Arc::new(HardwareGantryMover::new(Arc::new(hardware.clone()), Arc::clone(&store))),
        ];
        for mover in movers {
            let err = mover.move_to(PIPETTE, &[], None).await.unwrap_err();
            assert!(matches!(err, EngineError::MotionPlanningFailed(_)));
        }
        assert!(hardware
            .calls()
            .iter()
            .all(|call| !matches!(call, crate::hardware::HardwareCall::MoveTo { .. })));
    }

    #[tokio::test]
    async fn test_hardware_move_requires_homing() {
        let store = store_with_pipette();
        let hardware = SimulatedHardware::new();
        let mover = HardwareGantryMover::new(Arc::new(hardware.clone()), store);

        let err = mover
            .move_to(PIPETTE, &[Waypoint::new(Point::new(10.0, 10.0, 10.0))], None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::MustHome(_)));
        assert!(hardware.calls().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_pipette_is_rejected() {
        let store = store_with_pipette();
        let mover = VirtualGantryMover::new(store);

        let err = mover
            .move_to("missing", &[Waypoint::new(Point::default())], None)
            .await
            .unwrap_err();
        assert!(matches!(err, EngineError::PipetteNotLoaded(_)));
    }
}
