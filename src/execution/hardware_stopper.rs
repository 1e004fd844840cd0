//! Hardware recovery at the end of a run.

use std::sync::Arc;

use tracing::{info, warn};

use super::{GantryMover, TipHandler};
use crate::error::EngineResult;
use crate::hardware::{engine_error_from_hardware, HardwareControlApi};
use crate::state::{StateStore, StateView};
use crate::types::{CriticalPoint, DropTipWellLocation, Waypoint};

/// Halts motion and returns the robot to a safe idle state.
pub struct HardwareStopper {
    hardware: Arc<dyn HardwareControlApi>,
    state: Arc<StateStore>,
    gantry: Arc<dyn GantryMover>,
    tip_handler: Arc<dyn TipHandler>,
}

impl HardwareStopper {
    pub fn new(
        hardware: Arc<dyn HardwareControlApi>,
        state: Arc<StateStore>,
        gantry: Arc<dyn GantryMover>,
        tip_handler: Arc<dyn TipHandler>,
    ) -> Self {
        Self {
            hardware,
            state,
            gantry,
            tip_handler,
        }
    }

    /// Stop all motion immediately.
    pub async fn do_halt(&self) -> EngineResult<()> {
        self.hardware.halt().await.map_err(engine_error_from_hardware)
    }

    /// Stop the motion controller, optionally homing and dropping tips first.
    ///
    /// Home and tip-drop failures are logged and skipped. Only a failure of
    /// the final controller stop is returned.
    pub async fn do_stop_and_recover(&self, drop_tips_and_home: bool) -> EngineResult<()> {
        if drop_tips_and_home {
            if let Err(e) = self.gantry.home(None).await {
                warn!("Failed to home during recovery: {}", e);
            }
            self.drop_attached_tips().await;
        }
        info!("Stopping hardware");
        self.hardware
            .stop(drop_tips_and_home)
            .await
            .map_err(engine_error_from_hardware)
    }

    async fn drop_attached_tips(&self) {
        let view = self.state.view();
        let with_tips: Vec<String> = view
            .pipettes()
            .get_all()
            .into_iter()
            .filter(|pipette| view.pipettes().get_has_tip(&pipette.id))
            .map(|pipette| pipette.id.clone())
            .collect();

        for pipette_id in with_tips {
            if let Err(e) = self.drop_tip_in_trash(&view, &pipette_id).await {
                warn!("Failed to drop tip from pipette {} during recovery: {}", pipette_id, e);
            }
        }
    }

    async fn drop_tip_in_trash(&self, view: &StateView, pipette_id: &str) -> EngineResult<()> {
        let (destination, critical_point) = {
            let trash_id = view.labware().get_fixed_trash_id()?;
            let well_location =
                view.geometry()
                    .get_tip_drop_location(pipette_id, trash_id, &DropTipWellLocation::default())?;
            let destination = view.geometry().get_well_position(trash_id, "A1", Some(&well_location))?;
            let critical_point = view
                .motion()
                .get_pipette_location(pipette_id, None)?
                .critical_point;
            (destination, critical_point)
        };

        let max_travel_z = self.gantry.get_max_travel_z(pipette_id).await?;
        let origin = self.gantry.get_position(pipette_id, None, false).await?;
        let waypoints = [
            Waypoint {
                position: origin.with_z(max_travel_z),
                critical_point,
            },
            Waypoint {
                position: destination.with_z(max_travel_z),
                critical_point: Some(CriticalPoint::Tip),
            },
            Waypoint {
                position: destination,
                critical_point: Some(CriticalPoint::Tip),
            },
        ];
        self.gantry.move_to(pipette_id, &waypoints, None).await?;
        self.tip_handler.drop_tip(pipette_id, Some(false)).await
    }
}
