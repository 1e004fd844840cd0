//! Tip pick-up and drop.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{EngineError, EngineResult};
use crate::hardware::{engine_error_from_hardware, HardwareControlApi};
use crate::state::StateStore;
use crate::types::TipGeometry;

/// Attaches and removes tips at the pipette's current position.
#[async_trait]
pub trait TipHandler: Send + Sync {
    /// Pick up the tip in `well_name` and report its geometry.
    async fn pick_up_tip(&self, pipette_id: &str, labware_id: &str, well_name: &str) -> EngineResult<TipGeometry>;

    /// Drop the attached tip. `home_after` defaults to true.
    async fn drop_tip(&self, pipette_id: &str, home_after: Option<bool>) -> EngineResult<()>;
}

fn ensure_tip_attached(state: &StateStore, pipette_id: &str) -> EngineResult<()> {
    if state.view().pipettes().get_has_tip(pipette_id) {
        Ok(())
    } else {
        Err(EngineError::TipNotAttached(format!(
            "Pipette {pipette_id} has no tip to drop."
        )))
    }
}

/// Drives the pipette plunger and tip sensors.
pub struct HardwareTipHandler {
    hardware: Arc<dyn HardwareControlApi>,
    state: Arc<StateStore>,
}

impl HardwareTipHandler {
    pub fn new(hardware: Arc<dyn HardwareControlApi>, state: Arc<StateStore>) -> Self {
        Self { hardware, state }
    }
}

#[async_trait]
impl TipHandler for HardwareTipHandler {
    async fn pick_up_tip(&self, pipette_id: &str, labware_id: &str, well_name: &str) -> EngineResult<TipGeometry> {
        let (mount, geometry) = {
            let view = self.state.view();
            let mount = view.pipettes().get_hardware_mount(pipette_id)?;
            let geometry = view.geometry().get_nominal_tip_geometry(pipette_id, labware_id, well_name)?;
            (mount, geometry)
        };
        self.hardware
            .pick_up_tip(mount, geometry.length)
            .await
            .map_err(engine_error_from_hardware)?;
        Ok(geometry)
    }

    async fn drop_tip(&self, pipette_id: &str, home_after: Option<bool>) -> EngineResult<()> {
        ensure_tip_attached(&self.state, pipette_id)?;
        let mount = self.state.view().pipettes().get_hardware_mount(pipette_id)?;
        self.hardware
            .drop_tip(mount, home_after.unwrap_or(true))
            .await
            .map_err(engine_error_from_hardware)
    }
}

/// Reports tip geometry from definitions without touching hardware.
pub struct VirtualTipHandler {
    state: Arc<StateStore>,
}

impl VirtualTipHandler {
    pub fn new(state: Arc<StateStore>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl TipHandler for VirtualTipHandler {
    async fn pick_up_tip(&self, pipette_id: &str, labware_id: &str, well_name: &str) -> EngineResult<TipGeometry> {
        self.state
            .view()
            .geometry()
            .get_nominal_tip_geometry(pipette_id, labware_id, well_name)
    }

    async fn drop_tip(&self, pipette_id: &str, _home_after: Option<bool>) -> EngineResult<()> {
        ensure_tip_attached(&self.state, pipette_id)
    }
}

/// Pick the tip handler for this engine.
pub fn create_tip_handler(
    hardware: Arc<dyn HardwareControlApi>,
    state: Arc<StateStore>,
    use_virtual_pipettes: bool,
) -> Arc<dyn TipHandler> {
    if use_virtual_pipettes {
        Arc::new(VirtualTipHandler::new(state))
    } else {
        Arc::new(HardwareTipHandler::new(hardware, state))
    }
}
