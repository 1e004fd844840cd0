//! Thermocycler plate lift for gripper pick-ups.

use std::sync::Arc;

use tracing::debug;

use super::EquipmentHandler;
use crate::error::EngineResult;
use crate::hardware::ModuleAction;
use crate::state::StateStore;
use crate::types::{LabwareLocation, ModuleModel};

/// Raises a plate out of a Thermocycler V2 so the gripper can reach it.
pub struct ThermocyclerPlateLifter {
    state: Arc<StateStore>,
    equipment: Arc<EquipmentHandler>,
}

impl ThermocyclerPlateLifter {
    pub fn new(state: Arc<StateStore>, equipment: Arc<EquipmentHandler>) -> Self {
        Self { state, equipment }
    }

    fn lifting_module(&self, location: &LabwareLocation) -> EngineResult<Option<String>> {
        let LabwareLocation::Module(module) = location else {
            return Ok(None);
        };
        let view = self.state.view();
        if view.config().use_virtual_modules {
            return Ok(None);
        }
        let model = view.modules().get_model(&module.module_id)?;
        Ok((model == ModuleModel::ThermocyclerModuleV2).then(|| module.module_id.clone()))
    }

    /// Lift the plate at `location` if it sits in a thermocycler. Returns whether it did.
    pub async fn lift_plate(&self, location: &LabwareLocation) -> EngineResult<bool> {
        let Some(module_id) = self.lifting_module(location)? else {
            return Ok(false);
        };
        debug!("Raising plate in thermocycler {}", module_id);
        self.equipment.module_action(&module_id, ModuleAction::RaisePlate).await?;
        Ok(true)
    }

    /// Return the lifting mechanism after a lift.
    pub async fn return_plate(&self, location: &LabwareLocation) -> EngineResult<()> {
        if let Some(module_id) = self.lifting_module(location)? {
            self.equipment
                .module_action(&module_id, ModuleAction::ReturnFromRaisePlate)
                .await?;
        }
        Ok(())
    }
}
