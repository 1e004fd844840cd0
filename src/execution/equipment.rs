//! Loading labware, modules and pipettes, and driving module hardware.

use std::sync::Arc;

use tracing::{debug, info};

use crate::definitions::{pipette_config, uri_from_details, LabwareDefinition, ModuleDefinition};
use crate::error::{EngineError, EngineResult};
use crate::hardware::{engine_error_from_hardware, HardwareControlApi, ModuleAction};
use crate::resources::ModelUtils;
use crate::state::{StateStore, StateView};
use crate::types::{DeckSlotLocation, LabwareLocation, LabwareOffsetLocation, ModuleModel, MountType};

/// Outcome of resolving a labware load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedLabwareData {
    pub labware_id: String,
    pub definition: LabwareDefinition,
    pub offset_id: Option<String>,
}

/// Outcome of resolving a module load.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedModuleData {
    pub module_id: String,
    pub serial_number: String,
    pub definition: ModuleDefinition,
}

/// Resolves equipment loads against state and drives module hardware.
pub struct EquipmentHandler {
    hardware: Arc<dyn HardwareControlApi>,
    state: Arc<StateStore>,
    model_utils: Arc<ModelUtils>,
}

impl EquipmentHandler {
    pub fn new(hardware: Arc<dyn HardwareControlApi>, state: Arc<StateStore>, model_utils: Arc<ModelUtils>) -> Self {
        Self {
            hardware,
            state,
            model_utils,
        }
    }

    /// Resolve the definition, id and applicable offset for a new labware.
    pub fn load_labware(
        &self,
        load_name: &str,
        namespace: &str,
        version: u32,
        location: &LabwareLocation,
        labware_id: Option<&str>,
    ) -> EngineResult<LoadedLabwareData> {
        let view = self.state.view();
        let uri = uri_from_details(namespace, load_name, version);
        let definition = view.labware().get_definition_by_uri(&uri)?.clone();

        view.geometry().ensure_location_not_occupied(location.clone())?;
        let offset_id = find_offset_id(&view, &uri, location)?;
        let labware_id = self.model_utils.ensure_id(labware_id);

        debug!("Resolved labware {} as {} at {}", labware_id, uri, location);
        Ok(LoadedLabwareData {
            labware_id,
            definition,
            offset_id,
        })
    }

    /// Id of the offset that applies to `labware_id` once it is at `location`.
    pub fn find_offset_for_move(&self, labware_id: &str, location: &LabwareLocation) -> EngineResult<Option<String>> {
        let view = self.state.view();
        let uri = view.labware().get_definition_uri(labware_id)?.to_string();
        find_offset_id(&view, &uri, location)
    }

    /// Match a module load to an attached module.
    pub fn load_module(
        &self,
        model: ModuleModel,
        location: DeckSlotLocation,
        module_id: Option<&str>,
    ) -> EngineResult<LoadedModuleData> {
        let view = self.state.view();
        view.geometry()
            .ensure_location_not_occupied(LabwareLocation::DeckSlot(location))?;

        let (serial_number, definition) = view.modules().find_attached_module(model).ok_or_else(|| {
            EngineError::ModuleNotAttached(format!("No available {model:?} found."))
        })?;

        let module_id = self.model_utils.ensure_id(module_id);
        info!("Loading module {} ({}) in {}", module_id, serial_number, location.slot_name);
        Ok(LoadedModuleData {
            module_id,
            serial_number: serial_number.to_string(),
            definition: definition.clone(),
        })
    }

    /// Check a pipette name and pick its id.
    pub fn load_pipette(&self, pipette_name: &str, mount: MountType, pipette_id: Option<&str>) -> EngineResult<String> {
        if pipette_config(pipette_name).is_none() {
            return Err(EngineError::PipetteNotLoaded(format!(
                "Unknown pipette model {pipette_name}."
            )));
        }
        if let Some(existing) = self.state.view().pipettes().get_by_mount(mount) {
            debug!("Replacing pipette {} on {:?} mount", existing.id, mount);
        }
        Ok(self.model_utils.ensure_id(pipette_id))
    }

    /// Run a hardware operation on a loaded module.
    ///
    /// With virtual modules only state changes.
    pub async fn module_action(&self, module_id: &str, action: ModuleAction) -> EngineResult<()> {
        let serial_number = {
            let view = self.state.view();
            if view.config().use_virtual_modules {
                view.modules().get(module_id)?;
                return Ok(());
            }
            view.modules().get_serial_number(module_id)?.to_string()
        };
        debug!("Module {} ({}): {:?}", module_id, serial_number, action);
        self.hardware
            .module_action(&serial_number, action)
            .await
            .map_err(engine_error_from_hardware)
    }
}

fn find_offset_id(view: &StateView, definition_uri: &str, location: &LabwareLocation) -> EngineResult<Option<String>> {
    let offset_location = match location {
        LabwareLocation::DeckSlot(slot) => LabwareOffsetLocation {
            slot_name: slot.slot_name,
            module_model: None,
        },
        LabwareLocation::Module(module) => {
            let modules = view.modules();
            LabwareOffsetLocation {
                slot_name: modules.get_location(&module.module_id)?.slot_name,
                module_model: Some(modules.get_model(&module.module_id)?),
            }
        }
        LabwareLocation::OffDeck => return Ok(None),
    };
    Ok(view
        .labware()
        .find_applicable_labware_offset(definition_uri, &offset_location)
        .map(|offset| offset.id.clone()))
}
