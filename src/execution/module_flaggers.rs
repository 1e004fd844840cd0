//! Checks that a module will let labware in or out.

use crate::error::{EngineError, EngineResult};
use crate::state::StateView;
use crate::types::{HeaterShakerLatchStatus, LabwareLocation, ModuleType, ThermocyclerLidStatus};

fn parent_module_of<'a>(
    state: &StateView,
    location: &'a LabwareLocation,
    module_type: ModuleType,
) -> EngineResult<Option<&'a str>> {
    let LabwareLocation::Module(module) = location else {
        return Ok(None);
    };
    let model = state.modules().get_model(&module.module_id)?;
    Ok((model.module_type() == module_type).then_some(module.module_id.as_str()))
}

/// Fail unless the thermocycler holding `location`, if any, has its lid open.
pub fn raise_if_labware_in_non_open_thermocycler(state: &StateView, location: &LabwareLocation) -> EngineResult<()> {
    let Some(module_id) = parent_module_of(state, location, ModuleType::Thermocycler)? else {
        return Ok(());
    };
    match state.modules().get_thermocycler_lid_status(module_id)? {
        ThermocyclerLidStatus::Open => Ok(()),
        status => Err(EngineError::ThermocyclerNotOpen(format!(
            "Thermocycler {module_id} lid is {status:?}; it must be open to move labware to or from it."
        ))),
    }
}

/// Fail unless the heater-shaker holding `location`, if any, has its latch open.
pub fn raise_if_labware_latched_on_heater_shaker(state: &StateView, location: &LabwareLocation) -> EngineResult<()> {
    let Some(module_id) = parent_module_of(state, location, ModuleType::HeaterShaker)? else {
        return Ok(());
    };
    match state.modules().get_heater_shaker_latch_status(module_id)? {
        HeaterShakerLatchStatus::Open => Ok(()),
        status => Err(EngineError::HeaterShakerLabwareLatchNotOpen(format!(
            "Heater-Shaker {module_id} labware latch is {status:?}; it must be open to move labware to or from it."
        ))),
    }
}
