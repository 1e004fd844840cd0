//! Attached and loaded hardware modules.

use std::collections::HashMap;

use super::HandlesActions;
use crate::actions::Action;
use crate::commands::{CommandParams, CommandResult, CommandStatus};
use crate::config::DeckType;
use crate::definitions::ModuleDefinition;
use crate::error::{EngineError, EngineResult};
use crate::types::{
    DeckSlotLocation, DeckSlotName, HeaterShakerLatchStatus, LabwareLocation, LabwareOffsetVector,
    LoadedModule, ModuleModel, ModuleType, ThermocyclerLidStatus,
};

/// Slot pairs whose direct path crosses a thermocycler's lid.
const THERMOCYCLER_SLOT_TRANSITS_TO_DODGE: [(DeckSlotName, DeckSlotName); 7] = [
    (DeckSlotName::Slot1, DeckSlotName::FIXED_TRASH),
    (DeckSlotName::Slot4, DeckSlotName::FIXED_TRASH),
    (DeckSlotName::Slot4, DeckSlotName::Slot9),
    (DeckSlotName::Slot4, DeckSlotName::Slot8),
    (DeckSlotName::Slot1, DeckSlotName::Slot8),
    (DeckSlotName::Slot4, DeckSlotName::Slot11),
    (DeckSlotName::Slot1, DeckSlotName::Slot11),
];

/// Per-family state of a loaded module.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ModuleSubState {
    Thermocycler { lid_status: ThermocyclerLidStatus },
    HeaterShaker { latch_status: HeaterShakerLatchStatus },
    Magnetic { engaged_height: Option<f64> },
}

impl ModuleSubState {
    fn initial(model: ModuleModel) -> Self {
        match model.module_type() {
            ModuleType::Thermocycler => Self::Thermocycler {
                lid_status: ThermocyclerLidStatus::Unknown,
            },
            ModuleType::HeaterShaker => Self::HeaterShaker {
                latch_status: HeaterShakerLatchStatus::Unknown,
            },
            ModuleType::Magnetic => Self::Magnetic { engaged_height: None },
        }
    }
}

/// Module state container.
#[derive(Debug, Clone, Default)]
pub struct ModuleState {
    /// Modules detected on the robot, by serial number
    attached_by_serial: HashMap<String, ModuleDefinition>,
    attached_order: Vec<String>,
    modules_by_id: HashMap<String, LoadedModule>,
    module_order: Vec<String>,
    definitions_by_id: HashMap<String, ModuleDefinition>,
    substates_by_id: HashMap<String, ModuleSubState>,
}

impl ModuleState {
    fn set_substate(&self, module_id: &str, substate: ModuleSubState) -> Option<Self> {
        let mut next = self.clone();
        let current = next.substates_by_id.get_mut(module_id)?;
        *current = substate;
        Some(next)
    }

    fn handle_succeeded(&self, params: &CommandParams, result: &CommandResult) -> Option<Self> {
        match (params, result) {
            (CommandParams::LoadModule(params), CommandResult::LoadModule(result)) => {
                let mut next = self.clone();
                let module = LoadedModule {
                    id: result.module_id.clone(),
                    model: result.model,
                    location: params.location,
                    serial_number: result.serial_number.clone(),
                };
                if !next.modules_by_id.contains_key(&module.id) {
                    next.module_order.push(module.id.clone());
                }
                next.substates_by_id
                    .insert(module.id.clone(), ModuleSubState::initial(module.model));
                next.definitions_by_id
                    .insert(module.id.clone(), result.definition.clone());
                next.modules_by_id.insert(module.id.clone(), module);
                Some(next)
            }
            (CommandParams::ThermocyclerOpenLid(p), _) => self.set_substate(
                &p.module_id,
                ModuleSubState::Thermocycler {
                    lid_status: ThermocyclerLidStatus::Open,
                },
            ),
            (CommandParams::ThermocyclerCloseLid(p), _) => self.set_substate(
                &p.module_id,
                ModuleSubState::Thermocycler {
                    lid_status: ThermocyclerLidStatus::Closed,
                },
            ),
            (CommandParams::HeaterShakerOpenLabwareLatch(p), _) => self.set_substate(
                &p.module_id,
                ModuleSubState::HeaterShaker {
                    latch_status: HeaterShakerLatchStatus::Open,
                },
            ),
            (CommandParams::HeaterShakerCloseLabwareLatch(p), _) => self.set_substate(
                &p.module_id,
                ModuleSubState::HeaterShaker {
                    latch_status: HeaterShakerLatchStatus::Closed,
                },
            ),
            (CommandParams::MagneticModuleEngage(p), _) => self.set_substate(
                &p.module_id,
                ModuleSubState::Magnetic {
                    engaged_height: Some(p.height),
                },
            ),
            (CommandParams::MagneticModuleDisengage(p), _) => self.set_substate(
                &p.module_id,
                ModuleSubState::Magnetic { engaged_height: None },
            ),
            _ => None,
        }
    }
}

impl HandlesActions for ModuleState {
    fn handle_action(&self, action: &Action) -> Option<Self> {
        match action {
            Action::AddModule {
                serial_number,
                definition,
            } => {
                let mut next = self.clone();
                if !next.attached_by_serial.contains_key(serial_number) {
                    next.attached_order.push(serial_number.clone());
                }
                next.attached_by_serial
                    .insert(serial_number.clone(), definition.clone());
                Some(next)
            }
            Action::UpdateCommand { command } if command.status == CommandStatus::Succeeded => {
                let result = command.result.as_ref()?;
                self.handle_succeeded(&command.params, result)
            }
            _ => None,
        }
    }
}

/// Read-only module state view.
#[derive(Debug, Clone, Copy)]
pub struct ModuleView<'a> {
    state: &'a ModuleState,
}

impl<'a> ModuleView<'a> {
    pub(crate) fn new(state: &'a ModuleState) -> Self {
        Self { state }
    }

    /// Get a loaded module by id.
    pub fn get(&self, module_id: &str) -> EngineResult<&'a LoadedModule> {
        self.state
            .modules_by_id
            .get(module_id)
            .ok_or_else(|| EngineError::ModuleNotLoaded(format!("Module {module_id} not found.")))
    }

    /// All loaded modules in load order.
    pub fn get_all(&self) -> Vec<&'a LoadedModule> {
        self.state
            .module_order
            .iter()
            .filter_map(|id| self.state.modules_by_id.get(id))
            .collect()
    }

    pub fn get_location(&self, module_id: &str) -> EngineResult<DeckSlotLocation> {
        Ok(self.get(module_id)?.location)
    }

    pub fn get_model(&self, module_id: &str) -> EngineResult<ModuleModel> {
        Ok(self.get(module_id)?.model)
    }

    pub fn get_definition(&self, module_id: &str) -> EngineResult<&'a ModuleDefinition> {
        self.state
            .definitions_by_id
            .get(module_id)
            .ok_or_else(|| EngineError::ModuleNotLoaded(format!("Module {module_id} not found.")))
    }

    /// Serial number of the physical module behind a loaded module.
    pub fn get_serial_number(&self, module_id: &str) -> EngineResult<&'a str> {
        self.get(module_id)?.serial_number.as_deref().ok_or_else(|| {
            EngineError::ModuleNotAttached(format!("Module {module_id} has no attached hardware."))
        })
    }

    /// Height of the module's top above the deck.
    pub fn get_overall_height(&self, module_id: &str) -> EngineResult<f64> {
        Ok(self.get_definition(module_id)?.dimensions.bare_overall_height)
    }

    /// How far the module rises above the labware it holds.
    pub fn get_height_over_labware(&self, module_id: &str) -> EngineResult<f64> {
        Ok(self.get_definition(module_id)?.dimensions.over_labware_height)
    }

    /// Offset from the module's slot origin to its labware origin on this deck.
    pub fn get_module_offset(&self, module_id: &str, deck_type: DeckType) -> EngineResult<LabwareOffsetVector> {
        let definition = self.get_definition(module_id)?;
        let slot = self.get_location(module_id)?.slot_name;
        Ok(definition.labware_offset_for(deck_type, slot))
    }

    pub fn get_by_slot(&self, slot_name: DeckSlotName) -> Option<&'a LoadedModule> {
        self.get_all()
            .into_iter()
            .find(|module| module.location.slot_name == slot_name)
    }

    /// Fail if a module occupies the slot of `location`.
    pub fn raise_if_module_in_location(&self, location: &LabwareLocation) -> EngineResult<()> {
        if let LabwareLocation::DeckSlot(slot) = location {
            if let Some(module) = self.get_by_slot(slot.slot_name) {
                return Err(EngineError::LocationIsOccupied(format!(
                    "Module {:?} is already present at {location}.",
                    module.model
                )));
            }
        }
        Ok(())
    }

    /// An attached module of `model` that no loaded module is using yet.
    pub fn find_attached_module(&self, model: ModuleModel) -> Option<(&'a str, &'a ModuleDefinition)> {
        let in_use: Vec<&str> = self
            .get_all()
            .into_iter()
            .filter_map(|module| module.serial_number.as_deref())
            .collect();

        self.state
            .attached_order
            .iter()
            .filter(|serial| !in_use.contains(&serial.as_str()))
            .filter_map(|serial| {
                self.state
                    .attached_by_serial
                    .get(serial)
                    .map(|definition| (serial.as_str(), definition))
            })
            .find(|(_, definition)| definition.model == model)
    }

    fn get_substate(&self, module_id: &str) -> EngineResult<ModuleSubState> {
        self.state
            .substates_by_id
            .get(module_id)
            .copied()
            .ok_or_else(|| EngineError::ModuleNotLoaded(format!("Module {module_id} not found.")))
    }

    /// Lid status of a thermocycler.
    pub fn get_thermocycler_lid_status(&self, module_id: &str) -> EngineResult<ThermocyclerLidStatus> {
        match self.get_substate(module_id)? {
            ModuleSubState::Thermocycler { lid_status } => Ok(lid_status),
            _ => Err(EngineError::WrongModuleType(format!(
                "Module {module_id} is not a thermocycler."
            ))),
        }
    }

    /// Labware latch status of a heater-shaker.
    pub fn get_heater_shaker_latch_status(&self, module_id: &str) -> EngineResult<HeaterShakerLatchStatus> {
        match self.get_substate(module_id)? {
            ModuleSubState::HeaterShaker { latch_status } => Ok(latch_status),
            _ => Err(EngineError::WrongModuleType(format!(
                "Module {module_id} is not a heater-shaker."
            ))),
        }
    }

    /// Engaged magnet height, or `None` while disengaged.
    pub fn get_magnet_engaged_height(&self, module_id: &str) -> EngineResult<Option<f64>> {
        match self.get_substate(module_id)? {
            ModuleSubState::Magnetic { engaged_height } => Ok(engaged_height),
            _ => Err(EngineError::WrongModuleType(format!(
                "Module {module_id} is not a magnetic module."
            ))),
        }
    }

    /// Whether a move between two slots must detour around a thermocycler.
    pub fn should_dodge_thermocycler(&self, from_slot: DeckSlotName, to_slot: DeckSlotName) -> bool {
        let has_thermocycler = self
            .get_all()
            .into_iter()
            .any(|module| module.model.module_type() == ModuleType::Thermocycler);

        has_thermocycler
            && THERMOCYCLER_SLOT_TRANSITS_TO_DODGE
                .iter()
                .any(|&(a, b)| (a, b) == (from_slot, to_slot) || (b, a) == (from_slot, to_slot))
    }
}
