//! Labware, definition and calibration-offset state.
//!
//! The offsets table is append-only: offsets are never edited or removed, and
//! a labware only changes *which* offset it points to. Offsets are kept in
//! insertion order so that lookups can scan newest-first.

use std::collections::HashMap;

use super::HandlesActions;
use crate::actions::Action;
use crate::commands::{CommandParams, CommandResult, CommandStatus};
use crate::definitions::{DeckDefinition, LabwareDefinition, WellDefinition};
use crate::error::{EngineError, EngineResult};
use crate::types::{
    DeckSlotName, Dimensions, LabwareLocation, LabwareOffset, LabwareOffsetLocation,
    LabwareOffsetVector, LoadedLabware, Point,
};

/// Labware whose magnetic-module engage height is recorded in half millimeters.
const MAGDECK_HALF_MM_LABWARE: [&str; 3] = [
    "opentrons/biorad_96_wellplate_200ul_pcr/1",
    "opentrons/nest_96_wellplate_100ul_pcr_full_skirt/1",
    "opentrons/usascientific_96_wellplate_2.4ml_deep/1",
];

/// Labware placed by the deck itself, such as the fixed trash.
#[derive(Debug, Clone, PartialEq)]
pub struct DeckFixedLabware {
    pub labware_id: String,
    pub location: LabwareLocation,
    pub definition: LabwareDefinition,
}

/// Labware state container.
#[derive(Debug, Clone)]
pub struct LabwareState {
    labware_by_id: HashMap<String, LoadedLabware>,
    labware_order: Vec<String>,
    offsets: Vec<LabwareOffset>,
    definitions_by_uri: HashMap<String, LabwareDefinition>,
    deck_definition: DeckDefinition,
}

impl LabwareState {
    /// Initial state holding the deck's fixed labware.
    pub fn new(deck_definition: DeckDefinition, fixed_labware: Vec<DeckFixedLabware>) -> Self {
        let mut state = Self {
            labware_by_id: HashMap::new(),
            labware_order: Vec::new(),
            offsets: Vec::new(),
            definitions_by_uri: HashMap::new(),
            deck_definition,
        };
        for fixed in fixed_labware {
            let uri = fixed.definition.uri();
            state.insert_labware(LoadedLabware {
                id: fixed.labware_id,
                load_name: fixed.definition.parameters.load_name.clone(),
                definition_uri: uri.clone(),
                location: fixed.location,
                offset_id: None,
                display_name: None,
            });
            state.definitions_by_uri.insert(uri, fixed.definition);
        }
        state
    }

    fn insert_labware(&mut self, labware: LoadedLabware) {
        if !self.labware_by_id.contains_key(&labware.id) {
            self.labware_order.push(labware.id.clone());
        }
        self.labware_by_id.insert(labware.id.clone(), labware);
    }

    fn has_offset(&self, offset_id: &str) -> bool {
        self.offsets.iter().any(|offset| offset.id == offset_id)
    }
}

impl HandlesActions for LabwareState {
    fn handle_action(&self, action: &Action) -> Option<Self> {
        match action {
            Action::UpdateCommand { command } if command.status == CommandStatus::Succeeded => {
                match (&command.params, &command.result) {
                    (CommandParams::LoadLabware(params), Some(CommandResult::LoadLabware(result))) => {
                        let mut next = self.clone();
                        let uri = result.definition.uri();
                        next.insert_labware(LoadedLabware {
                            id: result.labware_id.clone(),
                            load_name: result.definition.parameters.load_name.clone(),
                            definition_uri: uri.clone(),
                            location: params.location.clone(),
                            offset_id: result.offset_id.clone(),
                            display_name: params.display_name.clone(),
                        });
                        next.definitions_by_uri.insert(uri, result.definition.clone());
                        Some(next)
                    }
                    (CommandParams::MoveLabware(params), Some(CommandResult::MoveLabware(result))) => {
                        let mut next = self.clone();
                        let labware = next.labware_by_id.get_mut(&params.labware_id)?;
                        labware.location = params.new_location.clone();
                        labware.offset_id = result.offset_id.clone();
                        Some(next)
                    }
                    _ => None,
                }
            }
            Action::AddLabwareOffset {
                labware_offset_id,
                created_at,
                request,
            } => {
                let mut next = self.clone();
                next.offsets.push(LabwareOffset {
                    id: labware_offset_id.clone(),
                    created_at: *created_at,
                    definition_uri: request.definition_uri.clone(),
                    location: request.location.clone(),
                    vector: request.vector,
                });
                Some(next)
            }
            Action::AddLabwareDefinition { definition } => {
                let mut next = self.clone();
                next.definitions_by_uri.insert(definition.uri(), definition.clone());
                Some(next)
            }
            _ => None,
        }
    }
}

/// Read-only labware state view.
#[derive(Debug, Clone, Copy)]
pub struct LabwareView<'a> {
    state: &'a LabwareState,
}

impl<'a> LabwareView<'a> {
    pub(crate) fn new(state: &'a LabwareState) -> Self {
        Self { state }
    }

    /// Get labware data by the labware's unique identifier.
    pub fn get(&self, labware_id: &str) -> EngineResult<&'a LoadedLabware> {
        self.state
            .labware_by_id
            .get(labware_id)
            .ok_or_else(|| EngineError::LabwareNotLoaded(format!("Labware {labware_id} not found.")))
    }

    /// All loaded labware, in load order.
    pub fn get_all(&self) -> Vec<&'a LoadedLabware> {
        self.state
            .labware_order
            .iter()
            .filter_map(|id| self.state.labware_by_id.get(id))
            .collect()
    }

    /// Labware currently on the given module.
    pub fn get_id_by_module(&self, module_id: &str) -> EngineResult<&'a str> {
        self.get_all()
            .into_iter()
            .find(|labware| {
                matches!(&labware.location, LabwareLocation::Module(loc) if loc.module_id == module_id)
            })
            .map(|labware| labware.id.as_str())
            .ok_or_else(|| {
                EngineError::LabwareNotLoadedOnModule(format!(
                    "There is no labware loaded on module {module_id}"
                ))
            })
    }

    /// Labware sitting directly in a slot.
    pub fn get_by_slot(&self, slot_name: DeckSlotName) -> Option<&'a LoadedLabware> {
        let location = LabwareLocation::slot(slot_name);
        self.get_all().into_iter().find(|labware| labware.location == location)
    }

    pub fn get_location(&self, labware_id: &str) -> EngineResult<&'a LabwareLocation> {
        Ok(&self.get(labware_id)?.location)
    }

    pub fn get_definition_uri(&self, labware_id: &str) -> EngineResult<&'a str> {
        Ok(self.get(labware_id)?.definition_uri.as_str())
    }


    /// Definition of a loaded labware.
    pub fn get_definition(&self, labware_id: &str) -> EngineResult<&'a LabwareDefinition> {
        let uri = self.get_definition_uri(labware_id)?;
        self.get_definition_by_uri(uri)
    }

    /// Definition registered under `uri`.
    pub fn get_definition_by_uri(&self, uri: &str) -> EngineResult<&'a LabwareDefinition> {
        self.state.definitions_by_uri.get(uri).ok_or_else(|| {
            EngineError::LabwareDefinitionDoesNotExist(format!("Labware definition for {uri} not found."))
        })
    }


    /// Absolute position of a slot's origin.
    pub fn get_slot_position(&self, slot_name: DeckSlotName) -> EngineResult<Point> {
        self.state
            .deck_definition
            .slot(slot_name)
            .map(|slot| slot.position)
            .ok_or_else(|| EngineError::SlotDoesNotExist(format!("Slot ID {} does not exist in deck", slot_name.id())))
    }

    /// Absolute position of a slot's center.
    pub fn get_slot_center_position(&self, slot_name: DeckSlotName) -> EngineResult<Point> {
        let slot = self.state.deck_definition.slot(slot_name).ok_or_else(|| {
            EngineError::SlotDoesNotExist(format!("Slot ID {} does not exist in deck", slot_name.id()))
        })?;
        Ok(Point::new(
            slot.position.x + slot.bounding_box.x / 2.0,
            slot.position.y + slot.bounding_box.y / 2.0,
            slot.position.z,
        ))
    }

    pub fn get_has_quirk(&self, labware_id: &str, quirk: &str) -> EngineResult<bool> {
        Ok(self
            .get_definition(labware_id)?
            .parameters
            .quirks
            .iter()
            .any(|q| q == quirk))
    }

    /// Geometry of one well.
    pub fn get_well_definition(&self, labware_id: &str, well_name: &str) -> EngineResult<&'a WellDefinition> {
        self.get_definition(labware_id)?.wells.get(well_name).ok_or_else(|| {
            EngineError::WellDoesNotExist(format!("{well_name} does not exist in {labware_id}."))
        })
    }

    pub fn is_tiprack(&self, labware_id: &str) -> EngineResult<bool> {
        Ok(self.get_definition(labware_id)?.parameters.is_tiprack)
    }

    /// Nominal tip length of a tip rack, less the nozzle overlap.
    pub fn get_tip_length(&self, labware_id: &str, overlap: f64) -> EngineResult<f64> {
        self.get_definition(labware_id)?
            .parameters
            .tip_length
            .map(|length| length - overlap)
            .ok_or_else(|| EngineError::LabwareIsNotTipRack(format!("Labware {labware_id} has no tip length defined.")))
    }

    /// Offset from the top of a tip-rack well at which to drop a tip.
    pub fn get_tip_drop_z_offset(&self, labware_id: &str, length_scale: f64, additional_offset: f64) -> EngineResult<f64> {
        let tip_length = self.get_tip_length(labware_id, 0.0)?;
        Ok(-tip_length * length_scale + additional_offset)
    }

    pub fn get_dimensions(&self, labware_id: &str) -> EngineResult<Dimensions> {
        Ok(self.get_definition(labware_id)?.overall_dimensions())
    }

    /// Default magnet engage height for the labware on a magnetic module.
    ///
    /// Three legacy definitions record this height in half millimeters; their
    /// value is halved. No other definition is converted.
    pub fn get_default_magnet_height(&self, module_id: &str, offset: f64) -> EngineResult<f64> {
        let labware_id = self.get_id_by_module(module_id)?;
        let definition = self.get_definition(labware_id)?;
        let parameters = &definition.parameters;
        let engage_height = match parameters.magnetic_module_engage_height {
            Some(height) if parameters.is_magnetic_module_compatible => height,
            _ => {
                return Err(EngineError::NoMagnetEngageHeight(
                    "The labware loaded on this Magnetic Module does not have a default engage height."
                        .to_string(),
                ))
            }
        };

        let calculated = if MAGDECK_HALF_MM_LABWARE.contains(&definition.uri().as_str()) {
            engage_height / 2.0
        } else {
            engage_height
        };
        Ok(calculated + offset)
    }

    /// Calibration offset of a labware, or zero if none is assigned.
    pub fn get_labware_offset_vector(&self, labware_id: &str) -> EngineResult<LabwareOffsetVector> {
        match &self.get(labware_id)?.offset_id {
            Some(offset_id) => Ok(self.get_labware_offset(offset_id)?.vector),
            None => Ok(LabwareOffsetVector::zero()),
        }
    }

    pub fn get_labware_offset(&self, labware_offset_id: &str) -> EngineResult<&'a LabwareOffset> {
        self.state
            .offsets
            .iter()
            .find(|offset| offset.id == labware_offset_id)
            .ok_or_else(|| {
                EngineError::LabwareOffsetDoesNotExist(format!("Labware offset {labware_offset_id} not found."))
            })
    }

    /// All offsets, in the order they were added.
    pub fn get_labware_offsets(&self) -> &'a [LabwareOffset] {
        &self.state.offsets
    }

    /// Most recently added offset matching `definition_uri` and `location` exactly.
    ///
    /// A module location only matches an offset recorded for the identical
    /// module model.
    pub fn find_applicable_labware_offset(
        &self,
        definition_uri: &str,
        location: &LabwareOffsetLocation,
    ) -> Option<&'a LabwareOffset> {
        self.state
            .offsets
            .iter()
            .rev()
            .find(|candidate| candidate.definition_uri == definition_uri && &candidate.location == location)
    }

    /// Id of the labware in the fixed trash slot.
    pub fn get_fixed_trash_id(&self) -> EngineResult<&'a str> {
        self.get_by_slot(DeckSlotName::FIXED_TRASH)
            .map(|labware| labware.id.as_str())
            .ok_or_else(|| {
                EngineError::LabwareNotLoaded(
                    "No labware loaded into fixed trash location by this deck type.".to_string(),
                )
            })
    }


    /// Fail if any labware occupies `location`.
    pub fn raise_if_labware_in_location(&self, location: &LabwareLocation) -> EngineResult<()> {
        if let Some(labware) = self.get_all().into_iter().find(|labware| &labware.location == location) {
            return Err(EngineError::LocationIsOccupied(format!(
                "Labware {} is already present at {location}.",
                labware.load_name
            )));
        }
        Ok(())
    }

    /// Reject actions that would break offset integrity.
    pub fn validate_action_allowed(&self, action: &Action) -> EngineResult<()> {
        match action {
            Action::AddLabwareOffset { labware_offset_id, .. } => {
                if self.state.has_offset(labware_offset_id) {
                    return Err(EngineError::LabwareOffsetAlreadyExists(format!(
                        "Labware offset {labware_offset_id} already exists."
                    )));
                }
            }
            Action::UpdateCommand { command } if command.status == CommandStatus::Succeeded => {
                match (&command.params, &command.result) {
                    (CommandParams::LoadLabware(_), Some(CommandResult::LoadLabware(result))) => {
                        self.ensure_offset_exists(result.offset_id.as_deref())?;
                    }
                    (CommandParams::MoveLabware(params), Some(CommandResult::MoveLabware(result))) => {
                        self.get(&params.labware_id)?;
                        self.ensure_offset_exists(result.offset_id.as_deref())?;
                    }
                    _ => {}
                }
            }
            Action::ResetTips { labware_id } => {
                if !self.is_tiprack(labware_id)? {
                    return Err(EngineError::LabwareIsNotTipRack(format!(
                        "Labware {labware_id} is not a tip rack."
                    )));
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn ensure_offset_exists(&self, offset_id: Option<&str>) -> EngineResult<()> {
        if let Some(offset_id) = offset_id {
            self.get_labware_offset(offset_id)?;
        }
        Ok(())
    }
}
