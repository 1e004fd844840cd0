//! Derived positions of labware, wells and tips on the deck.
//!
//! Nothing here is stored; every query recomputes from labware, module and
//! pipette state. All positions are absolute deck coordinates. Calibration
//! offsets are included unless a method says otherwise.

use super::{LabwareView, ModuleView, PipetteView};
use crate::config::DeckType;
use crate::error::{EngineError, EngineResult};
use crate::types::{
    CurrentWell, DeckSlotName, DropTipWellLocation, DropTipWellOrigin, LabwareLocation, LabwareOffsetVector,
    LoadedLabware, Point, TipGeometry, WellLocation, WellOffset, WellOrigin,
};

/// Geometry computed from state.
#[derive(Debug, Clone, Copy)]
pub struct GeometryView<'a> {
    labware: LabwareView<'a>,
    modules: ModuleView<'a>,
    pipettes: PipetteView<'a>,
    deck_type: DeckType,
}

impl<'a> GeometryView<'a> {
    pub(crate) fn new(
        labware: LabwareView<'a>,
        modules: ModuleView<'a>,
        pipettes: PipetteView<'a>,
        deck_type: DeckType,
    ) -> Self {
        Self {
            labware,
            modules,
            pipettes,
            deck_type,
        }
    }

    /// Highest point of one labware, including any module rim above it.
    pub fn get_labware_highest_z(&self, labware_id: &str) -> EngineResult<f64> {
        let labware = self.labware.get(labware_id)?;
        self.highest_z_of(labware)
    }

    fn highest_z_of(&self, labware: &LoadedLabware) -> EngineResult<f64> {
        let position = self.get_labware_position(&labware.id)?;
        let z_dimension = self.labware.get_definition(&labware.id)?.dimensions.z_dimension;
        let height_over_labware = match &labware.location {
            LabwareLocation::Module(location) => self.modules.get_height_over_labware(&location.module_id)?,
            _ => 0.0,
        };
        Ok(position.z + z_dimension + height_over_labware)
    }

    /// Highest point over every on-deck labware and every module.
    pub fn get_all_labware_highest_z(&self) -> EngineResult<f64> {
        let mut highest: f64 = 0.0;
        for labware in self.labware.get_all() {
            if labware.location != LabwareLocation::OffDeck {
                highest = highest.max(self.highest_z_of(labware)?);
            }
        }
        for module in self.modules.get_all() {
            highest = highest.max(self.modules.get_overall_height(&module.id)?);
        }
        Ok(highest)
    }

    /// Minimum allowed travel height of an arc move.
    ///
    /// Moving within the labware the pipette is already in only needs to
    /// clear that labware.
    pub fn get_min_travel_z(
        &self,
        pipette_id: &str,
        labware_id: &str,
        current_well: Option<&CurrentWell>,
        minimum_z_height: Option<f64>,
    ) -> EngineResult<f64> {
        let within_labware = current_well
            .map(|well| well.pipette_id == pipette_id && well.labware_id == labware_id)
            .unwrap_or(false);

        let min_travel_z = if within_labware {
            self.get_labware_highest_z(labware_id)?
        } else {
            self.get_all_labware_highest_z()?
        };
        Ok(match minimum_z_height {
            Some(minimum) => min_travel_z.max(minimum),
            None => min_travel_z,
        })
    }

    /// Position of the slot or module a labware sits on.
    pub fn get_labware_parent_position(&self, labware_id: &str) -> EngineResult<Point> {
        match self.labware.get_location(labware_id)? {
            LabwareLocation::DeckSlot(location) => self.labware.get_slot_position(location.slot_name),
            LabwareLocation::Module(location) => {
                let slot_name = self.modules.get_location(&location.module_id)?.slot_name;
                let slot_position = self.labware.get_slot_position(slot_name)?;
                let module_offset = self.modules.get_module_offset(&location.module_id, self.deck_type)?;
                Ok(slot_position + module_offset)
            }
            LabwareLocation::OffDeck => Err(EngineError::LabwareNotOnDeck(format!(
                "Labware {labware_id} does not have a parent associated with it since it is no longer on the deck."
            ))),
        }
    }

    /// Labware origin without calibration.
    pub fn get_labware_origin_position(&self, labware_id: &str) -> EngineResult<Point> {
        let parent = self.get_labware_parent_position(labware_id)?;
        let corner_offset = self.labware.get_definition(labware_id)?.corner_offset_from_slot;
        Ok(parent + corner_offset)
    }

    /// Calibrated origin of a labware.
    pub fn get_labware_position(&self, labware_id: &str) -> EngineResult<Point> {
        let origin = self.get_labware_origin_position(labware_id)?;
        let calibration = self.labware.get_labware_offset_vector(labware_id)?;
        Ok(origin + calibration)
    }

    /// Absolute position of a location relative to a well.
    ///
    /// With no location, the top center of the well.
    pub fn get_well_position(
        &self,
        labware_id: &str,
        well_name: &str,
        well_location: Option<&WellLocation>,
    ) -> EngineResult<Point> {
        let labware_position = self.get_labware_position(labware_id)?;
        let well = self.labware.get_well_definition(labware_id, well_name)?;

        let offset = match well_location {
            Some(location) => {
                let origin_z = match location.origin {
                    WellOrigin::Top => well.depth,
                    WellOrigin::Center => well.depth / 2.0,
                    WellOrigin::Bottom => 0.0,
                };
                WellOffset {
                    z: location.offset.z + origin_z,
                    ..location.offset
                }
            }
            None => WellOffset {
                x: 0.0,
                y: 0.0,
                z: well.depth,
            },
        };

        Ok(Point::new(
            labware_position.x + offset.x + well.x,
            labware_position.y + offset.y + well.y,
            labware_position.z + offset.z + well.z,
        ))
    }



    /// Nominal tip length less the nozzle overlap.
    pub fn get_nominal_effective_tip_length(&self, pipette_id: &str, labware_id: &str) -> EngineResult<f64> {
        let labware_uri = self.labware.get_definition_uri(labware_id)?;
        let overlap = self.pipettes.get_nominal_tip_overlap(pipette_id, labware_uri)?;
        self.labware.get_tip_length(labware_id, overlap)
    }

    /// Geometry of the tip in a tip-rack well, from definitions only.
    pub fn get_nominal_tip_geometry(
        &self,
        pipette_id: &str,
        labware_id: &str,
        well_name: &str,
    ) -> EngineResult<TipGeometry> {
        let length = self.get_nominal_effective_tip_length(pipette_id, labware_id)?;
        let well = self.labware.get_well_definition(labware_id, well_name)?;

        match (well.shape.as_str(), well.diameter) {
            ("circular", Some(diameter)) => Ok(TipGeometry {
                length,
                diameter,
                volume: well.total_liquid_volume.trunc(),
            }),
            _ => Err(EngineError::LabwareIsNotTipRack(format!(
                "Well {well_name} in labware {labware_id} is not circular."
            ))),
        }
    }

    /// Where to drop a tip.
    ///
    /// An explicit origin is used as given. The default origin drops at the
    /// top of the fixed trash, or lowers the tip into a tip rack by the
    /// pipette's return scale.
    pub fn get_tip_drop_location(
        &self,
        pipette_id: &str,
        labware_id: &str,
        well_location: &DropTipWellLocation,
    ) -> EngineResult<WellLocation> {
        let origin = match well_location.origin {
            DropTipWellOrigin::Top => Some(WellOrigin::Top),
            DropTipWellOrigin::Bottom => Some(WellOrigin::Bottom),
            DropTipWellOrigin::Center => Some(WellOrigin::Center),
            DropTipWellOrigin::Default => None,
        };
        if let Some(origin) = origin {
            return Ok(WellLocation {
                origin,
                offset: well_location.offset,
            });
        }

        let z_offset = if self.labware.get_has_quirk(labware_id, "fixedTrash")? {
            well_location.offset.z
        } else {
            self.labware.get_tip_drop_z_offset(
                labware_id,
                self.pipettes.get_return_tip_scale(pipette_id)?,
                well_location.offset.z,
            )?
        };

        Ok(WellLocation {
            origin: WellOrigin::Top,
            offset: WellOffset {
                z: z_offset,
                ..well_location.offset
            },
        })
    }

    /// Slot of the labware, or of the module it sits on.
    pub fn get_ancestor_slot_name(&self, labware_id: &str) -> EngineResult<DeckSlotName> {
        match self.labware.get_location(labware_id)? {
            LabwareLocation::DeckSlot(location) => Ok(location.slot_name),
            LabwareLocation::Module(location) => Ok(self.modules.get_location(&location.module_id)?.slot_name),
            LabwareLocation::OffDeck => Err(EngineError::LabwareNotOnDeck(format!(
                "Labware {labware_id} does not have a slot associated with it since it is no longer on the deck."
            ))),
        }
    }

    /// Fail if `location` already holds labware or a module; otherwise hand it back.
    pub fn ensure_location_not_occupied(&self, location: LabwareLocation) -> EngineResult<LabwareLocation> {
        if location != LabwareLocation::OffDeck {
            self.labware.raise_if_labware_in_location(&location)?;
            self.modules.raise_if_module_in_location(&location)?;
        }
        Ok(location)
    }

    /// Center of a labware as if placed at `location`, without calibration.
    pub fn get_labware_center(&self, labware_id: &str, location: &LabwareLocation) -> EngineResult<Point> {
        let dimensions = self.labware.get_dimensions(labware_id)?;
        let (slot_name, module_offset) = match location {
            LabwareLocation::DeckSlot(slot) => (slot.slot_name, LabwareOffsetVector::zero()),
            LabwareLocation::Module(module) => (
                self.modules.get_location(&module.module_id)?.slot_name,
                self.modules.get_module_offset(&module.module_id, self.deck_type)?,
            ),
            LabwareLocation::OffDeck => {
                return Err(EngineError::LabwareNotOnDeck(format!(
                    "Cannot compute the center of labware {labware_id} off deck."
                )))
            }
        };
        let slot_center = self.labware.get_slot_center_position(slot_name)?;
        Ok(Point::new(
            slot_center.x + module_offset.x,
            slot_center.y + module_offset.y,
            slot_center.z + module_offset.z + dimensions.z / 2.0,
        ))
    }

    /// Extra x/y waypoints needed to route around a thermocycler.
    pub fn get_extra_waypoints(
        &self,
        labware_id: &str,
        current_well: Option<&CurrentWell>,
    ) -> EngineResult<Vec<(f64, f64)>> {
        let Some(current_well) = current_well else {
            return Ok(Vec::new());
        };
        let from_slot = self.get_ancestor_slot_name(&current_well.labware_id)?;
        let to_slot = self.get_ancestor_slot_name(labware_id)?;
        if self.modules.should_dodge_thermocycler(from_slot, to_slot) {
            let center = self.labware.get_slot_center_position(DeckSlotName::Slot5)?;
            return Ok(vec![(center.x, center.y)]);
        }
        Ok(Vec::new())
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::Action;
    use crate::commands::{
        Command, CommandIntent, CommandParams, CommandResult, CommandStatus, LoadLabwareParams,
        LoadLabwareResult, LoadModuleParams, LoadModuleResult,
    };
    use crate::definitions::{
        DeckDefinition, LabwareDefinition, LabwareDimensions, LabwareMetadata, LabwareParameters,
        ModuleDefinition, ModuleDimensions, WellDefinition,
    };
    use crate::state::{HandlesActions, LabwareState, ModuleState, PipetteState};
    use crate::types::{DeckSlotLocation, ModuleModel};
    use chrono::Utc;
    use std::collections::{BTreeMap, HashMap};

    fn plate() -> LabwareDefinition {
        let mut wells = BTreeMap::new();
        wells.insert(
            "A1".to_string(),
            WellDefinition {
                depth: 10.0,
                x: 14.0,
                y: 74.0,
                z: 1.0,
                shape: "circular".into(),
                diameter: Some(6.4),
                x_dimension: None,
                y_dimension: None,
                total_liquid_volume: 360.0,
            },
        );
        LabwareDefinition {
            namespace: "opentrons".into(),
            version: 1,
            parameters: LabwareParameters {
                load_name: "plate".into(),
                format: "96Standard".into(),
                is_tiprack: false,
                tip_length: None,
                tip_overlap: None,
                quirks: vec![],
                is_magnetic_module_compatible: false,
                magnetic_module_engage_height: None,
            },
            metadata: LabwareMetadata::default(),
            dimensions: LabwareDimensions {
                x_dimension: 127.0,
                y_dimension: 85.0,
                z_dimension: 14.0,
            },
            corner_offset_from_slot: Point::new(0.0, 0.0, 0.0),
            wells,
            ordering: vec![vec!["A1".into()]],
        }
    }

    fn heater_shaker() -> ModuleDefinition {
        ModuleDefinition {
            model: ModuleModel::HeaterShakerModuleV1,
            module_type: ModuleModel::HeaterShakerModuleV1.module_type(),
            dimensions: ModuleDimensions {
                bare_overall_height: 82.0,
                over_labware_height: 0.0,
                lid_height: None,
            },
            labware_offset: Point::new(-0.125, 1.125, 68.275),
            slot_transforms: HashMap::new(),
        }
    }

    fn succeeded(params: CommandParams, result: CommandResult) -> Action {
        Action::UpdateCommand {
            command: Command {
                id: "command".into(),
                key: "command".into(),
                created_at: Utc::now(),
                started_at: Some(Utc::now()),
                completed_at: Some(Utc::now()),
                status: CommandStatus::Succeeded,
                intent: CommandIntent::Protocol,
                params,
                result: Some(result),
                error: None,
            },
        }
    }

    fn load_labware(id: &str, location: LabwareLocation) -> Action {
        succeeded(
            CommandParams::LoadLabware(LoadLabwareParams {
                location,
                load_name: "plate".into(),
                namespace: "opentrons".into(),
                version: 1,
                labware_id: Some(id.into()),
                display_name: None,
            }),
            CommandResult::LoadLabware(LoadLabwareResult {
                labware_id: id.into(),
                definition: plate(),
                offset_id: None,
            }),
        )
    }

    struct Fixture {
        labware: LabwareState,
        modules: ModuleState,
        pipettes: PipetteState,
    }

    impl Fixture {
        fn new() -> Self {
            let module_load = succeeded(
                CommandParams::LoadModule(LoadModuleParams {
                    model: ModuleModel::HeaterShakerModuleV1,
                    location: DeckSlotLocation {
                        slot_name: DeckSlotName::Slot6,
                    },
                    module_id: Some("hs".into()),
                }),
                CommandResult::LoadModule(LoadModuleResult {
                    module_id: "hs".into(),
                    model: ModuleModel::HeaterShakerModuleV1,
                    serial_number: None,
                    definition: heater_shaker(),
                }),
            );
            let labware = LabwareState::new(DeckDefinition::standard(DeckType::Ot2Standard), vec![])
                .handle_action(&load_labware("plate-3", LabwareLocation::slot(DeckSlotName::Slot3)))
                .and_then(|state| state.handle_action(&load_labware("plate-hs", LabwareLocation::module("hs"))))
                .unwrap();
            let modules = ModuleState::default().handle_action(&module_load).unwrap();
            Self {
                labware,
                modules,
                pipettes: PipetteState::default(),
            }
        }

        fn view(&self) -> GeometryView<'_> {
            GeometryView::new(
                LabwareView::new(&self.labware),
                ModuleView::new(&self.modules),
                PipetteView::new(&self.pipettes),
                DeckType::Ot2Standard,
            )
        }
    }

    #[test]
    fn test_well_position_origins() {
        let fixture = Fixture::new();
        let geometry = fixture.view();
        // Slot 3 origin is (265, 0, 0)
        let top = geometry.get_well_position("plate-3", "A1", None).unwrap();
        assert_eq!(top, Point::new(279.0, 74.0, 11.0));

        let bottom = WellLocation {
            origin: WellOrigin::Bottom,
            offset: WellOffset { x: 0.0, y: 0.0, z: 1.0 },
        };
        assert_eq!(
            geometry.get_well_position("plate-3", "A1", Some(&bottom)).unwrap(),
            Point::new(279.0, 74.0, 2.0)
        );

        let center = WellLocation {
            origin: WellOrigin::Center,
            offset: WellOffset::default(),
        };
        assert_eq!(
            geometry.get_well_position("plate-3", "A1", Some(&center)).unwrap().z,
            6.0
        );
    }

    #[test]
    fn test_labware_on_module_uses_module_offset() {
        let fixture = Fixture::new();
        let geometry = fixture.view();
        // Slot 6 origin is (265, 90.5, 0)
        assert_eq!(
            geometry.get_labware_parent_position("plate-hs").unwrap(),
            Point::new(264.875, 91.625, 68.275)
        );
        assert_eq!(geometry.get_ancestor_slot_name("plate-hs").unwrap(), DeckSlotName::Slot6);
    }

    #[test]
    fn test_highest_z_includes_modules() {
        let fixture = Fixture::new();
        let geometry = fixture.view();
        assert_eq!(geometry.get_labware_highest_z("plate-3").unwrap(), 14.0);
        assert_eq!(geometry.get_all_labware_highest_z().unwrap(), 68.275 + 14.0);
    }

    #[test]
    fn test_occupancy_check_passes_location_through() {
        let fixture = Fixture::new();
        let geometry = fixture.view();

        assert!(matches!(
            geometry.ensure_location_not_occupied(LabwareLocation::slot(DeckSlotName::Slot3)),
            Err(EngineError::LocationIsOccupied(_))
        ));
        assert!(matches!(
            geometry.ensure_location_not_occupied(LabwareLocation::slot(DeckSlotName::Slot6)),
            Err(EngineError::LocationIsOccupied(_))
        ));
        let empty = LabwareLocation::slot(DeckSlotName::Slot5);
        assert_eq!(geometry.ensure_location_not_occupied(empty.clone()).unwrap(), empty);
    }

    #[test]
    fn test_labware_center_ignores_calibration() {
        let fixture = Fixture::new();
        let geometry = fixture.view();
        let center = geometry
            .get_labware_center("plate-3", &LabwareLocation::slot(DeckSlotName::Slot5))
            .unwrap();
        assert_eq!(center, Point::new(196.5, 133.5, 7.0));
        assert!(matches!(
            geometry.get_labware_center("plate-3", &LabwareLocation::OffDeck),
            Err(EngineError::LabwareNotOnDeck(_))
        ));
    }
}
