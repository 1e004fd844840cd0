//! Clean/used tracking for tip racks.

use std::collections::HashMap;

use super::HandlesActions;
use crate::actions::Action;
use crate::commands::{CommandParams, CommandResult, CommandStatus};

/// Whether a tip-rack well still holds an unused tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TipRackWellState {
    Clean,
    Used,
}

#[derive(Debug, Clone, Default)]
struct TipRack {
    /// Wells in pick-up order
    ordering: Vec<String>,
    wells: HashMap<String, TipRackWellState>,
}

/// Tip state container.
#[derive(Debug, Clone, Default)]
pub struct TipState {
    racks_by_labware_id: HashMap<String, TipRack>,
}

impl HandlesActions for TipState {
    fn handle_action(&self, action: &Action) -> Option<Self> {
        match action {
            Action::UpdateCommand { command } if command.status == CommandStatus::Succeeded => {
                match (&command.params, command.result.as_ref()?) {
                    (CommandParams::LoadLabware(_), CommandResult::LoadLabware(result))
                        if result.definition.parameters.is_tiprack =>
                    {
                        let ordering: Vec<String> = result.definition.ordered_wells().cloned().collect();
                        let wells = ordering
                            .iter()
                            .map(|well| (well.clone(), TipRackWellState::Clean))
                            .collect();
                        let mut next = self.clone();
                        next.racks_by_labware_id
                            .insert(result.labware_id.clone(), TipRack { ordering, wells });
                        Some(next)
                    }
                    (CommandParams::PickUpTip(params), _) => {
                        let mut next = self.clone();
                        let well = next
                            .racks_by_labware_id
                            .get_mut(&params.labware_id)?
                            .wells
                            .get_mut(&params.well_name)?;
                        *well = TipRackWellState::Used;
                        Some(next)
                    }
                    _ => None,
                }
            }
            Action::ResetTips { labware_id } => {
                let mut next = self.clone();
                let rack = next.racks_by_labware_id.get_mut(labware_id)?;
                for state in rack.wells.values_mut() {
                    *state = TipRackWellState::Clean;
                }
                Some(next)
            }
            _ => None,
        }
    }
}

/// Read-only tip state view.
#[derive(Debug, Clone, Copy)]
pub struct TipView<'a> {
    state: &'a TipState,
}

impl<'a> TipView<'a> {
    pub(crate) fn new(state: &'a TipState) -> Self {
        Self { state }
    }

    /// First clean well at or after `starting_tip`, in rack order.
    pub fn get_next_tip(&self, labware_id: &str, starting_tip: Option<&str>) -> Option<&'a str> {
        let rack = self.state.racks_by_labware_id.get(labware_id)?;
        let start = starting_tip
            .and_then(|name| rack.ordering.iter().position(|well| well == name))
            .unwrap_or(0);

        rack.ordering[start..]
            .iter()
            .find(|well| rack.wells.get(*well) == Some(&TipRackWellState::Clean))
            .map(String::as_str)
    }

    pub fn get_tip_state(&self, labware_id: &str, well_name: &str) -> Option<TipRackWellState> {
        self.state
            .racks_by_labware_id
            .get(labware_id)?
            .wells
            .get(well_name)
            .copied()
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{
        Command, CommandIntent, LoadLabwareParams, LoadLabwareResult, PickUpTipParams, PickUpTipResult,
    };
    use crate::definitions::{LabwareDefinition, LabwareDimensions, LabwareMetadata, LabwareParameters};
    use crate::types::{DeckSlotName, LabwareLocation, Point};
    use chrono::Utc;
    use std::collections::BTreeMap;

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

    fn tiprack() -> LabwareDefinition {
        LabwareDefinition {
            namespace: "opentrons".into(),
            version: 1,
            parameters: LabwareParameters {
                load_name: "tiprack".into(),
                format: "96Standard".into(),
                is_tiprack: true,
                tip_length: Some(59.3),
                tip_overlap: None,
                quirks: vec![],
                is_magnetic_module_compatible: false,
                magnetic_module_engage_height: None,
            },
            metadata: LabwareMetadata::default(),
            dimensions: LabwareDimensions {
                x_dimension: 127.76,
                y_dimension: 85.48,
                z_dimension: 64.49,
            },
            corner_offset_from_slot: Point::default(),
            wells: BTreeMap::new(),
            ordering: vec![vec!["A1".into(), "B1".into()], vec!["A2".into(), "B2".into()]],
        }
    }

    fn loaded() -> TipState {
        TipState::default()
            .handle_action(&succeeded(
                CommandParams::LoadLabware(LoadLabwareParams {
                    location: LabwareLocation::slot(DeckSlotName::Slot1),
                    load_name: "tiprack".into(),
                    namespace: "opentrons".into(),
                    version: 1,
                    labware_id: Some("tips".into()),
                    display_name: None,
                }),
                CommandResult::LoadLabware(LoadLabwareResult {
                    labware_id: "tips".into(),
                    definition: tiprack(),
                    offset_id: None,
                }),
            ))
            .unwrap()
    }

    #[test]
    fn test_pick_up_marks_used_and_reset_cleans() {
        let state = loaded()
            .handle_action(&succeeded(
                CommandParams::PickUpTip(PickUpTipParams {
                    pipette_id: "pipette-1".into(),
                    labware_id: "tips".into(),
                    well_name: "A1".into(),
                    well_location: Default::default(),
                }),
                CommandResult::PickUpTip(PickUpTipResult {
                    tip_volume: 300.0,
                    tip_length: 51.1,
                    tip_diameter: 5.2,
                    position: Point::default(),
                }),
            ))
            .unwrap();
        let view = TipView::new(&state);
        assert_eq!(view.get_tip_state("tips", "A1"), Some(TipRackWellState::Used));
        assert_eq!(view.get_next_tip("tips", None), Some("B1"));
        assert_eq!(view.get_next_tip("tips", Some("A2")), Some("A2"));

        let state = state
            .handle_action(&Action::ResetTips {
                labware_id: "tips".into(),
            })
            .unwrap();
        assert_eq!(TipView::new(&state).get_next_tip("tips", None), Some("A1"));
    }
}
