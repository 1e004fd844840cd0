//! Loaded pipettes and where they last were.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::HandlesActions;
use crate::actions::Action;
use crate::commands::{CommandParams, CommandResult, CommandStatus};
use crate::definitions::{pipette_config, PipetteStaticConfig};
use crate::error::{EngineError, EngineResult};
use crate::types::{CurrentWell, Mount, MountType, Point, TipGeometry};

/// A pipette known to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadedPipette {
    pub id: String,
    pub pipette_name: String,
    pub mount: MountType,
}

/// Last commanded deck position of a mount.
#[derive(Debug, Clone, Copy, PartialEq)]
struct CurrentDeckPoint {
    mount: MountType,
    position: Point,
}

/// Pipette state container.
#[derive(Debug, Clone, Default)]
pub struct PipetteState {
    pipettes_by_id: HashMap<String, LoadedPipette>,
    pipette_order: Vec<String>,
    attached_tip_by_id: HashMap<String, TipGeometry>,
    movement_speed_by_id: HashMap<String, f64>,
    current_well: Option<CurrentWell>,
    current_deck_point: Option<CurrentDeckPoint>,
}

impl PipetteState {
    fn set_location(&mut self, pipette_id: &str, well: Option<CurrentWell>, position: Point) {
        self.current_well = well;
        if let Some(pipette) = self.pipettes_by_id.get(pipette_id) {
            self.current_deck_point = Some(CurrentDeckPoint {
                mount: pipette.mount,
                position,
            });
        }
    }

    fn clear_location(&mut self) {
        self.current_well = None;
        self.current_deck_point = None;
    }

    fn handle_succeeded(&self, params: &CommandParams, result: &CommandResult) -> Option<Self> {
        let mut next = self.clone();
        match (params, result) {
            (CommandParams::LoadPipette(params), CommandResult::LoadPipette(result)) => {
                if !next.pipettes_by_id.contains_key(&result.pipette_id) {
                    next.pipette_order.push(result.pipette_id.clone());
                }
                next.pipettes_by_id.insert(
                    result.pipette_id.clone(),
                    LoadedPipette {
                        id: result.pipette_id.clone(),
                        pipette_name: params.pipette_name.clone(),
                        mount: params.mount,
                    },
                );
                next.attached_tip_by_id.remove(&result.pipette_id);
            }
            (CommandParams::MoveToWell(params), CommandResult::MoveToWell(result)) => {
                let well = CurrentWell {
                    pipette_id: params.pipette_id.clone(),
                    labware_id: params.labware_id.clone(),
                    well_name: params.well_name.clone(),
                };
                next.set_location(&params.pipette_id, Some(well), result.position);
            }
            (CommandParams::PickUpTip(params), CommandResult::PickUpTip(result)) => {
                let well = CurrentWell {
                    pipette_id: params.pipette_id.clone(),
                    labware_id: params.labware_id.clone(),
                    well_name: params.well_name.clone(),
                };
                next.set_location(&params.pipette_id, Some(well), result.position);
                next.attached_tip_by_id.insert(
                    params.pipette_id.clone(),
                    TipGeometry {
                        length: result.tip_length,
                        diameter: result.tip_diameter,
                        volume: result.tip_volume,
                    },
                );
            }
            (CommandParams::DropTip(params), CommandResult::DropTip(result)) => {
                let well = CurrentWell {
                    pipette_id: params.pipette_id.clone(),
                    labware_id: params.labware_id.clone(),
                    well_name: params.well_name.clone(),
                };
                next.set_location(&params.pipette_id, Some(well), result.position);
                next.attached_tip_by_id.remove(&params.pipette_id);
            }
            (CommandParams::MoveRelative(params), CommandResult::MoveRelative(result)) => {
                // Still over the same well, just somewhere else relative to it
                let well = next.current_well.clone();
                next.set_location(&params.pipette_id, well, result.position);
            }
            (CommandParams::Home(_), _) => next.clear_location(),
            (CommandParams::MoveLabware(params), _) => {
                // The moved labware is no longer where the pipette was
                let was_over_moved_labware = next
                    .current_well
                    .as_ref()
                    .map(|well| well.labware_id == params.labware_id)
                    .unwrap_or(false);
                if was_over_moved_labware || params.strategy.uses_gripper() {
                    next.clear_location();
                } else {
                    return None;
                }
            }
            (CommandParams::ThermocyclerOpenLid(_), _) | (CommandParams::ThermocyclerCloseLid(_), _) => {
                // Lid motion homes the gantry out of the way
                next.clear_location();
            }
            _ => return None,
        }
        Some(next)
    }
}

impl HandlesActions for PipetteState {
    fn handle_action(&self, action: &Action) -> Option<Self> {
        match action {
            Action::UpdateCommand { command } if command.status == CommandStatus::Succeeded => {
                let result = command.result.as_ref()?;
                self.handle_succeeded(&command.params, result)
            }
            Action::SetPipetteMovementSpeed { pipette_id, speed } => {
                let mut next = self.clone();
                match speed {
                    Some(speed) => next.movement_speed_by_id.insert(pipette_id.clone(), *speed),
                    None => next.movement_speed_by_id.remove(pipette_id),
                };
                Some(next)
            }
            _ => None,
        }
    }
}

/// Read-only pipette state view.
#[derive(Debug, Clone, Copy)]
pub struct PipetteView<'a> {
    state: &'a PipetteState,
}

impl<'a> PipetteView<'a> {
    pub(crate) fn new(state: &'a PipetteState) -> Self {
        Self { state }
    }

    /// Get a loaded pipette by id.
    pub fn get(&self, pipette_id: &str) -> EngineResult<&'a LoadedPipette> {
        self.state
            .pipettes_by_id
            .get(pipette_id)
            .ok_or_else(|| EngineError::PipetteNotLoaded(format!("Pipette {pipette_id} not found.")))
    }

    pub fn get_all(&self) -> Vec<&'a LoadedPipette> {
        self.state
            .pipette_order
            .iter()
            .filter_map(|id| self.state.pipettes_by_id.get(id))
            .collect()
    }

    /// Pipette loaded on a mount, if any.
    pub fn get_by_mount(&self, mount: MountType) -> Option<&'a LoadedPipette> {
        self.get_all().into_iter().find(|pipette| pipette.mount == mount)
    }

    pub fn get_mount(&self, pipette_id: &str) -> EngineResult<MountType> {
        Ok(self.get(pipette_id)?.mount)
    }

    /// Hardware mount a pipette sits on.
    pub fn get_hardware_mount(&self, pipette_id: &str) -> EngineResult<Mount> {
        Ok(Mount::from(self.get_mount(pipette_id)?))
    }

    /// Static configuration for a loaded pipette's model.
    pub fn get_config(&self, pipette_id: &str) -> EngineResult<&'static PipetteStaticConfig> {
        let pipette = self.get(pipette_id)?;
        pipette_config(&pipette.pipette_name).ok_or_else(|| {
            EngineError::PipetteNotLoaded(format!("No configuration for pipette {}", pipette.pipette_name))
        })
    }

    /// The well the most recent pipette move ended in.
    pub fn get_current_well(&self) -> Option<&'a CurrentWell> {
        self.state.current_well.as_ref()
    }

    /// Last known deck position of a pipette, if it was the last to move.
    pub fn get_deck_point(&self, pipette_id: &str) -> Option<Point> {
        let mount = self.get_mount(pipette_id).ok()?;
        self.state
            .current_deck_point
            .filter(|point| point.mount == mount)
            .map(|point| point.position)
    }

    pub fn get_attached_tip(&self, pipette_id: &str) -> Option<TipGeometry> {
        self.state.attached_tip_by_id.get(pipette_id).copied()
    }

    /// Whether the pipette has a tip on.
    pub fn get_has_tip(&self, pipette_id: &str) -> bool {
        self.state.attached_tip_by_id.contains_key(pipette_id)
    }

    /// Movement speed override, if one was set.
    pub fn get_movement_speed(&self, pipette_id: &str, requested: Option<f64>) -> Option<f64> {
        requested.or_else(|| self.state.movement_speed_by_id.get(pipette_id).copied())
    }

    /// Nominal overlap between a tip from `labware_uri` and this pipette's nozzle.
    pub fn get_nominal_tip_overlap(&self, pipette_id: &str, _labware_uri: &str) -> EngineResult<f64> {
        Ok(self.get_config(pipette_id)?.default_tip_overlap)
    }

    /// Fraction of a tip's length to lower into a tip rack when returning it.
    pub fn get_return_tip_scale(&self, pipette_id: &str) -> EngineResult<f64> {
        Ok(self.get_config(pipette_id)?.return_tip_scale)
    }

    pub fn validate_action_allowed(&self, action: &Action) -> EngineResult<()> {
        if let Action::SetPipetteMovementSpeed { pipette_id, .. } = action {
            self.get(pipette_id)?;
        }
        Ok(())
    }
}
