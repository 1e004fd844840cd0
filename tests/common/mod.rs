//! Common test utilities for protocol engine integration tests
//!
//! This module provides reusable test helpers for:
//! - Labware and module definitions, built from catalog-shaped JSON
//! - Engine setup against the simulated hardware
//! - Recording every action the engine accepts

#![allow(dead_code)] // Not every test file uses every helper

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde_json::json;

use protocol_engine::actions::Action;
use protocol_engine::commands::{
    Command, CommandCreate, CommandParams, CommandStatus, HomeParams, LoadLabwareParams, LoadModuleParams,
    LoadPipetteParams, MoveLabwareParams,
};
use protocol_engine::config::{DeckType, EngineConfig, RobotType};
use protocol_engine::definitions::{LabwareDefinition, ModuleDefinition};
use protocol_engine::execution::ActionHandler;
use protocol_engine::hardware::SimulatedHardware;
use protocol_engine::resources::ModelUtils;
use protocol_engine::state::DeckFixedLabware;
use protocol_engine::types::{
    DeckSlotLocation, DeckSlotName, LabwareLocation, LabwareMovementOffsetData, LabwareMovementStrategy,
    ModuleModel, MountType,
};
use protocol_engine::{ProtocolEngine, ProtocolEngineBuilder};

/// Id of the fixed trash on every test deck.
pub const FIXED_TRASH_ID: &str = "fixedTrash";

/// Upper bound on any single wait in these tests.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Await `future`, panicking if it takes longer than [`TEST_TIMEOUT`].
pub async fn within_timeout<F: Future>(future: F) -> F::Output {
    tokio::time::timeout(TEST_TIMEOUT, future)
        .await
        .expect("timed out waiting for the engine")
}

/// A 96-well-style plate with two wells, 14 mm tall.
pub fn plate_definition(load_name: &str) -> LabwareDefinition {
    serde_json::from_value(json!({
        "namespace": "opentrons",
        "version": 1,
        "parameters": {
            "loadName": load_name,
            "format": "96Standard",
            "isTiprack": false,
            "isMagneticModuleCompatible": false
        },
        "metadata": { "displayName": load_name },
        "dimensions": { "xDimension": 127.76, "yDimension": 85.48, "zDimension": 14.0 },
        "cornerOffsetFromSlot": { "x": 0.0, "y": 0.0, "z": 0.0 },
        "wells": {
            "A1": { "depth": 10.0, "x": 14.0, "y": 74.0, "z": 4.0, "shape": "circular",
                    "diameter": 6.0, "totalLiquidVolume": 200.0 },
            "A2": { "depth": 10.0, "x": 23.0, "y": 74.0, "z": 4.0, "shape": "circular",
                    "diameter": 6.0, "totalLiquidVolume": 200.0 }
        },
        "ordering": [["A1"], ["A2"]]
    }))
    .expect("plate definition")
}

/// A plate the magnetic module can engage, with the given default height.
pub fn magnetic_plate_definition(load_name: &str, engage_height: f64) -> LabwareDefinition {
    let mut definition = plate_definition(load_name);
    definition.parameters.is_magnetic_module_compatible = true;
    definition.parameters.magnetic_module_engage_height = Some(engage_height);
    definition
}

/// A two-tip rack with 59.3 mm tips.
pub fn tiprack_definition() -> LabwareDefinition {
    serde_json::from_value(json!({
        "namespace": "opentrons",
        "version": 1,
        "parameters": {
            "loadName": "opentrons_96_tiprack_300ul",
            "format": "96Standard",
            "isTiprack": true,
            "tipLength": 59.3,
            "tipOverlap": 7.47
        },
        "metadata": { "displayName": "Tip Rack" },
        "dimensions": { "xDimension": 127.76, "yDimension": 85.48, "zDimension": 64.0 },
        "cornerOffsetFromSlot": { "x": 0.0, "y": 0.0, "z": 0.0 },
        "wells": {
            "A1": { "depth": 59.0, "x": 14.0, "y": 74.0, "z": 5.0, "shape": "circular",
                    "diameter": 5.23, "totalLiquidVolume": 300.0 },
            "B1": { "depth": 59.0, "x": 14.0, "y": 65.0, "z": 5.0, "shape": "circular",
                    "diameter": 5.23, "totalLiquidVolume": 300.0 }
        },
        "ordering": [["A1", "B1"]]
    }))
    .expect("tip rack definition")
}

/// The deck's fixed trash.
pub fn trash_definition() -> LabwareDefinition {
    serde_json::from_value(json!({
        "namespace": "opentrons",
        "version": 1,
        "parameters": {
            "loadName": "opentrons_1_trash_1100ml_fixed",
            "format": "trash",
            "isTiprack": false,
            "quirks": ["centerMultichannelOnWells", "fixedTrash"]
        },
        "metadata": { "displayName": "Opentrons Fixed Trash" },
        "dimensions": { "xDimension": 172.86, "yDimension": 165.86, "zDimension": 82.0 },
        "cornerOffsetFromSlot": { "x": 0.0, "y": 0.0, "z": 0.0 },
        "wells": {
            "A1": { "depth": 0.0, "x": 82.84, "y": 80.0, "z": 82.0, "shape": "rectangular",
                    "xDimension": 107.11, "yDimension": 165.67, "totalLiquidVolume": 1100000.0 }
        },
        "ordering": [["A1"]]
    }))
    .expect("trash definition")
}

pub fn fixed_trash() -> DeckFixedLabware {
    DeckFixedLabware {
        labware_id: FIXED_TRASH_ID.to_string(),
        location: LabwareLocation::slot(DeckSlotName::FIXED_TRASH),
        definition: trash_definition(),
    }
}

fn module_definition(model: &str, module_type: &str, offset: [f64; 3], heights: [f64; 2]) -> ModuleDefinition {
    serde_json::from_value(json!({
        "model": model,
        "moduleType": module_type,
        "dimensions": {
            "bareOverallHeight": heights[0],
            "overLabwareHeight": heights[1]
        },
        "labwareOffset": { "x": offset[0], "y": offset[1], "z": offset[2] }
    }))
    .expect("module definition")
}

pub fn thermocycler_definition() -> ModuleDefinition {
    module_definition(
        "thermocyclerModuleV2",
        "thermocyclerModuleType",
        [0.0, 68.06, 98.26],
        [108.96, 0.0],
    )
}

pub fn heater_shaker_definition() -> ModuleDefinition {
    module_definition(
        "heaterShakerModuleV1",
        "heaterShakerModuleType",
        [-0.125, 1.125, 68.275],
        [82.0, 0.0],
    )
}

pub fn magnetic_module_definition() -> ModuleDefinition {
    module_definition(
        "magneticModuleV2",
        "magneticModuleType",
        [-1.175, -0.125, 82.25],
        [110.152, 4.052],
    )
}

/// Configuration that drives the simulated hardware for everything.
pub fn hardware_config(robot_type: RobotType) -> EngineConfig {
    let deck_type = match robot_type {
        RobotType::Ot2 => DeckType::Ot2Standard,
        RobotType::Ot3 => DeckType::Ot3Standard,
    };
    EngineConfig {
        robot_type,
        deck_type,
        use_virtual_pipettes: false,
        use_virtual_gripper: false,
        use_virtual_modules: false,
        ignore_pause: false,
        block_on_door_open: false,
    }
}

/// Records every action the engine accepts.
#[derive(Default)]
pub struct Recorder {
    actions: Mutex<Vec<Action>>,
}

impl Recorder {
    pub fn actions(&self) -> Vec<Action> {
        self.actions.lock().clone()
    }

    /// Every status a command was recorded with, in order.
    pub fn statuses_of(&self, command_id: &str) -> Vec<CommandStatus> {
        self.actions
            .lock()
            .iter()
            .filter_map(|action| match action {
                Action::QueueCommand { command_id: id, .. } if id == command_id => Some(CommandStatus::Queued),
                Action::UpdateCommand { command } if command.id == command_id => Some(command.status),
                Action::FailCommand { command_id: id, .. } if id == command_id => Some(CommandStatus::Failed),
                _ => None,
            })
            .collect()
    }
}

impl ActionHandler for Recorder {
    fn handle_action(&self, action: &Action) {
        self.actions.lock().push(action.clone());
    }
}

/// Builder for a test engine with deterministic ids and the fixed trash.
pub fn engine_builder(config: EngineConfig, hardware: &SimulatedHardware) -> ProtocolEngineBuilder {
    ProtocolEngineBuilder::new(config, Arc::new(hardware.clone()))
        .model_utils(ModelUtils::sequential("id"))
        .fixed_labware(fixed_trash())
}

/// Start a test engine. Must be called inside a tokio runtime.
pub fn start_engine(config: EngineConfig, hardware: &SimulatedHardware) -> ProtocolEngine {
    engine_builder(config, hardware).build().expect("engine should start")
}

/// Start a test engine that records every accepted action.
pub fn start_recorded_engine(config: EngineConfig, hardware: &SimulatedHardware) -> (ProtocolEngine, Arc<Recorder>) {
    let recorder = Arc::new(Recorder::default());
    let engine = engine_builder(config, hardware)
        .action_handler(recorder.clone())
        .build()
        .expect("engine should start");
    (engine, recorder)
}

/// Queue a protocol command and wait for it to finish.
pub async fn run(engine: &ProtocolEngine, params: CommandParams) -> Command {
    within_timeout(engine.add_and_execute_command(CommandCreate::protocol(params)))
        .await
        .expect("command should reach a final state")
}

/// Queue a protocol command that must succeed.
pub async fn run_ok(engine: &ProtocolEngine, params: CommandParams) -> Command {
    let command = run(engine, params).await;
    assert_eq!(
        command.status,
        CommandStatus::Succeeded,
        "{} failed: {:?}",
        command.command_type(),
        command.error
    );
    command
}

pub fn home_all() -> CommandParams {
    CommandParams::Home(HomeParams { axes: None })
}

pub fn load_labware(load_name: &str, location: LabwareLocation, labware_id: &str) -> CommandParams {
    CommandParams::LoadLabware(LoadLabwareParams {
        location,
        load_name: load_name.to_string(),
        namespace: "opentrons".to_string(),
        version: 1,
        labware_id: Some(labware_id.to_string()),
        display_name: None,
    })
}

pub fn load_module(model: ModuleModel, slot_name: DeckSlotName, module_id: &str) -> CommandParams {
    CommandParams::LoadModule(LoadModuleParams {
        model,
        location: DeckSlotLocation { slot_name },
        module_id: Some(module_id.to_string()),
    })
}

pub fn load_pipette(pipette_name: &str, mount: MountType, pipette_id: &str) -> CommandParams {
    CommandParams::LoadPipette(LoadPipetteParams {
        pipette_name: pipette_name.to_string(),
        mount,
        pipette_id: Some(pipette_id.to_string()),
    })
}

pub fn move_labware(
    labware_id: &str,
    new_location: LabwareLocation,
    strategy: LabwareMovementStrategy,
) -> CommandParams {
    CommandParams::MoveLabware(MoveLabwareParams {
        labware_id: labware_id.to_string(),
        new_location,
        strategy,
        offset_data: LabwareMovementOffsetData::default(),
    })
}
