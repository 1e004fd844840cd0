//! MoveLabware with the gripper against the simulated hardware.

mod common;

use common::*;

use protocol_engine::commands::{CommandParams, CommandStatus, ModuleIdParams, MoveLabwareParams};
use protocol_engine::config::{EngineConfig, RobotType};
use protocol_engine::hardware::simulator::{GripperJawState, HOME_POSITION};
use protocol_engine::hardware::{HardwareCall, ModuleAction, SimulatedHardware};
use protocol_engine::types::{
    CriticalPoint, DeckSlotName, LabwareLocation, LabwareMovementOffsetData, LabwareMovementStrategy,
    LabwareOffsetVector, ModuleModel, Mount, MotorAxis, Point,
};
use protocol_engine::ProtocolEngine;

fn gripper_move(mount_position: Point) -> HardwareCall {
    HardwareCall::MoveTo {
        mount: Mount::Extension,
        position: mount_position,
        critical_point: Some(CriticalPoint::GripperJawCenter),
    }
}

/// Homed OT-3 engine with one plate in slot 1 and the call log cleared.
async fn engine_with_plate(hardware: &SimulatedHardware) -> ProtocolEngine {
    let engine = start_engine(hardware_config(RobotType::Ot3), hardware);
    engine.add_labware_definition(plate_definition("plate")).unwrap();
    engine.play().unwrap();
    run_ok(&engine, home_all()).await;
    run_ok(
        &engine,
        load_labware("plate", LabwareLocation::slot(DeckSlotName::Slot1), "plate-1"),
    )
    .await;
    hardware.clear_calls();
    engine
}

#[tokio::test]
async fn test_gripper_move_call_sequence() {
    let hardware = SimulatedHardware::new().with_gripper();
    let engine = engine_with_plate(&hardware).await;

    run_ok(
        &engine,
        move_labware(
            "plate-1",
            LabwareLocation::slot(DeckSlotName::Slot3),
            LabwareMovementStrategy::UsingGripper,
        ),
    )
    .await;

    // Slot 1 center is (64, 43), slot 3 center is (329, 43); the plate is 14 mm tall
    let pick_up = Point::new(64.0, 43.0, 7.0);
    let drop = Point::new(329.0, 43.0, 7.0);
    let travel_z = HOME_POSITION.z;
    assert_eq!(
        hardware.calls(),
        vec![
            HardwareCall::Home(Some(vec![MotorAxis::LeftZ, MotorAxis::RightZ, MotorAxis::ExtensionZ])),
            gripper_move(HOME_POSITION),
            gripper_move(pick_up.with_z(travel_z)),
            HardwareCall::Ungrip,
            gripper_move(pick_up),
            HardwareCall::Grip(15.0),
            HardwareCall::Home(Some(vec![MotorAxis::ExtensionZ])),
            gripper_move(pick_up.with_z(travel_z)),
            gripper_move(drop.with_z(travel_z)),
            gripper_move(drop),
            HardwareCall::Ungrip,
            HardwareCall::Home(Some(vec![MotorAxis::ExtensionZ])),
            HardwareCall::Grip(10.0),
        ]
    );
    assert_eq!(hardware.jaw_state(), GripperJawState::Gripping(10.0));

    let view = engine.state_view();
    assert_eq!(
        view.labware().get_location("plate-1").unwrap(),
        &LabwareLocation::slot(DeckSlotName::Slot3)
    );
}

#[tokio::test]
async fn test_gripper_move_applies_offsets() {
    let hardware = SimulatedHardware::new().with_gripper();
    let engine = engine_with_plate(&hardware).await;

    let command = CommandParams::MoveLabware(MoveLabwareParams {
        labware_id: "plate-1".to_string(),
        new_location: LabwareLocation::slot(DeckSlotName::Slot3),
        strategy: LabwareMovementStrategy::UsingGripper,
        offset_data: LabwareMovementOffsetData {
            pick_up_offset: Some(LabwareOffsetVector::new(0.0, 0.0, 1.5)),
            drop_offset: Some(LabwareOffsetVector::new(1.0, -1.0, 0.5)),
            use_current_offset: true,
        },
    });
    run_ok(&engine, command).await;

    let calls = hardware.calls();
    assert_eq!(calls[4], gripper_move(Point::new(64.0, 43.0, 8.5)));
    assert_eq!(calls[9], gripper_move(Point::new(330.0, 42.0, 7.5)));
}

#[tokio::test]
async fn test_gripper_move_without_gripper_fails() {
    let hardware = SimulatedHardware::new();
    let engine = engine_with_plate(&hardware).await;

    let command = run(
        &engine,
        move_labware(
            "plate-1",
            LabwareLocation::slot(DeckSlotName::Slot3),
            LabwareMovementStrategy::UsingGripper,
        ),
    )
    .await;

    assert_eq!(command.status, CommandStatus::Failed);
    assert_eq!(command.error.unwrap().error_type, "GripperNotAttachedError");
    assert!(hardware.calls().is_empty());
    assert_eq!(
        engine.state_view().labware().get_location("plate-1").unwrap(),
        &LabwareLocation::slot(DeckSlotName::Slot1)
    );
}

#[tokio::test]
async fn test_virtual_gripper_only_updates_state() {
    let hardware = SimulatedHardware::new();
    let config = EngineConfig::simulated(RobotType::Ot3);
    let engine = start_engine(config, &hardware);
    engine.add_labware_definition(plate_definition("plate")).unwrap();
    engine.play().unwrap();
    run_ok(
        &engine,
        load_labware("plate", LabwareLocation::slot(DeckSlotName::Slot1), "plate-1"),
    )
    .await;

    run_ok(
        &engine,
        move_labware(
            "plate-1",
            LabwareLocation::slot(DeckSlotName::Slot3),
            LabwareMovementStrategy::UsingGripper,
        ),
    )
    .await;

    assert!(hardware.calls().is_empty());
    assert_eq!(
        engine.state_view().labware().get_location("plate-1").unwrap(),
        &LabwareLocation::slot(DeckSlotName::Slot3)
    );
}

#[tokio::test]
async fn test_gripper_not_supported_on_ot2() {
    let hardware = SimulatedHardware::new().with_gripper();
    let engine = start_engine(EngineConfig::simulated(RobotType::Ot2), &hardware);
    engine.add_labware_definition(plate_definition("plate")).unwrap();
    engine.play().unwrap();
    run_ok(
        &engine,
        load_labware("plate", LabwareLocation::slot(DeckSlotName::Slot1), "plate-1"),
    )
    .await;

    let command = run(
        &engine,
        move_labware(
            "plate-1",
            LabwareLocation::slot(DeckSlotName::Slot3),
            LabwareMovementStrategy::UsingGripper,
        ),
    )
    .await;
    assert_eq!(command.error.unwrap().error_type, "NotSupportedOnRobotTypeError");
}

#[tokio::test]
async fn test_gripper_cannot_move_off_deck() {
    let hardware = SimulatedHardware::new().with_gripper();
    let engine = engine_with_plate(&hardware).await;

    let command = run(
        &engine,
        move_labware("plate-1", LabwareLocation::OffDeck, LabwareMovementStrategy::UsingGripper),
    )
    .await;
    assert_eq!(command.error.unwrap().error_type, "LabwareNotOnDeckError");
}

#[tokio::test]
async fn test_gripper_lifts_plate_out_of_thermocycler() {
    let hardware = SimulatedHardware::new().with_gripper();
    let engine = start_engine(hardware_config(RobotType::Ot3), &hardware);
    engine.add_labware_definition(plate_definition("plate")).unwrap();
    engine.add_module("tc-serial", thermocycler_definition()).unwrap();
    engine.play().unwrap();
    run_ok(&engine, home_all()).await;
    run_ok(
        &engine,
        load_module(ModuleModel::ThermocyclerModuleV2, DeckSlotName::Slot7, "tc-1"),
    )
    .await;
    run_ok(&engine, load_labware("plate", LabwareLocation::module("tc-1"), "plate-1")).await;
    run_ok(
        &engine,
        CommandParams::ThermocyclerOpenLid(ModuleIdParams {
            module_id: "tc-1".to_string(),
        }),
    )
    .await;
    hardware.clear_calls();

    run_ok(
        &engine,
        move_labware(
            "plate-1",
            LabwareLocation::slot(DeckSlotName::Slot3),
            LabwareMovementStrategy::UsingGripper,
        ),
    )
    .await;

    let calls = hardware.calls();
    let position_of = |wanted: &HardwareCall| calls.iter().position(|call| call == wanted).unwrap();
    let raise = position_of(&HardwareCall::Module {
        serial_number: "tc-serial".to_string(),
        action: ModuleAction::RaisePlate,
    });
    let lower = position_of(&HardwareCall::Module {
        serial_number: "tc-serial".to_string(),
        action: ModuleAction::ReturnFromRaisePlate,
    });
    let grip = position_of(&HardwareCall::Grip(15.0));
    let first_move = calls
        .iter()
        .position(|call| matches!(call, HardwareCall::MoveTo { .. }))
        .unwrap();

    assert!(raise < first_move);
    assert!(grip < lower);
    assert_eq!(calls[lower + 1], HardwareCall::Home(Some(vec![MotorAxis::ExtensionZ])));
}

#[tokio::test]
async fn test_closed_thermocycler_blocks_move() {
    let hardware = SimulatedHardware::new().with_gripper();
    let engine = start_engine(hardware_config(RobotType::Ot3), &hardware);
    engine.add_labware_definition(plate_definition("plate")).unwrap();
    engine.add_module("tc-serial", thermocycler_definition()).unwrap();
    engine.play().unwrap();
    run_ok(&engine, home_all()).await;
    run_ok(
        &engine,
        load_module(ModuleModel::ThermocyclerModuleV2, DeckSlotName::Slot7, "tc-1"),
    )
    .await;
    run_ok(
        &engine,
        load_labware("plate", LabwareLocation::slot(DeckSlotName::Slot1), "plate-1"),
    )
    .await;
    run_ok(
        &engine,
        CommandParams::ThermocyclerCloseLid(ModuleIdParams {
            module_id: "tc-1".to_string(),
        }),
    )
    .await;
    hardware.clear_calls();

    let command = run(
        &engine,
        move_labware(
            "plate-1",
            LabwareLocation::module("tc-1"),
            LabwareMovementStrategy::UsingGripper,
        ),
    )
    .await;

    let error = command.error.unwrap();
    assert_eq!(error.error_type, "LabwareMovementNotAllowedError");
    assert!(hardware.calls().is_empty());
}

#[tokio::test]
async fn test_heater_shaker_latch_must_be_open() {
    let hardware = SimulatedHardware::new();
    let engine = start_engine(EngineConfig::simulated(RobotType::Ot3), &hardware);
    engine.add_labware_definition(plate_definition("plate")).unwrap();
    engine.add_module("hs-serial", heater_shaker_definition()).unwrap();
    engine.play().unwrap();
    run_ok(
        &engine,
        load_module(ModuleModel::HeaterShakerModuleV1, DeckSlotName::Slot4, "hs-1"),
    )
    .await;
    run_ok(&engine, load_labware("plate", LabwareLocation::module("hs-1"), "plate-1")).await;

    // Latch status starts unknown and is treated as closed
    let command = run(
        &engine,
        move_labware(
            "plate-1",
            LabwareLocation::slot(DeckSlotName::Slot5),
            LabwareMovementStrategy::ManualMoveWithoutPause,
        ),
    )
    .await;
    assert_eq!(command.error.unwrap().error_type, "LabwareMovementNotAllowedError");
}

#[tokio::test]
async fn test_open_heater_shaker_latch_allows_move() {
    let hardware = SimulatedHardware::new();
    let engine = start_engine(EngineConfig::simulated(RobotType::Ot3), &hardware);
    engine.add_labware_definition(plate_definition("plate")).unwrap();
    engine.add_module("hs-serial", heater_shaker_definition()).unwrap();
    engine.play().unwrap();
    run_ok(
        &engine,
        load_module(ModuleModel::HeaterShakerModuleV1, DeckSlotName::Slot4, "hs-1"),
    )
    .await;
    run_ok(&engine, load_labware("plate", LabwareLocation::module("hs-1"), "plate-1")).await;
    run_ok(
        &engine,
        CommandParams::HeaterShakerOpenLabwareLatch(ModuleIdParams {
            module_id: "hs-1".to_string(),
        }),
    )
    .await;

    run_ok(
        &engine,
        move_labware(
            "plate-1",
            LabwareLocation::slot(DeckSlotName::Slot5),
            LabwareMovementStrategy::UsingGripper,
        ),
    )
    .await;
    assert_eq!(
        engine.state_view().labware().get_location("plate-1").unwrap(),
        &LabwareLocation::slot(DeckSlotName::Slot5)
    );
    assert!(hardware.calls().is_empty());
}
