//! The protocol engine facade.
//!
//! `ProtocolEngine` owns one [`StateStore`], one queue worker and the hardware
//! handlers. Every public call is a thin wrapper that dispatches an action or
//! waits on state, so lifecycle calls and the running queue are serialized
//! through the same `dispatch`.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use protocol_engine::config::{EngineConfig, RobotType};
//! use protocol_engine::hardware::SimulatedHardware;
//! use protocol_engine::engine::ProtocolEngineBuilder;
//!
//! # async fn run() -> protocol_engine::error::EngineResult<()> {
//! let engine = ProtocolEngineBuilder::new(
//!     EngineConfig::simulated(RobotType::Ot3),
//!     Arc::new(SimulatedHardware::new()),
//! )
//! .build()?;
//! engine.play()?;
//! engine.finish(None, true, true).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use tracing::{error, info, warn};

use crate::actions::{Action, PauseSource};
use crate::commands::{Command, CommandCreate};
use crate::config::EngineConfig;
use crate::definitions::{DeckDefinition, LabwareDefinition, ModuleDefinition};
use crate::error::{EngineError, EngineResult, ErrorOccurrence};
use crate::execution::{
    create_gantry_mover, create_tip_handler, ActionDispatcher, ActionHandler, ActionLogger, CommandExecutor,
    EquipmentHandler, HardwareStopper, LabwareMovementHandler, MovementHandler, QueueWorker, RunControlHandler,
    ThermocyclerPlateLifter,
};
use crate::hardware::HardwareControlApi;
use crate::resources::ModelUtils;
use crate::state::{DeckFixedLabware, State, StateStore, StateView};
use crate::types::{DoorState, LabwareOffset, LabwareOffsetCreate, Liquid};

/// Builder for [`ProtocolEngine`].
pub struct ProtocolEngineBuilder {
    config: EngineConfig,
    hardware: Arc<dyn HardwareControlApi>,
    deck_definition: Option<DeckDefinition>,
    fixed_labware: Vec<DeckFixedLabware>,
    model_utils: Option<ModelUtils>,
    action_handlers: Vec<Arc<dyn ActionHandler>>,
}

impl ProtocolEngineBuilder {
    pub fn new(config: EngineConfig, hardware: Arc<dyn HardwareControlApi>) -> Self {
        Self {
            config,
            hardware,
            deck_definition: None,
            fixed_labware: Vec::new(),
            model_utils: None,
            action_handlers: Vec::new(),
        }
    }

    /// Use this deck instead of the standard grid for the configured deck type.
    pub fn deck_definition(mut self, deck_definition: DeckDefinition) -> Self {
        self.deck_definition = Some(deck_definition);
        self
    }

    /// Labware that is on the deck before any command runs, such as the trash.
    pub fn fixed_labware(mut self, fixed: DeckFixedLabware) -> Self {
        self.fixed_labware.push(fixed);
        self
    }

    /// Id and timestamp source.
    pub fn model_utils(mut self, model_utils: ModelUtils) -> Self {
        self.model_utils = Some(model_utils);
        self
    }

    /// Observe every accepted action.
    pub fn action_handler(mut self, handler: Arc<dyn ActionHandler>) -> Self {
        self.action_handlers.push(handler);
        self
    }

    /// Validate the configuration and start the engine.
    ///
    /// Spawns the queue worker, so it must be called inside a tokio runtime.
    pub fn build(self) -> EngineResult<ProtocolEngine> {
        self.config.validate()?;

        let deck_definition = self
            .deck_definition
            .unwrap_or_else(|| DeckDefinition::standard(self.config.deck_type));
        let config = self.config;
        let state = Arc::new(StateStore::new(State::new(
            config.clone(),
            deck_definition,
            self.fixed_labware,
        )));

        let dispatcher = Arc::new(ActionDispatcher::new(Arc::clone(&state)));
        dispatcher.add_handler(Arc::new(ActionLogger));
        for handler in self.action_handlers {
            dispatcher.add_handler(handler);
        }

        let model_utils = Arc::new(self.model_utils.unwrap_or_default());
        let hardware = self.hardware;
        let gantry = create_gantry_mover(Arc::clone(&hardware), Arc::clone(&state), config.use_virtual_pipettes);
        let tip_handler = create_tip_handler(Arc::clone(&hardware), Arc::clone(&state), config.use_virtual_pipettes);
        let equipment = Arc::new(EquipmentHandler::new(
            Arc::clone(&hardware),
            Arc::clone(&state),
            Arc::clone(&model_utils),
        ));
        let labware_movement = LabwareMovementHandler::new(
            Arc::clone(&hardware),
            Arc::clone(&state),
            ThermocyclerPlateLifter::new(Arc::clone(&state), Arc::clone(&equipment)),
        );
        let executor = Arc::new(CommandExecutor::new(
            Arc::clone(&dispatcher),
            Arc::clone(&model_utils),
            equipment,
            MovementHandler::new(Arc::clone(&state), Arc::clone(&gantry)),
            labware_movement,
            Arc::clone(&tip_handler),
            RunControlHandler::new(Arc::clone(&dispatcher), config.ignore_pause),
        ));
        let hardware_stopper = HardwareStopper::new(hardware, Arc::clone(&state), gantry, tip_handler);
        let worker = QueueWorker::start(Arc::clone(&state), executor);

        info!("Protocol engine started for {:?} ({})", config.robot_type, config.deck_type.as_str());
        Ok(ProtocolEngine {
            dispatcher,
            model_utils,
            hardware_stopper,
            worker,
        })
    }
}

/// Queues and runs protocol commands against one robot.
pub struct ProtocolEngine {
    dispatcher: Arc<ActionDispatcher>,
    model_utils: Arc<ModelUtils>,
    hardware_stopper: HardwareStopper,
    worker: QueueWorker,
}

impl ProtocolEngine {
    /// Snapshot of the current state.
    pub fn state_view(&self) -> StateView {
        self.dispatcher.state().view()
    }

    /// The store, for waiting on or subscribing to state changes.
    pub fn state_handle(&self) -> Arc<StateStore> {
        Arc::clone(self.dispatcher.state())
    }

    /// Queue a command and return it as queued.
    pub fn add_command(&self, request: CommandCreate) -> EngineResult<Command> {
        let command_id = self.model_utils.generate_id();
        self.dispatcher.dispatch(Action::QueueCommand {
            command_id: command_id.clone(),
            created_at: self.model_utils.get_timestamp(),
            request,
        })?;
        Ok(self.state_view().commands().get(&command_id)?.clone())
    }

    /// Queue a command and wait until it succeeds, fails or can no longer run.
    pub async fn add_and_execute_command(&self, request: CommandCreate) -> EngineResult<Command> {
        let command = self.add_command(request)?;
        let view = self
            .dispatcher
            .state()
            .wait_for(|view| view.commands().get_command_is_final(&command.id).unwrap_or(true))
            .await?;
        let command = view.commands().get(&command.id)?.clone();
        Ok(command)
    }

    /// Start or resume the run.
    pub fn play(&self) -> EngineResult<()> {
        self.dispatcher.dispatch(Action::Play {
            requested_at: self.model_utils.get_timestamp(),
        })?;
        info!("Run playing");
        Ok(())
    }

    /// Pause the run after the current command.
    pub fn pause(&self) -> EngineResult<()> {
        self.dispatcher.dispatch(Action::Pause {
            source: PauseSource::Client,
        })?;
        info!("Run paused");
        Ok(())
    }

    /// Stop the run and halt motion.
    ///
    /// Queued commands never run. A command waiting to be resumed fails with
    /// `RunStopped`.
    pub async fn stop(&self) -> EngineResult<()> {
        self.dispatcher.dispatch(Action::Stop)?;
        self.worker.cancel();
        info!("Run stopped, halting hardware");
        self.hardware_stopper.do_halt().await
    }

    /// End the run and return the hardware to rest.
    ///
    /// Waits for the command in flight, then homes and drops tips when
    /// `drop_tips_and_home` is set. With `set_run_status` false the run ends
    /// as stopped regardless of `error`. A cleanup failure is returned after
    /// the run has been marked complete and never replaces `error`.
    pub async fn finish(
        &self,
        error: Option<EngineError>,
        drop_tips_and_home: bool,
        set_run_status: bool,
    ) -> EngineResult<()> {
        let error = error.map(|e| {
            error!("Run finishing with error: {}", e);
            ErrorOccurrence::from_error(self.model_utils.generate_id(), self.model_utils.get_timestamp(), &e)
        });
        self.dispatcher.dispatch(Action::Finish { error, set_run_status })?;

        self.worker.cancel();
        self.worker.join().await;

        let cleanup = self.hardware_stopper.do_stop_and_recover(drop_tips_and_home).await;
        if let Err(e) = &cleanup {
            warn!("Failed to stop hardware cleanly: {}", e);
        }
        self.dispatcher.dispatch(Action::HardwareStopped {
            completed_at: self.model_utils.get_timestamp(),
        })?;
        info!("Run finished with status {:?}", self.state_view().commands().get_status());
        cleanup
    }

    /// Wait until no command is running and none will run.
    pub async fn wait_until_complete(&self) -> EngineResult<()> {
        self.dispatcher
            .state()
            .wait_for(|view| view.commands().get_all_commands_final())
            .await?;
        Ok(())
    }

    /// Record a calibration offset.
    pub fn add_labware_offset(&self, request: LabwareOffsetCreate) -> EngineResult<LabwareOffset> {
        let labware_offset_id = self.model_utils.generate_id();
        self.dispatcher.dispatch(Action::AddLabwareOffset {
            labware_offset_id: labware_offset_id.clone(),
            created_at: self.model_utils.get_timestamp(),
            request,
        })?;
        Ok(self.state_view().labware().get_labware_offset(&labware_offset_id)?.clone())
    }

    /// Register a labware definition and return its URI.
    pub fn add_labware_definition(&self, definition: LabwareDefinition) -> EngineResult<String> {
        let uri = definition.uri();
        self.dispatcher.dispatch(Action::AddLabwareDefinition { definition })?;
        Ok(uri)
    }

    /// Register a module found attached to the robot.
    pub fn add_module(&self, serial_number: impl Into<String>, definition: ModuleDefinition) -> EngineResult<()> {
        self.dispatcher.dispatch(Action::AddModule {
            serial_number: serial_number.into(),
            definition,
        })
    }

    pub fn add_liquid(&self, liquid: Liquid) -> EngineResult<()> {
        self.dispatcher.dispatch(Action::AddLiquid { liquid })
    }

    /// Mark every tip in a tip rack clean.
    pub fn reset_tips(&self, labware_id: &str) -> EngineResult<()> {
        self.dispatcher.dispatch(Action::ResetTips {
            labware_id: labware_id.to_string(),
        })
    }

    /// Override a pipette's default speed, or clear the override with `None`.
    pub fn set_pipette_movement_speed(&self, pipette_id: &str, speed: Option<f64>) -> EngineResult<()> {
        self.dispatcher.dispatch(Action::SetPipetteMovementSpeed {
            pipette_id: pipette_id.to_string(),
            speed,
        })
    }

    /// React to the robot door opening or closing.
    pub fn handle_door_change(&self, door_state: DoorState) -> EngineResult<()> {
        self.dispatcher.dispatch(Action::DoorChange { door_state })?;
        info!("Door {:?}", door_state);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeckType, RobotType};
    use crate::hardware::SimulatedHardware;

    fn engine() -> ProtocolEngine {
        ProtocolEngineBuilder::new(
            EngineConfig::simulated(RobotType::Ot2),
            Arc::new(SimulatedHardware::new()),
        )
        .model_utils(ModelUtils::sequential("test"))
        .build()
        .unwrap()
    }

    #[tokio::test]
    async fn test_build_rejects_mismatched_deck() {
        let config = EngineConfig {
            deck_type: DeckType::Ot3Standard,
            ..EngineConfig::simulated(RobotType::Ot2)
        };
        let result = ProtocolEngineBuilder::new(config, Arc::new(SimulatedHardware::new())).build();
        assert!(matches!(result, Err(EngineError::Config(_))));
    }

    #[tokio::test]
    async fn test_offsets_get_generated_ids() {
        let engine = engine();
        let offset = engine
            .add_labware_offset(LabwareOffsetCreate {
                definition_uri: "opentrons/plate/1".to_string(),
                location: crate::types::LabwareOffsetLocation {
                    slot_name: crate::types::DeckSlotName::Slot1,
                    module_model: None,
                },
                vector: crate::types::LabwareOffsetVector::new(0.0, 0.0, 1.0),
            })
            .unwrap();
        assert_eq!(offset.id, "test-1");
        assert_eq!(engine.state_view().labware().get_labware_offsets().len(), 1);
    }

    #[tracing_test::traced_test]
    #[tokio::test]
    async fn test_lifecycle_calls_are_logged() {
        let engine = engine();
        engine.play().unwrap();
        engine.pause().unwrap();
        engine.finish(None, false, true).await.unwrap();

        assert!(logs_contain("Run playing"));
        assert!(logs_contain("Run paused"));
        assert!(logs_contain("Run finished"));
    }
}
