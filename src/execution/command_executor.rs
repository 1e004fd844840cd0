//! Runs one queued command to a terminal status.

use std::sync::Arc;

use tracing::{error, info};

use super::{ActionDispatcher, EquipmentHandler, LabwareMovementHandler, MovementHandler, RunControlHandler, TipHandler};
use crate::actions::Action;
use crate::commands::CommandContext;
use crate::error::{EngineResult, ErrorOccurrence};
use crate::resources::ModelUtils;

/// Executes commands against the handler bundle.
pub struct CommandExecutor {
    dispatcher: Arc<ActionDispatcher>,
    model_utils: Arc<ModelUtils>,
    equipment: Arc<EquipmentHandler>,
    movement: MovementHandler,
    labware_movement: LabwareMovementHandler,
    tip_handler: Arc<dyn TipHandler>,
    run_control: RunControlHandler,
}

impl CommandExecutor {
    pub fn new(
        dispatcher: Arc<ActionDispatcher>,
        model_utils: Arc<ModelUtils>,
        equipment: Arc<EquipmentHandler>,
        movement: MovementHandler,
        labware_movement: LabwareMovementHandler,
        tip_handler: Arc<dyn TipHandler>,
        run_control: RunControlHandler,
    ) -> Self {
        Self {
            dispatcher,
            model_utils,
            equipment,
            movement,
            labware_movement,
            tip_handler,
            run_control,
        }
    }

    /// Run `command_id`, recording Running and then Succeeded or Failed.
    ///
    /// Errors from the command itself are recorded on the command. Only a
    /// failure to record them is returned.
    pub async fn execute(&self, command_id: &str) -> EngineResult<()> {
        let view = self.dispatcher.state().view();
        let running = view
            .commands()
            .get(command_id)?
            .to_running(self.model_utils.get_timestamp());
        self.dispatcher.dispatch(Action::UpdateCommand {
            command: running.clone(),
        })?;
        info!("Executing command {} ({})", running.id, running.command_type());

        let ctx = CommandContext {
            state: self.dispatcher.state().view(),
            equipment: &self.equipment,
            movement: &self.movement,
            labware_movement: &self.labware_movement,
            tip_handler: self.tip_handler.as_ref(),
            run_control: &self.run_control,
        };

        let outcome = running.params.execute(&ctx).await;
        let error = match outcome {
            Ok(result) => {
                let succeeded = running.to_succeeded(result, self.model_utils.get_timestamp());
                match self.dispatcher.dispatch(Action::UpdateCommand { command: succeeded }) {
                    Ok(()) => {
                        info!("Command {} succeeded", running.id);
                        return Ok(());
                    }
                    // The result itself was rejected, e.g. it names an unknown offset
                    Err(e) => e,
                }
            }
            Err(e) => e,
        };

        error!("Command {} ({}) failed: {}", running.id, running.command_type(), error);
        let occurrence = ErrorOccurrence::from_error(
            self.model_utils.generate_id(),
            self.model_utils.get_timestamp(),
            &error,
        );
        self.dispatcher.dispatch(Action::FailCommand {
            command_id: running.id.clone(),
            error: occurrence,
        })
    }
}
