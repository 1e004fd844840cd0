//! Command queue and run lifecycle state.

use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};

use super::HandlesActions;
use crate::actions::Action;
use crate::commands::{Command, CommandIntent, CommandStatus};
use crate::error::{EngineError, EngineResult, ErrorOccurrence};
use crate::types::{DoorState, EngineStatus};

/// Whether the queue is handing out protocol commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    /// Before the first `Play`; only setup commands run
    Setup,
    /// Protocol commands are handed out
    Running,
    /// Only setup commands are handed out
    Paused,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunResult {
    /// Every protocol command succeeded
    Succeeded,
    /// A protocol command or the run itself failed
    Failed,
    /// Stopped before the protocol completed
    Stopped,
}

/// Command queue and run lifecycle.
#[derive(Debug, Clone)]
pub struct CommandState {
    queue_status: QueueStatus,
    run_result: Option<RunResult>,
    run_completed_at: Option<DateTime<Utc>>,
    is_door_blocking: bool,
    block_on_door_open: bool,
    commands_by_id: HashMap<String, Command>,
    all_command_ids: Vec<String>,
    queued_command_ids: VecDeque<String>,
    queued_setup_command_ids: VecDeque<String>,
    running_command_id: Option<String>,
    failed_command_id: Option<String>,
    run_error: Option<ErrorOccurrence>,
}

impl CommandState {
    /// Empty queue, waiting in setup.
    pub fn new(block_on_door_open: bool) -> Self {
        Self {
            queue_status: QueueStatus::Setup,
            run_result: None,
            run_completed_at: None,
            is_door_blocking: false,
            block_on_door_open,
            commands_by_id: HashMap::new(),
            all_command_ids: Vec::new(),
            queued_command_ids: VecDeque::new(),
            queued_setup_command_ids: VecDeque::new(),
            running_command_id: None,
            failed_command_id: None,
            run_error: None,
        }
    }

    fn dequeue(&mut self, command_id: &str) {
        self.queued_command_ids.retain(|id| id != command_id);
        self.queued_setup_command_ids.retain(|id| id != command_id);
    }

    fn update_command(&mut self, command: &Command) -> bool {
        let Some(prev) = self.commands_by_id.get(&command.id) else {
            return false;
        };
        if !prev.status.can_update_to(command.status) {
            return false;
        }

        if command.status == CommandStatus::Running {
            self.dequeue(&command.id);
            self.running_command_id = Some(command.id.clone());
        } else if self.running_command_id.as_deref() == Some(command.id.as_str()) {
            self.running_command_id = None;
        }
        self.commands_by_id.insert(command.id.clone(), command.clone());
        true
    }

    fn fail_command(&mut self, command_id: &str, error: &ErrorOccurrence) -> bool {
        let Some(prev) = self.commands_by_id.get(command_id) else {
            return false;
        };
        if prev.status.is_terminal() {
            return false;
        }
        let failed = prev.to_failed(error.clone());
        let intent = failed.intent;
        self.dequeue(command_id);
        if self.running_command_id.as_deref() == Some(command_id) {
            self.running_command_id = None;
        }
        self.commands_by_id.insert(command_id.to_string(), failed);

        if intent == CommandIntent::Protocol {
            // A failed protocol command fails everything queued behind it
            for queued_id in std::mem::take(&mut self.queued_command_ids) {
                if let Some(queued) = self.commands_by_id.get(&queued_id) {
                    let failed = queued.to_failed(error.clone());
                    self.commands_by_id.insert(queued_id, failed);
                }
            }
            self.failed_command_id = Some(command_id.to_string());
            self.run_error = Some(error.clone());
            if self.run_result.is_none() {
                self.run_result = Some(RunResult::Failed);
                self.queue_status = QueueStatus::Paused;
            }
        }
        true
    }
}

impl HandlesActions for CommandState {
    fn handle_action(&self, action: &Action) -> Option<Self> {
        let mut next = self.clone();
        let changed = match action {
            Action::QueueCommand {
                command_id,
                created_at,
                request,
            } => {
                if next.commands_by_id.contains_key(command_id) {
                    return None;
                }
                let command = Command {
                    id: command_id.clone(),
                    key: request.key.clone().unwrap_or_else(|| command_id.clone()),
                    created_at: *created_at,
                    started_at: None,
                    completed_at: None,
                    status: CommandStatus::Queued,
                    intent: request.intent,
                    params: request.params.clone(),
                    result: None,
                    error: None,
                };
                next.all_command_ids.push(command_id.clone());
                match request.intent {
                    CommandIntent::Setup => next.queued_setup_command_ids.push_back(command_id.clone()),
                    CommandIntent::Protocol => next.queued_command_ids.push_back(command_id.clone()),
                }
                next.commands_by_id.insert(command_id.clone(), command);
                true
            }
            Action::UpdateCommand { command } => next.update_command(command),
            Action::FailCommand { command_id, error } => next.fail_command(command_id, error),
            Action::Play { .. } => {
                if next.run_result.is_some() {
                    return None;
                }
                next.queue_status = QueueStatus::Running;
                true
            }
            Action::Pause { .. } => {
                if next.run_result.is_some() {
                    return None;
                }
                next.queue_status = QueueStatus::Paused;
                true
            }
            Action::Stop => {
                if next.run_result.is_some() {
                    return None;
                }
                next.queue_status = QueueStatus::Paused;
                next.run_result = Some(RunResult::Stopped);
                true
            }
            Action::Finish {
                error,
                set_run_status,
            } => {
                let mut changed = false;
                if next.run_result.is_none() {
                    next.queue_status = QueueStatus::Paused;
                    next.run_result = Some(match (set_run_status, error) {
                        (false, _) => RunResult::Stopped,
                        (true, Some(_)) => RunResult::Failed,
                        (true, None) => RunResult::Succeeded,
                    });
                    changed = true;
                }
                if let Some(error) = error {
                    if next.run_error.is_none() {
                        next.run_error = Some(error.clone());
                        changed = true;
                    }
                }
                changed
            }
            Action::HardwareStopped { completed_at } => {
                let changed = next.queue_status != QueueStatus::Paused
                    || next.run_result.is_none()
                    || next.run_completed_at.is_none()
                    || !next.queued_command_ids.is_empty()
                    || !next.queued_setup_command_ids.is_empty();
                next.queue_status = QueueStatus::Paused;
                next.run_result.get_or_insert(RunResult::Stopped);
                next.run_completed_at.get_or_insert(*completed_at);
                next.queued_command_ids.clear();
                next.queued_setup_command_ids.clear();
                changed
            }
            Action::DoorChange { door_state } => match door_state {
                DoorState::Open if next.block_on_door_open => {
                    next.is_door_blocking = true;
                    if next.queue_status == QueueStatus::Running {
                        next.queue_status = QueueStatus::Paused;
                    }
                    true
                }
                DoorState::Open => false,
                DoorState::Closed => {
                    next.is_door_blocking = false;
                    true
                }
            },
            Action::AddLabwareOffset { .. }
            | Action::AddLabwareDefinition { .. }
            | Action::AddModule { .. }
            | Action::AddLiquid { .. }
            | Action::ResetTips { .. }
            | Action::SetPipetteMovementSpeed { .. } => false,
        };
        changed.then_some(next)
    }
}

/// Read-only view of the command queue.
#[derive(Debug, Clone, Copy)]
pub struct CommandView<'a> {
    state: &'a CommandState,
}

impl<'a> CommandView<'a> {
    pub(crate) fn new(state: &'a CommandState) -> Self {
        Self { state }
    }

    /// Look up a command by id.
    pub fn get(&self, command_id: &str) -> EngineResult<&'a Command> {
        self.state
            .commands_by_id
            .get(command_id)
            .ok_or_else(|| EngineError::CommandDoesNotExist(command_id.to_string()))
    }

    /// All commands in the order they were queued.
    pub fn get_all(&self) -> Vec<&'a Command> {
        self.state
            .all_command_ids
            .iter()
            .filter_map(|id| self.state.commands_by_id.get(id))
            .collect()
    }


    /// Id of the running command, if any.
    pub fn get_running(&self) -> Option<&'a str> {
        self.state.running_command_id.as_deref()
    }

    /// Id of the protocol command that failed the run.
    pub fn get_failed_command_id(&self) -> Option<&'a str> {
        self.state.failed_command_id.as_deref()
    }

    /// Error that ended the run, if any.
    pub fn get_run_error(&self) -> Option<&'a ErrorOccurrence> {
        self.state.run_error.as_ref()
    }

    /// Current queue status.
    pub fn get_queue_status(&self) -> QueueStatus {
        self.state.queue_status
    }

    /// How the run ended, once it has.
    pub fn get_run_result(&self) -> Option<RunResult> {
        self.state.run_result
    }


    pub fn get_run_completed_at(&self) -> Option<DateTime<Utc>> {
        self.state.run_completed_at
    }

    /// Whether protocol commands are being handed out.
    pub fn get_is_running(&self) -> bool {
        self.state.queue_status == QueueStatus::Running
    }

    /// Whether the run has been stopped or finished.
    pub fn get_is_stopped(&self) -> bool {
        self.state.run_result.is_some()
    }


    /// Id of the next command the worker should execute.
    ///
    /// Setup commands run first and are handed out even while paused.
    /// Protocol commands are only handed out while running.
    pub fn get_next_queued(&self) -> EngineResult<Option<&'a str>> {
        if self.state.run_result.is_some() {
            return Err(EngineError::RunStopped("Engine was stopped".to_string()));
        }
        if let Some(setup_id) = self.state.queued_setup_command_ids.front() {
            return Ok(Some(setup_id.as_str()));
        }
        if self.state.queue_status == QueueStatus::Running {
            return Ok(self.state.queued_command_ids.front().map(String::as_str));
        }
        Ok(None)
    }

    /// Whether a command is done, or will never run.
    pub fn get_command_is_final(&self, command_id: &str) -> EngineResult<bool> {
        let command = self.get(command_id)?;
        Ok(command.status.is_terminal()
            || (self.state.run_result.is_some() && command.status == CommandStatus::Queued))
    }

    /// Whether no command is running and nothing more will run.
    pub fn get_all_commands_final(&self) -> bool {
        if self.state.running_command_id.is_some() {
            return false;
        }
        self.state.run_result.is_some()
            || (self.state.queued_command_ids.is_empty()
                && self.state.queued_setup_command_ids.is_empty())
    }

    /// Outward engine status.
    pub fn get_status(&self) -> EngineStatus {
        match self.state.run_result {
            Some(result) if self.state.run_completed_at.is_none() => match result {
                RunResult::Succeeded => EngineStatus::Finishing,
                RunResult::Failed | RunResult::Stopped => EngineStatus::Stopping,
            },
            Some(RunResult::Succeeded) => EngineStatus::Succeeded,
            Some(RunResult::Failed) => EngineStatus::Failed,
            Some(RunResult::Stopped) => EngineStatus::Stopped,
            None => match self.state.queue_status {
                QueueStatus::Running => EngineStatus::Running,
                _ if self.state.is_door_blocking => EngineStatus::BlockedByOpenDoor,
                QueueStatus::Paused => EngineStatus::Paused,
                QueueStatus::Setup => EngineStatus::Idle,
            },
        }
    }

    /// Reject actions the run lifecycle no longer allows.
    pub fn validate_action_allowed(&self, action: &Action) -> EngineResult<()> {
        match action {
            Action::Play { .. } => {
                if self.get_is_stopped() {
                    return Err(EngineError::RunStopped(
                        "The run has already stopped".to_string(),
                    ));
                }
                if self.state.is_door_blocking {
                    return Err(EngineError::RobotDoorOpen(
                        "Front door or top window is currently open".to_string(),
                    ));
                }
            }
            Action::Pause { .. } => {
                if self.get_is_stopped() {
                    return Err(EngineError::RunStopped(
                        "The run has already stopped".to_string(),
                    ));
                }
            }
            Action::QueueCommand {
                command_id, request, ..
            } => {
                if self.state.commands_by_id.contains_key(command_id) {
                    return Err(EngineError::CommandAlreadyExists(command_id.clone()));
                }
                if self.get_is_stopped() {
                    return Err(EngineError::RunStopped(
                        "The run has already stopped".to_string(),
                    ));
                }
                if request.intent == CommandIntent::Setup
                    && self.state.queue_status == QueueStatus::Running
                {
                    return Err(EngineError::SetupCommandNotAllowed(
                        "Setup commands are not allowed while the run is running".to_string(),
                    ));
                }
            }
            Action::UpdateCommand { command } => {
                let prev = self.get(&command.id)?;
                if !prev.status.can_update_to(command.status) {
                    return Err(EngineError::InvalidCommandTransition {
                        command_id: command.id.clone(),
                        from: prev.status,
                        to: command.status,
                    });
                }
            }
            Action::FailCommand { command_id, .. } => {
                self.get(command_id)?;
            }
            _ => {}
        }
        Ok(())
    }
}
