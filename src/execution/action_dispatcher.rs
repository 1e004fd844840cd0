//! Fan-out of dispatched actions.
//!
//! Every action goes to the [`StateStore`] first. Only if the store accepts it
//! is it forwarded to the secondary [`ActionHandler`]s, in registration order.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::actions::Action;
use crate::error::EngineResult;
use crate::state::StateStore;

/// Observer of accepted actions.
pub trait ActionHandler: Send + Sync {
    fn handle_action(&self, action: &Action);
}

/// Logs each accepted action at debug level.
#[derive(Debug, Default)]
pub struct ActionLogger;

impl ActionHandler for ActionLogger {
    fn handle_action(&self, action: &Action) {
        match action {
            Action::UpdateCommand { command } => debug!(
                "Action {}: command '{}' ({}) is {:?}",
                action.name(),
                command.id,
                command.command_type(),
                command.status
            ),
            Action::FailCommand { command_id, error } => debug!(
                "Action {}: command '{}' failed with {}",
                action.name(),
                command_id,
                error.error_type
            ),
            _ => debug!("Action {}", action.name()),
        }
    }
}

/// Routes actions to the store and then to registered handlers.
pub struct ActionDispatcher {
    state: Arc<StateStore>,
    handlers: RwLock<Vec<Arc<dyn ActionHandler>>>,
}

impl std::fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDispatcher")
            .field("handler_count", &self.handlers.read().len())
            .finish()
    }
}

impl ActionDispatcher {
    pub fn new(state: Arc<StateStore>) -> Self {
        Self {
            state,
            handlers: RwLock::new(Vec::new()),
        }
    }

    /// Register a secondary handler.
    pub fn add_handler(&self, handler: Arc<dyn ActionHandler>) {
        self.handlers.write().push(handler);
    }

    /// Apply `action` to state, then notify handlers.
    pub fn dispatch(&self, action: Action) -> EngineResult<()> {
        self.state.dispatch(&action)?;
        let handlers = self.handlers.read().clone();
        for handler in handlers {
            handler.handle_action(&action);
        }
        Ok(())
    }

    /// The store this dispatcher writes to.
    pub fn state(&self) -> &Arc<StateStore> {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeckType, EngineConfig};
    use crate::definitions::DeckDefinition;
    use crate::state::State;
    use chrono::Utc;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recorder {
        names: Mutex<Vec<&'static str>>,
    }

    impl ActionHandler for Recorder {
        fn handle_action(&self, action: &Action) {
            self.names.lock().push(action.name());
        }
    }

    fn dispatcher() -> ActionDispatcher {
        let store = StateStore::new(State::new(
            EngineConfig::default(),
            DeckDefinition::standard(DeckType::Ot2Standard),
            vec![],
        ));
        ActionDispatcher::new(Arc::new(store))
    }

    #[test]
    fn test_handlers_only_see_accepted_actions() {
        let dispatcher = dispatcher();
        let recorder = Arc::new(Recorder::default());
        dispatcher.add_handler(recorder.clone());

        dispatcher.dispatch(Action::Stop).unwrap();
        assert!(dispatcher
            .dispatch(Action::Play { requested_at: Utc::now() })
            .is_err());

        assert_eq!(*recorder.names.lock(), vec!["stop"]);
    }

    #[tracing_test::traced_test]
    #[test]
    fn test_action_logger_logs_action_name() {
        let dispatcher = dispatcher();
        dispatcher.add_handler(Arc::new(ActionLogger));
        dispatcher
            .dispatch(Action::Pause {
                source: crate::actions::PauseSource::Client,
            })
            .unwrap();
        assert!(logs_contain("Action pause"));
    }
}
