//! Protocol-initiated pauses.

use std::sync::Arc;

use tracing::info;

use super::ActionDispatcher;
use crate::actions::{Action, PauseSource};
use crate::error::{EngineError, EngineResult};

/// Lets a running command pause the run and wait to be resumed.
pub struct RunControlHandler {
    dispatcher: Arc<ActionDispatcher>,
    ignore_pause: bool,
}

impl RunControlHandler {
    pub fn new(dispatcher: Arc<ActionDispatcher>, ignore_pause: bool) -> Self {
        Self {
            dispatcher,
            ignore_pause,
        }
    }

    /// Pause the run and wait until it is resumed.
    ///
    /// Returns `RunStopped` if the run is stopped instead of resumed.
    pub async fn wait_for_resume(&self) -> EngineResult<()> {
        if self.ignore_pause {
            return Ok(());
        }

        self.dispatcher.dispatch(Action::Pause {
            source: PauseSource::Protocol,
        })?;
        info!("Run paused by protocol, waiting for resume");

        let view = self
            .dispatcher
            .state()
            .wait_for(|view| {
                let commands = view.commands();
                commands.get_is_running() || commands.get_is_stopped()
            })
            .await?;

        if view.commands().get_is_stopped() {
            return Err(EngineError::RunStopped(
                "Run was stopped while waiting for resume".to_string(),
            ));
        }
        info!("Run resumed");
        Ok(())
    }
}
