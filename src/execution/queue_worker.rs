//! Background loop that pulls commands off the queue.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::CommandExecutor;
use crate::error::EngineError;
use crate::state::StateStore;

/// Executes queued commands one at a time on a spawned task.
pub struct QueueWorker {
    cancel_tx: watch::Sender<bool>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl QueueWorker {
    /// Spawn the worker loop. Must be called inside a tokio runtime.
    pub fn start(state: Arc<StateStore>, executor: Arc<CommandExecutor>) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let handle = tokio::spawn(run(state, executor, cancel_rx));
        Self {
            cancel_tx,
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Stop pulling new commands. The command in flight, if any, finishes.
    pub fn cancel(&self) {
        self.cancel_tx.send_replace(true);
    }

    /// Wait for the loop to exit.
    pub async fn join(&self) {
        let handle = self.handle.lock().take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                error!("Command queue worker panicked: {}", e);
            }
        }
    }
}

impl Drop for QueueWorker {
    fn drop(&mut self) {
        self.cancel();
    }
}

async fn cancelled(mut cancel_rx: watch::Receiver<bool>) {
    // A dropped sender also means nobody will ever feed the worker again
    let _ = cancel_rx.wait_for(|cancelled| *cancelled).await;
}

async fn run(state: Arc<StateStore>, executor: Arc<CommandExecutor>, cancel_rx: watch::Receiver<bool>) {
    info!("Command queue worker started");
    loop {
        let next = tokio::select! {
            _ = cancelled(cancel_rx.clone()) => break,
            view = state.wait_for(|view| !matches!(view.commands().get_next_queued(), Ok(None))) => view,
        };

        let next_id = match next {
            Ok(view) => view.commands().get_next_queued().map(|id| id.map(str::to_string)),
            Err(e) => Err(e),
        };
        let command_id = match next_id {
            Ok(Some(command_id)) => command_id,
            Ok(None) => continue,
            Err(EngineError::RunStopped(_)) => {
                debug!("Run stopped, command queue worker exiting");
                break;
            }
            Err(e) => {
                error!("Failed to get next command: {}", e);
                break;
            }
        };

        if let Err(e) = executor.execute(&command_id).await {
            error!("Failed to record outcome of command {}: {}", command_id, e);
        }
    }
    info!("Command queue worker stopped");
}
