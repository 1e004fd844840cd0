//! The single writer of engine state.
//!
//! `StateStore` keeps the current [`State`] snapshot in a `tokio::sync::watch`
//! channel. `dispatch` validates and reduces inside one `send_if_modified`
//! call, so validation and mutation are atomic with respect to other
//! dispatches and subscribers are only woken when something changed.

use std::sync::Arc;

use tokio::sync::watch;

use super::{State, StateView};
use crate::actions::Action;
use crate::error::{EngineError, EngineResult};

/// Owns engine state and notifies subscribers of every change.
#[derive(Debug)]
pub struct StateStore {
    sender: watch::Sender<Arc<State>>,
}

impl StateStore {
    /// Create a store holding `initial`.
    pub fn new(initial: State) -> Self {
        let (sender, _) = watch::channel(Arc::new(initial));
        Self { sender }
    }

    /// Validate and apply an action.
    ///
    /// A rejected action leaves state untouched and wakes nobody.
    pub fn dispatch(&self, action: &Action) -> EngineResult<()> {
        let mut outcome = Ok(());
        self.sender.send_if_modified(|current| {
            if let Err(err) = current.validate_action_allowed(action) {
                outcome = Err(err);
                return false;
            }
            match current.reduce(action) {
                Some(next) => {
                    *current = Arc::new(next);
                    true
                }
                None => false,
            }
        });
        outcome
    }

    /// Snapshot of the current state.
    pub fn view(&self) -> StateView {
        StateView::new(Arc::clone(&self.sender.borrow()))
    }

    /// Raw change feed, one value per settled snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Arc<State>> {
        self.sender.subscribe()
    }

    /// Wait until `predicate` holds for some snapshot, checking the current one first.
    pub async fn wait_for<F>(&self, mut predicate: F) -> EngineResult<StateView>
    where
        F: FnMut(&StateView) -> bool + Send,
    {
        let mut receiver = self.sender.subscribe();
        let state = receiver
            .wait_for(|state| predicate(&StateView::new(Arc::clone(state))))
            .await
            .map_err(|_| EngineError::RunStopped("State store was dropped".to_string()))?;
        Ok(StateView::new(Arc::clone(&state)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DeckType, EngineConfig};
    use crate::definitions::DeckDefinition;
    use crate::types::{DeckSlotName, LabwareOffsetCreate, LabwareOffsetLocation, LabwareOffsetVector};
    use chrono::Utc;
    use std::time::Duration;

    fn store() -> StateStore {
        StateStore::new(State::new(
            EngineConfig::default(),
            DeckDefinition::standard(DeckType::Ot2Standard),
            vec![],
        ))
    }

    fn add_offset(id: &str) -> Action {
        Action::AddLabwareOffset {
            labware_offset_id: id.into(),
            created_at: Utc::now(),
            request: LabwareOffsetCreate {
                definition_uri: "opentrons/plate/1".into(),
                location: LabwareOffsetLocation {
                    slot_name: DeckSlotName::Slot1,
                    module_model: None,
                },
                vector: LabwareOffsetVector::new(1.0, 0.0, 0.0),
            },
        }
    }

    #[test]
    fn test_rejected_action_leaves_state_untouched() {
        let store = store();
        store.dispatch(&add_offset("offset-1")).unwrap();
        let mut receiver = store.subscribe();
        receiver.mark_unchanged();

        let err = store.dispatch(&add_offset("offset-1")).unwrap_err();
        assert!(matches!(err, EngineError::LabwareOffsetAlreadyExists(_)));
        assert!(!receiver.has_changed().unwrap());
        assert_eq!(store.view().labware().get_labware_offsets().len(), 1);
    }

    #[test]
    fn test_views_are_stable_snapshots() {
        let store = store();
        let before = store.view();
        store.dispatch(&add_offset("offset-1")).unwrap();

        assert!(before.labware().get_labware_offsets().is_empty());
        assert_eq!(store.view().labware().get_labware_offsets().len(), 1);
    }

    #[tokio::test]
    async fn test_wait_for_wakes_on_dispatch() {
        let store = Arc::new(store());
        let waiter = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                store
                    .wait_for(|view| view.commands().get_is_running())
                    .await
                    .map(|view| view.commands().get_is_running())
            })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        store
            .dispatch(&Action::Play { requested_at: Utc::now() })
            .unwrap();

        let woke = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(woke);
    }
}
