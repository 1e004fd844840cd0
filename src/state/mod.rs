//! Engine state: sub-state reducers, read views and the store that owns them.
//!
//! State is split into independent sub-states, each with its own reducer
//! ([`HandlesActions`]) and a borrowed read view. A [`State`] snapshot holds
//! every sub-state behind an `Arc`, so reducing an action only clones the
//! sub-states that actually changed. [`StateStore`] is the single writer and
//! publishes settled snapshots; readers hold a [`StateView`].

use std::sync::Arc;

use crate::actions::Action;
use crate::config::EngineConfig;
use crate::definitions::DeckDefinition;
use crate::error::EngineResult;

pub mod commands;
pub mod geometry;
pub mod labware;
pub mod liquids;
pub mod modules;
pub mod motion;
pub mod pipettes;
pub mod store;
pub mod tips;

pub use commands::{CommandState, CommandView, QueueStatus, RunResult};
pub use geometry::GeometryView;
pub use labware::{DeckFixedLabware, LabwareState, LabwareView};
pub use liquids::{LiquidState, LiquidView};
pub use modules::{ModuleState, ModuleSubState, ModuleView};
pub use motion::{MotionView, MoveType, PipetteLocationData};
pub use pipettes::{LoadedPipette, PipetteState, PipetteView};
pub use store::StateStore;
pub use tips::{TipRackWellState, TipState, TipView};

/// A reducer over engine actions.
pub trait HandlesActions: Sized {
    /// The next value of this sub-state, or `None` if `action` leaves it unchanged.
    fn handle_action(&self, action: &Action) -> Option<Self>;
}

/// A complete snapshot of engine state.
#[derive(Debug, Clone)]
pub struct State {
    commands: Arc<CommandState>,
    labware: Arc<LabwareState>,
    pipettes: Arc<PipetteState>,
    modules: Arc<ModuleState>,
    liquids: Arc<LiquidState>,
    tips: Arc<TipState>,
    config: Arc<EngineConfig>,
}

/// Replace `slot` if its reducer produced a new value.
fn reduce_into<S: HandlesActions>(slot: &mut Arc<S>, action: &Action) -> bool {
    match slot.handle_action(action) {
        Some(next) => {
            *slot = Arc::new(next);
            true
        }
        None => false,
    }
}

impl State {
    /// Initial state for a run.
    pub fn new(
        config: EngineConfig,
        deck_definition: DeckDefinition,
        fixed_labware: Vec<DeckFixedLabware>,
    ) -> Self {
        Self {
            commands: Arc::new(CommandState::new(config.block_on_door_open)),
            labware: Arc::new(LabwareState::new(deck_definition, fixed_labware)),
            pipettes: Arc::new(PipetteState::default()),
            modules: Arc::new(ModuleState::default()),
            liquids: Arc::new(LiquidState::default()),
            tips: Arc::new(TipState::default()),
            config: Arc::new(config),
        }
    }

    /// Check an action against every sub-state before anything changes.
    pub fn validate_action_allowed(&self, action: &Action) -> EngineResult<()> {
        CommandView::new(&self.commands).validate_action_allowed(action)?;
        LabwareView::new(&self.labware).validate_action_allowed(action)?;
        PipetteView::new(&self.pipettes).validate_action_allowed(action)?;
        Ok(())
    }

    /// Apply an action to each sub-state in order.
    ///
    /// Returns `None` if no sub-state changed.
    pub fn reduce(&self, action: &Action) -> Option<Self> {
        let mut next = self.clone();
        let mut changed = reduce_into(&mut next.commands, action);
        changed |= reduce_into(&mut next.labware, action);
        changed |= reduce_into(&mut next.pipettes, action);
        changed |= reduce_into(&mut next.modules, action);
        changed |= reduce_into(&mut next.liquids, action);
        changed |= reduce_into(&mut next.tips, action);
        changed.then_some(next)
    }
}

/// Cheap, cloneable read handle over one state snapshot.
#[derive(Debug, Clone)]
pub struct StateView {
    state: Arc<State>,
}

impl StateView {
    pub(crate) fn new(state: Arc<State>) -> Self {
        Self { state }
    }

    /// Command queue and run lifecycle.
    pub fn commands(&self) -> CommandView<'_> {
        CommandView::new(&self.state.commands)
    }

    /// Loaded labware, definitions and offsets.
    pub fn labware(&self) -> LabwareView<'_> {
        LabwareView::new(&self.state.labware)
    }

    /// Loaded pipettes and their last known location.
    pub fn pipettes(&self) -> PipetteView<'_> {
        PipetteView::new(&self.state.pipettes)
    }

    /// Attached and loaded modules.
    pub fn modules(&self) -> ModuleView<'_> {
        ModuleView::new(&self.state.modules)
    }

    /// Liquids registered for the run.
    pub fn liquids(&self) -> LiquidView<'_> {
        LiquidView::new(&self.state.liquids)
    }

    /// Tip usage per tip rack.
    pub fn tips(&self) -> TipView<'_> {
        TipView::new(&self.state.tips)
    }

    /// Derived positions computed from labware, module and pipette state.
    pub fn geometry(&self) -> GeometryView<'_> {
        GeometryView::new(
            self.labware(),
            self.modules(),
            self.pipettes(),
            self.state.config.deck_type,
        )
    }

    /// Motion planning on top of geometry.
    pub fn motion(&self) -> MotionView<'_> {
        MotionView::new(self.labware(), self.pipettes(), self.geometry())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.state.config
    }
}
