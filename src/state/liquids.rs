//! Liquids declared for a run.

use std::collections::HashMap;

use super::HandlesActions;
use crate::actions::Action;
use crate::types::Liquid;

#[derive(Debug, Clone, Default)]
pub struct LiquidState {
    liquids_by_id: HashMap<String, Liquid>,
    liquid_order: Vec<String>,
}

impl HandlesActions for LiquidState {
    fn handle_action(&self, action: &Action) -> Option<Self> {
        let Action::AddLiquid { liquid } = action else {
            return None;
        };
        let mut next = self.clone();
        if !next.liquids_by_id.contains_key(&liquid.id) {
            next.liquid_order.push(liquid.id.clone());
        }
        next.liquids_by_id.insert(liquid.id.clone(), liquid.clone());
        Some(next)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LiquidView<'a> {
    state: &'a LiquidState,
}

impl<'a> LiquidView<'a> {
    pub(crate) fn new(state: &'a LiquidState) -> Self {
        Self { state }
    }

    pub fn get(&self, liquid_id: &str) -> Option<&'a Liquid> {
        self.state.liquids_by_id.get(liquid_id)
    }

    /// All liquids in the order they were declared.
    pub fn get_all(&self) -> Vec<&'a Liquid> {
        self.state
            .liquid_order
            .iter()
            .filter_map(|id| self.state.liquids_by_id.get(id))
            .collect()
    }
}
