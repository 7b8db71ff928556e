/// Bounded undo/redo over group mutations
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::groups::{Action, GroupSet};

pub const DEFAULT_HISTORY_DEPTH: usize = 15;

/// Result of recording an action
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Oldest actions folded into the anchor to stay within the depth
    pub folded: usize,
}

impl RecordOutcome {
    pub fn limit_reached(&self) -> bool {
        self.folded > 0
    }
}

/// Linear action log on top of an anchor snapshot.
///
/// The observable collection is `anchor_state` replayed through
/// `actions[..pos]`; `0 <= pos <= actions.len()` always holds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct History {
    anchor_state: GroupSet,
    actions: Vec<Action>,
    pos: usize,
    max_depth: usize,
}

impl History {
    pub fn new(anchor_state: GroupSet, max_depth: usize) -> Self {
        History {
            anchor_state,
            actions: Vec::new(),
            pos: 0,
            max_depth: max_depth.max(1),
        }
    }

    pub fn anchor_state(&self) -> &GroupSet {
        &self.anchor_state
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn can_undo(&self) -> bool {
        self.pos > 0
    }

    pub fn can_redo(&self) -> bool {
        self.pos < self.actions.len()
    }

    /// Append an action, dropping anything that was undone before it
    pub fn record(&mut self, action: Action) -> RecordOutcome {
        self.actions.truncate(self.pos);
        self.actions.push(action);
        self.pos += 1;

        let mut outcome = RecordOutcome::default();
        while self.actions.len() > self.max_depth {
            let oldest = self.actions.remove(0);
            if let Err(e) = self.anchor_state.apply(&oldest) {
                warn!("Folding {} into history anchor failed: {}", oldest.label(), e);
            }
            self.pos -= 1;
            outcome.folded += 1;
        }

        if outcome.limit_reached() {
            info!("History limit of {} reached, folded {} action(s)", self.max_depth, outcome.folded);
        }
        outcome
    }

    pub fn undo(&mut self) -> Option<GroupSet> {
        if !self.can_undo() {
            return None;
        }
        self.pos -= 1;
        Some(self.current())
    }

    pub fn redo(&mut self) -> Option<GroupSet> {
        if !self.can_redo() {
            return None;
        }
        self.pos += 1;
        Some(self.current())
    }

    /// The collection as of the cursor
    pub fn current(&self) -> GroupSet {
        let mut state = self.anchor_state.clone();
        for action in &self.actions[..self.pos] {
            if let Err(e) = state.apply(action) {
                warn!("Replaying {} failed: {}", action.label(), e);
            }
        }
        state
    }
}
