//! Session state — where a guided session currently stands.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Snapshot of a running session, for host UIs (progress dots, resume).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub session_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub current_index: usize,
    pub step_count: usize,
    pub transitioning: bool,
    /// Indices left via a forward advance (plus the final step once finished).
    pub visited: BTreeSet<usize>,
    pub completed: bool,
    pub ended: bool,
}

impl SessionState {
    pub fn is_last(&self) -> bool {
        self.current_index + 1 == self.step_count
    }

    /// Whether a progress dot for `index` should be clickable.
    pub fn can_jump_to(&self, index: usize) -> bool {
        index < self.step_count && (index == 0 || self.visited.contains(&index))
    }
}

/// Mutable position owned by the sequencer.
#[derive(Debug, Clone)]
pub(crate) struct Cursor {
    pub current: usize,
    pub visited: BTreeSet<usize>,
}

impl Cursor {
    pub fn new() -> Self {
        Self {
            current: 0,
            visited: BTreeSet::new(),
        }
    }

    /// Step forward. Returns `true` the first time `current` is left.
    pub fn forward(&mut self) -> bool {
        let first_visit = self.visited.insert(self.current);
        self.current += 1;
        first_visit
    }

    pub fn back(&mut self) -> bool {
        if self.current == 0 {
            return false;
        }
        self.current -= 1;
        true
    }

    pub fn can_jump_to(&self, index: usize) -> bool {
        index == 0 || self.visited.contains(&index)
    }
}
