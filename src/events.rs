//! Events emitted by a guided session, for presentation layers.

use serde::Serialize;
use uuid::Uuid;

/// Broadcast to every subscriber of a session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GuideEvent {
    StepChanged {
        from: usize,
        to: usize,
        step_id: String,
    },
    XpAwarded {
        amount: u32,
        total: u32,
        level: u32,
    },
    LevelUp {
        level: u32,
    },
    AchievementUnlocked {
        id: String,
        name: String,
        description: String,
        icon: String,
    },
    /// The level-up celebration has finished playing.
    CelebrationEnded {
        level: u32,
    },
    /// An achievement toast auto-dismissed.
    ToastDismissed {
        id: String,
    },
    /// The final step was reached. Emitted once per session.
    Completed {
        session_id: Uuid,
    },
    Skipped {
        session_id: Uuid,
    },
}
