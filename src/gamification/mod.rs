//! Gamification — experience points, levels, and one-time achievements.

pub mod catalog;
pub mod ledger;

pub use catalog::{Achievement, AchievementCatalog};
pub use ledger::{GamificationLedger, GamificationState, Unlocked, XpAward, level_for};
