//! Gamification ledger — XP, derived level, and de-duplicated achievements.
//!
//! Pure state and rules. Callers decide when a snapshot reaches the profile
//! store and which events to emit for an award.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::catalog::{Achievement, AchievementCatalog};
use crate::error::LedgerError;

/// XP needed per level.
pub const XP_PER_LEVEL: u32 = 100;

/// Level for a given XP total: `floor(xp / 100) + 1`.
pub fn level_for(xp: u32) -> u32 {
    xp / XP_PER_LEVEL + 1
}

/// Serializable view of the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamificationState {
    pub xp: u32,
    pub level: u32,
    pub achievements: BTreeSet<String>,
}

impl Default for GamificationState {
    fn default() -> Self {
        Self {
            xp: 0,
            level: 1,
            achievements: BTreeSet::new(),
        }
    }
}

/// Result of an XP award.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XpAward {
    pub amount: u32,
    pub total: u32,
    pub old_level: u32,
    pub new_level: u32,
}

impl XpAward {
    /// Whether a level boundary was crossed.
    pub fn leveled_up(&self) -> bool {
        self.new_level > self.old_level
    }
}

/// A freshly unlocked achievement and the bonus it paid out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unlocked {
    pub achievement: Achievement,
    pub bonus: XpAward,
}

/// Owned XP/achievement state for one guided session.
#[derive(Debug, Clone)]
pub struct GamificationLedger {
    xp: u32,
    achievements: BTreeSet<String>,
    catalog: Arc<AchievementCatalog>,
    achievement_bonus: u32,
}

impl GamificationLedger {
    /// A ledger starting at zero.
    pub fn new(catalog: Arc<AchievementCatalog>, achievement_bonus: u32) -> Self {
        Self {
            xp: 0,
            achievements: BTreeSet::new(),
            catalog,
            achievement_bonus,
        }
    }

    /// Seed the ledger from a stored profile. Historical achievements are
    /// unioned with anything already unlocked in this session.
    pub fn with_history(mut self, xp: u32, achievements: impl IntoIterator<Item = String>) -> Self {
        self.xp = self.xp.max(xp);
        self.achievements.extend(achievements);
        self
    }

    pub fn xp(&self) -> u32 {
        self.xp
    }

    pub fn level(&self) -> u32 {
        level_for(self.xp)
    }

    pub fn has_achievement(&self, id: &str) -> bool {
        self.achievements.contains(id)
    }

    pub fn catalog(&self) -> &AchievementCatalog {
        &self.catalog
    }

    /// Add XP. Saturates rather than wrapping.
    pub fn award_xp(&mut self, amount: u32) -> XpAward {
        let old_level = self.level();
        self.xp = self.xp.saturating_add(amount);
        XpAward {
            amount,
            total: self.xp,
            old_level,
            new_level: self.level(),
        }
    }

    /// Unlock an achievement.
    ///
    /// Returns `Ok(None)` when it is already unlocked: no XP, no event. The
    /// membership check and the insert happen under the same `&mut self`,
    /// so two evaluations of one milestone can never both pay out.
    pub fn unlock_achievement(&mut self, id: &str) -> Result<Option<Unlocked>, LedgerError> {
        let achievement = self
            .catalog
            .get(id)
            .cloned()
            .ok_or_else(|| LedgerError::UnknownAchievement(id.to_string()))?;

        if !self.achievements.insert(id.to_string()) {
            return Ok(None);
        }

        let bonus = self.award_xp(self.achievement_bonus);
        Ok(Some(Unlocked { achievement, bonus }))
    }

    pub fn snapshot(&self) -> GamificationState {
        GamificationState {
            xp: self.xp,
            level: self.level(),
            achievements: self.achievements.clone(),
        }
    }
}
