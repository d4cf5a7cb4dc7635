//! Achievement catalog — explicitly owned table of unlockable milestones.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Display metadata for one achievement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Achievement {
    pub id: String,
    pub name: String,
    pub description: String,
    pub icon: String,
}

impl Achievement {
    pub fn new(id: &str, name: &str, description: &str, icon: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            icon: icon.to_string(),
        }
    }
}

/// Well-known achievement ids.
pub mod ids {
    pub const FIRST_STEP: &str = "first_step";
    pub const PROFILE_STARTED: &str = "profile_started";
    pub const PHOTO_ADDED: &str = "photo_added";
    pub const SCENARIOS_CHOSEN: &str = "scenarios_chosen";
    pub const ALERTS_READY: &str = "alerts_ready";
    pub const CIRCLE_READY: &str = "circle_ready";
    pub const ONBOARDING_COMPLETE: &str = "onboarding_complete";
    pub const TOUR_EXPLORER: &str = "tour_explorer";
    pub const TOUR_COMPLETE: &str = "tour_complete";
}

/// Lookup table from achievement id to its metadata.
#[derive(Debug, Clone, Default)]
pub struct AchievementCatalog {
    entries: BTreeMap<String, Achievement>,
}

impl AchievementCatalog {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register (or replace) an achievement.
    pub fn with(mut self, achievement: Achievement) -> Self {
        self.entries.insert(achievement.id.clone(), achievement);
        self
    }

    pub fn get(&self, id: &str) -> Option<&Achievement> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl AchievementCatalog {
    /// The catalog shipped with the app.
    pub fn standard() -> Self {
        Self::empty()
            .with(Achievement::new(
                ids::FIRST_STEP,
                "First Step",
                "You started setting up your safety net",
                "👣",
            ))
            .with(Achievement::new(
                ids::PROFILE_STARTED,
                "Hello, You",
                "Told your besties what to call you",
                "👋",
            ))
            .with(Achievement::new(
                ids::PHOTO_ADDED,
                "Picture Perfect",
                "Added a profile photo so besties recognize you",
                "📸",
            ))
            .with(Achievement::new(
                ids::SCENARIOS_CHOSEN,
                "Prepared",
                "Picked the situations you want check-ins for",
                "🧭",
            ))
            .with(Achievement::new(
                ids::ALERTS_READY,
                "Alert Ready",
                "Turned on notifications for missed check-ins",
                "🔔",
            ))
            .with(Achievement::new(
                ids::CIRCLE_READY,
                "Circle Ready",
                "Learned how your bestie circle keeps watch",
                "💜",
            ))
            .with(Achievement::new(
                ids::ONBOARDING_COMPLETE,
                "All Set",
                "Finished onboarding",
                "🎉",
            ))
            .with(Achievement::new(
                ids::TOUR_EXPLORER,
                "Explorer",
                "Made it halfway through the app tour",
                "🗺️",
            ))
            .with(Achievement::new(
                ids::TOUR_COMPLETE,
                "Tour Guide",
                "Finished the app tour",
                "🏁",
            ))
    }
}
