//! Profile store — the managed backend the guide reads history from and
//! flushes results to. Best-effort: failures never roll back session state.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::error::ProfileStoreError;

/// The parts of a user profile the guide cares about.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub user_id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub xp: u32,
    #[serde(default = "default_level")]
    pub level: u32,
    #[serde(default)]
    pub achievements: BTreeSet<String>,
    #[serde(default)]
    pub safety_scenarios: Vec<String>,
    #[serde(default)]
    pub notifications_enabled: bool,
    #[serde(default)]
    pub location_consent: bool,
    #[serde(default)]
    pub tour_completed: bool,
    #[serde(default)]
    pub onboarding_completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding_completed_at: Option<DateTime<Utc>>,
}

fn default_level() -> u32 {
    1
}

/// Partial update. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xp: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub achievements: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub safety_scenarios: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notifications_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location_consent: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tour_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding_completed: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onboarding_completed_at: Option<DateTime<Utc>>,
}

impl Profile {
    /// Apply a partial update in place.
    pub fn apply(&mut self, update: ProfileUpdate) {
        if let Some(v) = update.display_name {
            self.display_name = Some(v);
        }
        if let Some(v) = update.photo_url {
            self.photo_url = Some(v);
        }
        if let Some(v) = update.xp {
            self.xp = v;
        }
        if let Some(v) = update.level {
            self.level = v;
        }
        if let Some(v) = update.achievements {
            self.achievements = v;
        }
        if let Some(v) = update.safety_scenarios {
            self.safety_scenarios = v;
        }
        if let Some(v) = update.notifications_enabled {
            self.notifications_enabled = v;
        }
        if let Some(v) = update.location_consent {
            self.location_consent = v;
        }
        if let Some(v) = update.tour_completed {
            self.tour_completed = v;
        }
        if let Some(v) = update.onboarding_completed {
            self.onboarding_completed = v;
        }
        if let Some(v) = update.onboarding_completed_at {
            self.onboarding_completed_at = Some(v);
        }
    }
}

/// Backend profile storage.
#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Read a profile. `Ok(None)` for a user with no profile yet.
    async fn read_profile(&self, user_id: &str) -> Result<Option<Profile>, ProfileStoreError>;

    /// Merge `update` into the user's profile, creating it if needed.
    async fn write_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<(), ProfileStoreError>;
}

/// In-memory profile store.
#[derive(Debug, Default)]
pub struct MemoryProfileStore {
    profiles: RwLock<HashMap<String, Profile>>,
}

impl MemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, profile: Profile) {
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile);
    }
}

#[async_trait]
impl ProfileStore for MemoryProfileStore {
    async fn read_profile(&self, user_id: &str) -> Result<Option<Profile>, ProfileStoreError> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn write_profile(
        &self,
        user_id: &str,
        update: ProfileUpdate,
    ) -> Result<(), ProfileStoreError> {
        let mut profiles = self.profiles.write().await;
        let profile = profiles.entry(user_id.to_string()).or_insert_with(|| Profile {
            user_id: user_id.to_string(),
            level: 1,
            ..Profile::default()
        });
        profile.apply(update);
        Ok(())
    }
}
