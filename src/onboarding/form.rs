//! Slide-local form state collected during onboarding.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::gamification::catalog::ids;
use crate::navigation::PermissionOutcome;

/// Answers gathered across the deck. Flushed to the profile store once, at
/// completion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnboardingForm {
    pub display_name: String,
    pub photo_url: Option<String>,
    pub safety_scenarios: BTreeSet<String>,
    /// `None` until the notifications slide has asked.
    pub notifications: Option<PermissionOutcome>,
    pub location_consent: bool,
}

/// Partial form update from the host UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormPatch {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub safety_scenarios: Option<Vec<String>>,
    #[serde(default)]
    pub location_consent: Option<bool>,
}

impl OnboardingForm {
    pub fn apply(&mut self, patch: FormPatch) {
        if let Some(name) = patch.display_name {
            self.display_name = name.trim().to_string();
        }
        if let Some(url) = patch.photo_url {
            let url = url.trim();
            self.photo_url = (!url.is_empty()).then(|| url.to_string());
        }
        if let Some(scenarios) = patch.safety_scenarios {
            self.safety_scenarios = scenarios.into_iter().collect();
        }
        if let Some(consent) = patch.location_consent {
            self.location_consent = consent;
        }
    }

    pub fn notifications_enabled(&self) -> bool {
        self.notifications == Some(PermissionOutcome::Granted)
    }

    /// Achievements this form currently earns.
    pub fn milestones(&self) -> Vec<&'static str> {
        let mut earned = Vec::new();
        if !self.display_name.is_empty() {
            earned.push(ids::PROFILE_STARTED);
        }
        if self.photo_url.is_some() {
            earned.push(ids::PHOTO_ADDED);
        }
        if !self.safety_scenarios.is_empty() {
            earned.push(ids::SCENARIOS_CHOSEN);
        }
        if self.notifications_enabled() {
            earned.push(ids::ALERTS_READY);
        }
        earned
    }
}
