//! The first-run onboarding deck.

use serde::{Deserialize, Serialize};

use crate::step::{Step, StepContent};
use crate::transition::TransitionEffect;

/// Slides of the onboarding deck, in presentation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slide {
    Welcome,
    Profile,
    Photo,
    Scenarios,
    Notifications,
    Besties,
    Ready,
}

impl Slide {
    pub const ALL: [Slide; 7] = [
        Slide::Welcome,
        Slide::Profile,
        Slide::Photo,
        Slide::Scenarios,
        Slide::Notifications,
        Slide::Besties,
        Slide::Ready,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Self::Welcome => "welcome",
            Self::Profile => "profile",
            Self::Photo => "photo",
            Self::Scenarios => "scenarios",
            Self::Notifications => "notifications",
            Self::Besties => "besties",
            Self::Ready => "ready",
        }
    }

    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.id() == id)
    }

    /// XP for leaving this slide (for `Ready`, for finishing the deck).
    pub fn reward(&self) -> u32 {
        match self {
            Self::Welcome => 10,
            Self::Profile => 20,
            Self::Photo => 15,
            Self::Scenarios => 20,
            Self::Notifications => 15,
            Self::Besties => 20,
            Self::Ready => 50,
        }
    }

    /// Effect used when leaving this slide, if it has a signature one.
    pub fn exit_effect(&self) -> Option<TransitionEffect> {
        match self {
            Self::Profile => Some(TransitionEffect::FlyWithElement),
            Self::Photo | Self::Notifications => Some(TransitionEffect::Flip3d),
            Self::Besties => Some(TransitionEffect::Explode),
            Self::Welcome | Self::Scenarios | Self::Ready => None,
        }
    }

    fn content(&self) -> StepContent {
        match self {
            Self::Welcome => StepContent::new(
                "Welcome to Besties",
                "Check in before you head out. If you don't check back, your circle hears about it.",
            ),
            Self::Profile => StepContent::new(
                "What should we call you?",
                "Your besties see this name on every alert.",
            ),
            Self::Photo => StepContent::new(
                "Add a photo",
                "A recent photo helps your circle describe you if they ever need to.",
            ),
            Self::Scenarios => StepContent::new(
                "When do you want backup?",
                "Pick the moments you'd like a safety net for.",
            )
            .with_extra(serde_json::json!({ "options": SAFETY_SCENARIOS })),
            Self::Notifications => StepContent::new(
                "Stay in the loop",
                "Turn on notifications so check-in reminders reach you. You can skip this.",
            ),
            Self::Besties => StepContent::new(
                "Build your circle",
                "Besties are the people alerted when a check-in is missed.",
            ),
            Self::Ready => StepContent::new("You're all set", "Start your first check-in anytime."),
        }
    }
}

impl std::fmt::Display for Slide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Scenario choices offered on the scenarios slide.
pub const SAFETY_SCENARIOS: [&str; 6] = [
    "first_date",
    "walking_home",
    "rideshare",
    "solo_travel",
    "night_out",
    "outdoor_adventure",
];

/// The deck as sequencer steps.
pub fn default_deck() -> Vec<Step> {
    Slide::ALL
        .iter()
        .enumerate()
        .map(|(i, slide)| {
            Step::new(slide.id(), i as i32)
                .with_reward(slide.reward())
                .with_content(slide.content())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deck_matches_slide_order() {
        let deck = default_deck();
        assert_eq!(deck.len(), Slide::ALL.len());
        for (step, slide) in deck.iter().zip(Slide::ALL) {
            assert_eq!(Slide::from_id(&step.id), Some(slide));
            assert_eq!(step.reward, slide.reward());
            assert!(step.anchor.is_none());
        }
    }

    #[test]
    fn scenario_options_ride_along_in_content() {
        let deck = default_deck();
        let scenarios = deck.iter().find(|s| s.id == "scenarios").unwrap();
        let options = scenarios.content.extra["options"].as_array().unwrap();
        assert_eq!(options.len(), SAFETY_SCENARIOS.len());
    }

    #[test]
    fn unknown_slide_id() {
        assert_eq!(Slide::from_id("nope"), None);
    }
}
