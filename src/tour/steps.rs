//! The default in-product tour and its attachment table.

use crate::error::ConfigError;
use crate::locator::TourAttachments;
use crate::step::{Anchor, Step, StepContent};

/// Semantic ids the tour anchors to.
pub mod targets {
    pub const START_CHECK_IN: &str = "start-check-in";
    pub const ACTIVE_CHECK_INS: &str = "active-check-ins";
    pub const BESTIE_CIRCLE: &str = "bestie-circle";
    pub const ADD_BESTIE: &str = "add-bestie";
    pub const SAFETY_TOOLS: &str = "safety-tools";
    pub const PROFILE_MENU: &str = "profile-menu";
}

/// A tour: its stops plus the attachment table its anchors rely on.
#[derive(Debug, Clone)]
pub struct TourPlan {
    pub steps: Vec<Step>,
    pub attachments: TourAttachments,
}

impl TourPlan {
    pub fn new(steps: Vec<Step>, attachments: TourAttachments) -> Self {
        Self { steps, attachments }
    }

    /// The built-in product tour.
    pub fn standard() -> Result<Self, ConfigError> {
        Ok(Self::new(default_tour(), default_attachments()?))
    }
}

/// Selector table applied to the live surface before the tour starts.
pub fn default_attachments() -> Result<TourAttachments, ConfigError> {
    TourAttachments::new()
        .attach(
            targets::START_CHECK_IN,
            &["[data-action=\"start-check-in\"]", "#create-checkin", ".checkin-fab"],
        )?
        .attach(
            targets::ACTIVE_CHECK_INS,
            &["#active-checkins", ".checkin-list"],
        )?
        .attach(
            targets::BESTIE_CIRCLE,
            &["#bestie-circle", ".besties-grid", "[data-section=\"besties\"]"],
        )?
        .attach(targets::ADD_BESTIE, &["#add-bestie", ".add-bestie-button"])?
        .attach(
            targets::SAFETY_TOOLS,
            &["#safety-tools", "[data-section=\"safety-tools\"]"],
        )?
        .attach(
            targets::PROFILE_MENU,
            &["#profile-menu", ".nav-profile", ".avatar-button"],
        )
}

/// Tour stops in order.
pub fn default_tour() -> Vec<Step> {
    vec![
        Step::new("tour-welcome", 0)
            .with_reward(5)
            .with_route("/dashboard")
            .with_content(StepContent::new(
                "Quick tour",
                "Here's where everything lives. Skip anytime.",
            )),
        Step::new("tour-start-check-in", 1)
            .with_reward(10)
            .with_route("/dashboard")
            .with_anchor(Anchor::attachment(targets::START_CHECK_IN))
            .with_content(StepContent::new(
                "Start a check-in",
                "Heading out? Tell us when you expect to be back.",
            )),
        Step::new("tour-active-check-ins", 2)
            .with_reward(10)
            .with_route("/dashboard")
            .with_anchor(Anchor::attachment(targets::ACTIVE_CHECK_INS))
            .with_content(StepContent::new(
                "Your check-ins",
                "Running check-ins show up here. Tap one to extend or finish it.",
            )),
        Step::new("tour-bestie-circle", 3)
            .with_reward(10)
            .with_route("/besties")
            .with_anchor(Anchor::attachment(targets::BESTIE_CIRCLE))
            .with_content(StepContent::new(
                "Your circle",
                "These are the people alerted if you miss a check-in.",
            )),
        Step::new("tour-add-bestie", 4)
            .with_reward(10)
            .with_route("/besties")
            .with_anchor(Anchor::attachment(targets::ADD_BESTIE))
            .with_content(StepContent::new(
                "Invite a bestie",
                "Send an invite by phone or email.",
            )),
        Step::new("tour-safety-tools", 5)
            .with_reward(10)
            .with_route("/dashboard")
            .with_anchor(Anchor::attachment(targets::SAFETY_TOOLS))
            .with_content(StepContent::new(
                "Safety tools",
                "Fake calls, quick alerts, and emergency numbers.",
            )),
        Step::new("tour-profile", 6)
            .with_reward(10)
            .with_route("/profile")
            .with_anchor(Anchor::attachment(targets::PROFILE_MENU))
            .with_content(StepContent::new(
                "Your profile",
                "Update your photo and notification settings here.",
            )),
        Step::new("tour-done", 7).with_reward(25).with_content(StepContent::new(
            "That's the tour",
            "You can replay it from settings.",
        )),
    ]
}
