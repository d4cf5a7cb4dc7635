//! Onboarding — the first-run narrative deck.
//!
//! A fixed slide deck driven by the step sequencer. Slides collect a little
//! profile data (name, photo, safety scenarios, notification consent) and
//! earn milestone achievements along the way. Everything is written to the
//! profile store once, when the user finishes the deck.

pub mod deck;
pub mod form;
pub mod orchestrator;
pub mod routes;

pub use deck::{SAFETY_SCENARIOS, Slide, default_deck};
pub use form::{FormPatch, OnboardingForm};
pub use orchestrator::{CompletionReport, DASHBOARD_ROUTE, OnboardingOrchestrator, OnboardingStatus};
pub use routes::{OnboardingRouteState, onboarding_routes};
