//! Besties guide — the guided-experience engine behind first-run onboarding
//! and the interactive product tour.

pub mod celebrate;
pub mod config;
pub mod error;
pub mod events;
pub mod gamification;
pub mod locator;
pub mod navigation;
pub mod onboarding;
pub mod profile;
pub mod sequencer;
pub mod services;
pub mod session;
pub mod step;
pub mod storage;
pub mod tour;
pub mod transition;

pub use error::{Error, Result};
