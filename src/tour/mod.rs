//! Interactive tour — highlights live interface elements one stop at a time.

pub mod controller;
pub mod steps;

pub use controller::{TourController, TourSummary};
pub use steps::{TourPlan, default_attachments, default_tour, targets};
