//! Rendering seams for transitions: the step stage and the particle effects
//! capability.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use super::effect::{ParticleKind, RegionStyle};
use crate::locator::geometry::Rect;

/// Where step regions live on screen.
pub trait Stage: Send + Sync {
    /// Rendered bounds of a step's region, or `None` if not mounted yet.
    fn region(&self, step_id: &str) -> Option<Rect>;

    /// Apply a visual state to a step's region.
    fn apply(&self, step_id: &str, style: &RegionStyle);
}

/// Fire-and-forget particle effects. Never awaited, never needed for
/// correctness.
pub trait Effects: Send + Sync {
    fn burst(&self, x: f64, y: f64, count: u32, kind: ParticleKind);

    /// Start the ambient celebration effect (confetti rain).
    fn start(&self);
}

/// Effects capability that does nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEffects;

impl Effects for NoopEffects {
    fn burst(&self, _x: f64, _y: f64, _count: u32, _kind: ParticleKind) {}

    fn start(&self) {}
}

/// Style applications kept by [`VirtualStage::history`].
pub const HISTORY_LIMIT: usize = 64;

/// In-memory stage: regions are registered by the host; applied styles are
/// kept so the current look of each region can be inspected.
#[derive(Debug, Default)]
pub struct VirtualStage {
    regions: Mutex<HashMap<String, Rect>>,
    styles: Mutex<HashMap<String, RegionStyle>>,
    applied: Mutex<VecDeque<(String, RegionStyle)>>,
}

impl VirtualStage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mount(&self, step_id: &str, rect: Rect) {
        self.regions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(step_id.to_string(), rect);
    }

    pub fn unmount(&self, step_id: &str) {
        self.regions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(step_id);
    }

    /// Last style applied to a region.
    pub fn style_of(&self, step_id: &str) -> Option<RegionStyle> {
        self.styles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(step_id)
            .copied()
    }

    /// The most recent style applications, oldest first.
    pub fn history(&self) -> Vec<(String, RegionStyle)> {
        self.applied
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .cloned()
            .collect()
    }
}

impl Stage for VirtualStage {
    fn region(&self, step_id: &str) -> Option<Rect> {
        self.regions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(step_id)
            .copied()
    }

    fn apply(&self, step_id: &str, style: &RegionStyle) {
        self.styles
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(step_id.to_string(), *style);
        let mut applied = self.applied.lock().unwrap_or_else(|e| e.into_inner());
        if applied.len() == HISTORY_LIMIT {
            applied.pop_front();
        }
        applied.push_back((step_id.to_string(), *style));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_is_bounded() {
        let stage = VirtualStage::new();
        for i in 0..HISTORY_LIMIT + 10 {
            stage.apply(&format!("step-{i}"), &RegionStyle::resting());
        }
        let history = stage.history();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].0, "step-10");
        assert_eq!(stage.style_of("step-0"), Some(RegionStyle::resting()));
    }
}
