//! Transition coordinator — plays one effect between two step regions.
//!
//! Assumes at most one call in flight per sequencer; the sequencer's
//! single-flight guard enforces that, so there is no locking here.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::effect::{RegionStyle, TransitionEffect};
use super::stage::{Effects, Stage};
use crate::step::Step;

/// What actually happened during a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionReport {
    Animated {
        effect: TransitionEffect,
        duration: Duration,
    },
    /// A region was missing, so the switch happened without animation.
    Instant,
}

/// Runs transition effects against a [`Stage`].
#[derive(Clone)]
pub struct TransitionCoordinator {
    stage: Arc<dyn Stage>,
    effects: Arc<dyn Effects>,
}

impl TransitionCoordinator {
    pub fn new(stage: Arc<dyn Stage>, effects: Arc<dyn Effects>) -> Self {
        Self { stage, effects }
    }

    pub fn effects(&self) -> &Arc<dyn Effects> {
        &self.effects
    }

    /// Snap straight to `incoming`, hiding `outgoing`. Used for back/jump
    /// and as the fallback when a region is not mounted.
    pub fn switch(&self, outgoing: &Step, incoming: &Step) {
        self.stage.apply(&outgoing.id, &RegionStyle::hidden());
        self.stage.apply(&incoming.id, &RegionStyle::resting());
    }

    /// Play `effect` from `outgoing` to `incoming` and resolve once it is
    /// visually complete.
    pub async fn run(
        &self,
        effect: TransitionEffect,
        outgoing: &Step,
        incoming: &Step,
    ) -> TransitionReport {
        let (Some(from), Some(to)) = (
            self.stage.region(&outgoing.id),
            self.stage.region(&incoming.id),
        ) else {
            debug!(
                from = %outgoing.id,
                to = %incoming.id,
                "Step region not mounted; switching without animation"
            );
            self.switch(outgoing, incoming);
            return TransitionReport::Instant;
        };

        let plan = effect.plan(from, to);
        debug!(effect = %effect, from = %outgoing.id, to = %incoming.id, "Transition started");

        self.stage.apply(&incoming.id, &plan.incoming_from);
        self.stage.apply(&outgoing.id, &plan.outgoing);
        self.stage.apply(&incoming.id, &plan.incoming_to);
        for burst in &plan.bursts {
            self.effects.burst(burst.x, burst.y, burst.count, burst.kind);
        }

        tokio::time::sleep(plan.duration).await;

        self.stage.apply(&outgoing.id, &RegionStyle::hidden());
        self.stage.apply(&incoming.id, &RegionStyle::resting());

        TransitionReport::Animated {
            effect,
            duration: plan.duration,
        }
    }
}
