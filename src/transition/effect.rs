//! Transition effects and their handler table.

use std::str::FromStr;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::locator::geometry::Rect;

/// Named visual hand-off between two steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TransitionEffect {
    #[default]
    #[serde(rename = "slide")]
    Slide,
    #[serde(rename = "fly-with-element")]
    FlyWithElement,
    #[serde(rename = "flip-3d")]
    Flip3d,
    #[serde(rename = "explode")]
    Explode,
}

impl TransitionEffect {
    pub const ALL: [TransitionEffect; 4] = [
        TransitionEffect::Slide,
        TransitionEffect::FlyWithElement,
        TransitionEffect::Flip3d,
        TransitionEffect::Explode,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Slide => "slide",
            Self::FlyWithElement => "fly-with-element",
            Self::Flip3d => "flip-3d",
            Self::Explode => "explode",
        }
    }

    /// How long the sequencer waits before the transition counts as done.
    pub fn duration(&self) -> Duration {
        match self {
            Self::Slide => Duration::from_millis(500),
            Self::FlyWithElement => Duration::from_millis(700),
            Self::Flip3d => Duration::from_millis(600),
            Self::Explode => Duration::from_millis(650),
        }
    }

    /// Handler that builds this effect's plan.
    pub fn handler(&self) -> EffectHandler {
        match self {
            Self::Slide => slide,
            Self::FlyWithElement => fly_with_element,
            Self::Flip3d => flip_3d,
            Self::Explode => explode,
        }
    }

    pub fn plan(&self, outgoing: Rect, incoming: Rect) -> EffectPlan {
        (self.handler())(*self, outgoing, incoming)
    }
}

impl std::fmt::Display for TransitionEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransitionEffect {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == s.trim())
            .ok_or_else(|| ConfigError::UnknownEffect(s.to_string()))
    }
}

/// Visual state applied to one step region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RegionStyle {
    pub visible: bool,
    pub opacity: f64,
    pub translate_x: f64,
    pub translate_y: f64,
    pub scale: f64,
    pub rotate_y_deg: f64,
    /// Animation length for reaching this style; zero snaps.
    pub transition_ms: u64,
}

impl RegionStyle {
    /// Fully shown, untransformed.
    pub fn resting() -> Self {
        Self {
            visible: true,
            opacity: 1.0,
            translate_x: 0.0,
            translate_y: 0.0,
            scale: 1.0,
            rotate_y_deg: 0.0,
            transition_ms: 0,
        }
    }

    pub fn hidden() -> Self {
        Self {
            visible: false,
            opacity: 0.0,
            ..Self::resting()
        }
    }

    fn animated(mut self, duration: Duration) -> Self {
        self.transition_ms = duration.as_millis() as u64;
        self
    }
}

/// Particle style requested from the effects capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ParticleKind {
    Spark,
    Confetti,
}

/// One fire-and-forget particle burst.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Burst {
    pub x: f64,
    pub y: f64,
    pub count: u32,
    pub kind: ParticleKind,
}

/// Everything the coordinator needs to play one effect.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectPlan {
    pub effect: TransitionEffect,
    pub duration: Duration,
    pub outgoing: RegionStyle,
    pub incoming_from: RegionStyle,
    pub incoming_to: RegionStyle,
    pub bursts: Vec<Burst>,
}

pub type EffectHandler = fn(TransitionEffect, Rect, Rect) -> EffectPlan;

fn slide(effect: TransitionEffect, outgoing: Rect, incoming: Rect) -> EffectPlan {
    let d = effect.duration();
    EffectPlan {
        effect,
        duration: d,
        outgoing: RegionStyle {
            opacity: 0.0,
            translate_x: -outgoing.width,
            ..RegionStyle::resting()
        }
        .animated(d),
        incoming_from: RegionStyle {
            opacity: 0.0,
            translate_x: incoming.width,
            ..RegionStyle::resting()
        },
        incoming_to: RegionStyle::resting().animated(d),
        bursts: Vec::new(),
    }
}

fn fly_with_element(effect: TransitionEffect, outgoing: Rect, incoming: Rect) -> EffectPlan {
    let d = effect.duration();
    EffectPlan {
        effect,
        duration: d,
        // The old card shrinks toward where the new one lands.
        outgoing: RegionStyle {
            opacity: 0.0,
            translate_x: incoming.left - outgoing.left,
            translate_y: incoming.top - outgoing.top,
            scale: 0.3,
            ..RegionStyle::resting()
        }
        .animated(d),
        incoming_from: RegionStyle {
            opacity: 0.0,
            scale: 0.8,
            ..RegionStyle::resting()
        },
        incoming_to: RegionStyle::resting().animated(d),
        bursts: Vec::new(),
    }
}

fn flip_3d(effect: TransitionEffect, _outgoing: Rect, _incoming: Rect) -> EffectPlan {
    let d = effect.duration();
    EffectPlan {
        effect,
        duration: d,
        outgoing: RegionStyle {
            opacity: 0.0,
            rotate_y_deg: 90.0,
            ..RegionStyle::resting()
        }
        .animated(d / 2),
        incoming_from: RegionStyle {
            opacity: 0.0,
            rotate_y_deg: -90.0,
            ..RegionStyle::resting()
        },
        incoming_to: RegionStyle::resting().animated(d),
        bursts: Vec::new(),
    }
}

fn explode(effect: TransitionEffect, outgoing: Rect, _incoming: Rect) -> EffectPlan {
    let d = effect.duration();
    let (cx, cy) = outgoing.center();
    let mut rng = rand::thread_rng();
    let jitter_x = (outgoing.width / 4.0).max(1.0);
    let jitter_y = (outgoing.height / 4.0).max(1.0);

    let mut bursts = vec![Burst {
        x: cx,
        y: cy,
        count: 40,
        kind: ParticleKind::Spark,
    }];
    for _ in 0..2 {
        bursts.push(Burst {
            x: cx + rng.gen_range(-jitter_x..jitter_x),
            y: cy + rng.gen_range(-jitter_y..jitter_y),
            count: 15,
            kind: ParticleKind::Spark,
        });
    }

    EffectPlan {
        effect,
        duration: d,
        outgoing: RegionStyle {
            opacity: 0.0,
            scale: 1.4,
            ..RegionStyle::resting()
        }
        .animated(d / 2),
        incoming_from: RegionStyle {
            opacity: 0.0,
            ..RegionStyle::resting()
        },
        incoming_to: RegionStyle::resting().animated(d),
        bursts,
    }
}
