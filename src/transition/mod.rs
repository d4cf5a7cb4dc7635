//! Transitions — the visual hand-off between consecutive steps.

pub mod coordinator;
pub mod effect;
pub mod stage;

pub use coordinator::{TransitionCoordinator, TransitionReport};
pub use effect::{Burst, EffectPlan, ParticleKind, RegionStyle, TransitionEffect};
pub use stage::{Effects, NoopEffects, Stage, VirtualStage};
