//! Step sequencer — the generic engine behind onboarding and the tour.
//!
//! Owns the ordered step list, the session cursor, and the gamification
//! ledger. At most one transition runs at a time: the `transitioning` flag is
//! claimed with a compare-and-swap before any awaited work starts and is
//! released only after the reward and index update have been applied.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use futures::Stream;
use tokio::sync::{RwLock, broadcast};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info};
use uuid::Uuid;

use crate::celebrate::Celebrations;
use crate::config::GuideConfig;
use crate::error::{LedgerError, SequenceError};
use crate::events::GuideEvent;
use crate::gamification::{GamificationLedger, GamificationState, XpAward};
use crate::session::{Cursor, SessionState};
use crate::step::Step;
use crate::transition::{TransitionCoordinator, TransitionEffect, TransitionReport};

/// Default broadcast channel capacity.
const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Result of `advance`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdvanceOutcome {
    Advanced {
        from: usize,
        to: usize,
        report: TransitionReport,
        /// True when this advance reached the final step.
        completed: bool,
    },
    /// Another transition is in flight; nothing happened.
    Busy,
    /// Already on the final step; nothing happened.
    AtEnd,
    /// The session was skipped or torn down.
    Ended,
}

/// Result of `back` and `jump_to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved { from: usize, to: usize },
    Busy,
    /// Already there (or at index 0 for `back`).
    Unchanged,
    Ended,
}

/// Clears the single-flight flag when the owning operation finishes, even if
/// its future is dropped mid-transition.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Ordered guided sequence with single-flight advancement.
pub struct StepSequencer {
    session_id: Uuid,
    started_at: DateTime<Utc>,
    steps: Arc<[Step]>,
    cursor: RwLock<Cursor>,
    ledger: RwLock<GamificationLedger>,
    transitioning: AtomicBool,
    completed: AtomicBool,
    finished: AtomicBool,
    ended: AtomicBool,
    default_effect: TransitionEffect,
    coordinator: TransitionCoordinator,
    celebrations: Celebrations,
    events: broadcast::Sender<GuideEvent>,
}

impl StepSequencer {
    /// Build a sequencer. Steps are ordered by `order`; ids must be unique.
    pub fn new(
        mut steps: Vec<Step>,
        config: &GuideConfig,
        coordinator: TransitionCoordinator,
        ledger: GamificationLedger,
    ) -> Result<Self, SequenceError> {
        if steps.is_empty() {
            return Err(SequenceError::Empty);
        }
        let mut seen = HashSet::new();
        for step in &steps {
            if !seen.insert(step.id.as_str()) {
                return Err(SequenceError::DuplicateStepId(step.id.clone()));
            }
        }
        steps.sort_by_key(|s| s.order);

        let (events, _rx) = broadcast::channel(DEFAULT_EVENT_CAPACITY);
        let celebrations = Celebrations::new(
            Arc::clone(coordinator.effects()),
            events.clone(),
            config.level_up_celebration,
            config.toast_duration,
        );

        Ok(Self {
            session_id: Uuid::new_v4(),
            started_at: Utc::now(),
            steps: steps.into(),
            cursor: RwLock::new(Cursor::new()),
            ledger: RwLock::new(ledger),
            transitioning: AtomicBool::new(false),
            completed: AtomicBool::new(false),
            finished: AtomicBool::new(false),
            ended: AtomicBool::new(false),
            default_effect: config.default_effect,
            coordinator,
            celebrations,
            events,
        })
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    fn last_index(&self) -> usize {
        self.steps.len() - 1
    }

    pub fn is_transitioning(&self) -> bool {
        self.transitioning.load(Ordering::Acquire)
    }

    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }

    /// Subscribe to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<GuideEvent> {
        self.events.subscribe()
    }

    /// Session events as a stream. Lagged receivers skip missed events.
    pub fn event_stream(&self) -> impl Stream<Item = GuideEvent> + Send + 'static {
        BroadcastStream::new(self.events.subscribe()).filter_map(|e| e.ok())
    }

    pub(crate) fn emit(&self, event: GuideEvent) {
        // Ok if no presentation layer is listening
        let _ = self.events.send(event);
    }

    fn claim_flight(&self) -> Option<FlightGuard<'_>> {
        self.transitioning
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| FlightGuard(&self.transitioning))
    }

    /// The step currently shown.
    pub async fn current(&self) -> Step {
        let index = self.cursor.read().await.current;
        self.steps[index].clone()
    }

    pub async fn current_index(&self) -> usize {
        self.cursor.read().await.current
    }

    pub async fn snapshot(&self) -> SessionState {
        let cursor = self.cursor.read().await;
        SessionState {
            session_id: self.session_id,
            started_at: self.started_at,
            current_index: cursor.current,
            step_count: self.steps.len(),
            transitioning: self.is_transitioning(),
            visited: cursor.visited.clone(),
            completed: self.is_completed(),
            ended: self.is_ended(),
        }
    }

    /// Move to the next step with `effect` (or the configured default).
    ///
    /// The outgoing step's reward is granted after the transition completes,
    /// and only the first time that step is left.
    pub async fn advance(&self, effect: Option<TransitionEffect>) -> AdvanceOutcome {
        if self.is_ended() {
            return AdvanceOutcome::Ended;
        }
        let Some(_flight) = self.claim_flight() else {
            debug!(session_id = %self.session_id, "Advance ignored: transition in flight");
            return AdvanceOutcome::Busy;
        };

        let from = self.cursor.read().await.current;
        if from >= self.last_index() {
            return AdvanceOutcome::AtEnd;
        }
        let to = from + 1;
        let effect = effect.unwrap_or(self.default_effect);

        let report = self
            .coordinator
            .run(effect, &self.steps[from], &self.steps[to])
            .await;

        if self.is_ended() {
            // Skipped while the effect was playing.
            return AdvanceOutcome::Ended;
        }

        let first_visit = self.cursor.write().await.forward();
        let reward = self.steps[from].reward;
        if first_visit && reward > 0 {
            self.award_xp(reward).await;
        }

        info!(
            session_id = %self.session_id,
            from,
            to,
            step_id = %self.steps[to].id,
            effect = %effect,
            "Advanced guided step"
        );
        self.emit(GuideEvent::StepChanged {
            from,
            to,
            step_id: self.steps[to].id.clone(),
        });

        let completed = to == self.last_index() && self.mark_completed();

        AdvanceOutcome::Advanced {
            from,
            to,
            report,
            completed,
        }
    }

    /// Emit `Completed` the first time only. Returns whether this call did.
    fn mark_completed(&self) -> bool {
        if self.completed.swap(true, Ordering::AcqRel) {
            return false;
        }
        info!(session_id = %self.session_id, "Guided session reached its final step");
        self.emit(GuideEvent::Completed {
            session_id: self.session_id,
        });
        true
    }

    /// Step back without animation. Never touches XP or achievements.
    pub async fn back(&self) -> MoveOutcome {
        if self.is_ended() {
            return MoveOutcome::Ended;
        }
        let Some(_flight) = self.claim_flight() else {
            debug!(session_id = %self.session_id, "Back ignored: transition in flight");
            return MoveOutcome::Busy;
        };

        let mut cursor = self.cursor.write().await;
        let from = cursor.current;
        if !cursor.back() {
            return MoveOutcome::Unchanged;
        }
        let to = cursor.current;
        drop(cursor);

        self.coordinator.switch(&self.steps[from], &self.steps[to]);
        debug!(session_id = %self.session_id, from, to, "Stepped back");
        self.emit(GuideEvent::StepChanged {
            from,
            to,
            step_id: self.steps[to].id.clone(),
        });
        MoveOutcome::Moved { from, to }
    }

    /// Jump to index 0 or any index already left via `advance`.
    pub async fn jump_to(&self, index: usize) -> Result<MoveOutcome, SequenceError> {
        if index >= self.steps.len() {
            return Err(SequenceError::IndexOutOfRange {
                index,
                len: self.steps.len(),
            });
        }
        if self.is_ended() {
            return Ok(MoveOutcome::Ended);
        }
        let Some(_flight) = self.claim_flight() else {
            return Ok(MoveOutcome::Busy);
        };

        let mut cursor = self.cursor.write().await;
        if !cursor.can_jump_to(index) {
            return Err(SequenceError::JumpNotAllowed { index });
        }
        let from = cursor.current;
        if from == index {
            return Ok(MoveOutcome::Unchanged);
        }
        cursor.current = index;
        drop(cursor);

        self.coordinator.switch(&self.steps[from], &self.steps[index]);
        debug!(session_id = %self.session_id, from, to = index, "Jumped to step");
        self.emit(GuideEvent::StepChanged {
            from,
            to: index,
            step_id: self.steps[index].id.clone(),
        });
        Ok(MoveOutcome::Moved { from, to: index })
    }

    /// Commit the final step: grants its reward exactly once.
    ///
    /// Returns `Ok(None)` on repeat calls.
    pub async fn finish(&self) -> Result<Option<XpAward>, SequenceError> {
        if self.is_ended() {
            return Err(SequenceError::Ended);
        }
        let last = self.last_index();
        let first = {
            let mut cursor = self.cursor.write().await;
            if cursor.current != last {
                return Err(SequenceError::NotAtFinalStep {
                    index: cursor.current,
                });
            }
            cursor.visited.insert(last)
        };
        if !first || self.finished.swap(true, Ordering::AcqRel) {
            return Ok(None);
        }
        self.mark_completed();

        let reward = self.steps[last].reward;
        Ok(Some(self.award_xp(reward).await))
    }

    /// Terminate the session. Later advance/back/jump calls report `Ended`.
    /// Pending celebration timers are cancelled.
    pub fn end(&self) -> bool {
        let first = !self.ended.swap(true, Ordering::AcqRel);
        if first {
            self.celebrations.shutdown();
        }
        first
    }

    /// Skip: end the session and emit `Skipped`. Always available.
    pub fn skip(&self) -> bool {
        let first = self.end();
        if first {
            info!(session_id = %self.session_id, "Guided session skipped");
            self.emit(GuideEvent::Skipped {
                session_id: self.session_id,
            });
        }
        first
    }

    /// Award XP and fire the matching presentation events.
    pub async fn award_xp(&self, amount: u32) -> XpAward {
        let award = self.ledger.write().await.award_xp(amount);
        self.celebrations.xp_awarded(&award);
        award
    }

    /// Unlock an achievement. Returns `true` only for a fresh unlock.
    pub async fn unlock(&self, id: &str) -> Result<bool, LedgerError> {
        // Check and insert under one write lock.
        let unlocked = self.ledger.write().await.unlock_achievement(id)?;
        match unlocked {
            Some(unlocked) => {
                info!(session_id = %self.session_id, achievement = id, "Achievement unlocked");
                self.celebrations.achievement(&unlocked);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn gamification(&self) -> GamificationState {
        self.ledger.read().await.snapshot()
    }

    pub fn pending_timers(&self) -> usize {
        self.celebrations.pending_timers()
    }
}

impl Drop for StepSequencer {
    fn drop(&mut self) {
        self.celebrations.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gamification::AchievementCatalog;
    use crate::gamification::catalog::ids;
    use crate::locator::geometry::Rect;
    use crate::transition::{NoopEffects, VirtualStage};
    use std::time::Duration;
    use tokio::time::Instant;

    fn steps(rewards: &[u32]) -> Vec<Step> {
        rewards
            .iter()
            .enumerate()
            .map(|(i, r)| Step::new(format!("s{i}"), i as i32).with_reward(*r))
            .collect()
    }

    fn build(rewards: &[u32], mount: bool) -> Arc<StepSequencer> {
        let stage = Arc::new(VirtualStage::new());
        if mount {
            for i in 0..rewards.len() {
                stage.mount(&format!("s{i}"), Rect::new(0.0, 0.0, 400.0, 600.0));
            }
        }
        let coordinator = TransitionCoordinator::new(stage, Arc::new(NoopEffects));
        let ledger = GamificationLedger::new(Arc::new(AchievementCatalog::standard()), 25);
        Arc::new(
            StepSequencer::new(steps(rewards), &GuideConfig::default(), coordinator, ledger)
                .unwrap(),
        )
    }

    #[test]
    fn rejects_empty_and_duplicate_steps() {
        let coordinator = TransitionCoordinator::new(Arc::new(VirtualStage::new()), Arc::new(NoopEffects));
        let ledger = GamificationLedger::new(Arc::new(AchievementCatalog::standard()), 25);
        let err = StepSequencer::new(vec![], &GuideConfig::default(), coordinator.clone(), ledger.clone());
        assert_eq!(err.err(), Some(SequenceError::Empty));

        let dup = vec![Step::new("a", 0), Step::new("a", 1)];
        let err = StepSequencer::new(dup, &GuideConfig::default(), coordinator, ledger);
        assert_eq!(err.err(), Some(SequenceError::DuplicateStepId("a".into())));
    }

    #[tokio::test]
    async fn steps_are_ordered_by_order_field() {
        let coordinator = TransitionCoordinator::new(Arc::new(VirtualStage::new()), Arc::new(NoopEffects));
        let ledger = GamificationLedger::new(Arc::new(AchievementCatalog::standard()), 25);
        let seq = StepSequencer::new(
            vec![Step::new("b", 2), Step::new("a", 1)],
            &GuideConfig::default(),
            coordinator,
            ledger,
        )
        .unwrap();
        assert_eq!(seq.current().await.id, "a");
    }

    #[tokio::test(start_paused = true)]
    async fn reward_policy_for_three_steps() {
        let seq = build(&[10, 20, 30], true);

        assert!(matches!(seq.advance(None).await, AdvanceOutcome::Advanced { to: 1, completed: false, .. }));
        assert!(matches!(seq.advance(None).await, AdvanceOutcome::Advanced { to: 2, completed: true, .. }));
        assert_eq!(seq.advance(None).await, AdvanceOutcome::AtEnd);
        assert_eq!(seq.gamification().await.xp, 30);

        let award = seq.finish().await.unwrap().unwrap();
        assert_eq!(award.amount, 30);
        assert_eq!(seq.gamification().await.xp, 60);
        assert_eq!(seq.finish().await.unwrap(), None);
        assert_eq!(seq.gamification().await.xp, 60);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_advances_are_single_flight() {
        let seq = build(&[10, 20, 30, 40], true);
        let (a, b, c) = tokio::join!(seq.advance(None), seq.advance(None), seq.advance(None));
        let advanced = [&a, &b, &c]
            .iter()
            .filter(|o| matches!(o, AdvanceOutcome::Advanced { .. }))
            .count();
        let busy = [&a, &b, &c]
            .iter()
            .filter(|o| matches!(o, AdvanceOutcome::Busy))
            .count();
        assert_eq!(advanced, 1);
        assert_eq!(busy, 2);
        assert_eq!(seq.current_index().await, 1);
        assert!(!seq.is_transitioning());
        assert_eq!(seq.gamification().await.xp, 10);
    }

    #[tokio::test(start_paused = true)]
    async fn transitioning_flag_spans_the_effect() {
        let seq = build(&[0, 0], true);
        let runner = Arc::clone(&seq);
        let start = Instant::now();
        let handle = tokio::spawn(async move { runner.advance(None).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(seq.is_transitioning());
        assert!(seq.snapshot().await.transitioning);
        assert_eq!(seq.back().await, MoveOutcome::Busy);
        assert_eq!(seq.jump_to(0).await.unwrap(), MoveOutcome::Busy);

        handle.await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(500));
        assert!(!seq.is_transitioning());
    }

    #[tokio::test(start_paused = true)]
    async fn back_then_advance_restores_index_without_xp_change() {
        let seq = build(&[10, 20, 30], true);
        seq.advance(None).await;
        seq.unlock(ids::FIRST_STEP).await.unwrap();
        let before = seq.gamification().await;

        assert_eq!(seq.back().await, MoveOutcome::Moved { from: 1, to: 0 });
        assert!(matches!(seq.advance(None).await, AdvanceOutcome::Advanced { to: 1, .. }));

        assert_eq!(seq.current_index().await, 1);
        assert_eq!(seq.gamification().await, before);
    }

    #[tokio::test]
    async fn back_at_start_is_unchanged() {
        let seq = build(&[10], false);
        assert_eq!(seq.back().await, MoveOutcome::Unchanged);
    }

    #[tokio::test]
    async fn jump_rules() {
        let seq = build(&[1, 2, 3, 4], false);
        seq.advance(None).await;
        seq.advance(None).await;

        assert_eq!(
            seq.jump_to(3).await,
            Err(SequenceError::JumpNotAllowed { index: 3 })
        );
        assert_eq!(
            seq.jump_to(9).await,
            Err(SequenceError::IndexOutOfRange { index: 9, len: 4 })
        );
        assert_eq!(seq.jump_to(0).await, Ok(MoveOutcome::Moved { from: 2, to: 0 }));
        assert_eq!(seq.jump_to(1).await, Ok(MoveOutcome::Moved { from: 0, to: 1 }));
        assert_eq!(seq.jump_to(1).await, Ok(MoveOutcome::Unchanged));
        // Index 2 was shown but never left.
        assert!(seq.jump_to(2).await.is_err());
        assert_eq!(seq.gamification().await.xp, 3);
    }

    #[tokio::test]
    async fn unmounted_regions_switch_instantly() {
        let seq = build(&[5, 5], false);
        match seq.advance(None).await {
            AdvanceOutcome::Advanced { report, .. } => assert_eq!(report, TransitionReport::Instant),
            other => panic!("expected advance, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn completed_fires_once() {
        let seq = build(&[1, 1], false);
        let mut rx = seq.subscribe();
        seq.advance(None).await;
        seq.advance(None).await;
        seq.finish().await.unwrap();

        let mut completed = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, GuideEvent::Completed { .. }) {
                completed += 1;
            }
        }
        assert_eq!(completed, 1);
    }

    #[tokio::test]
    async fn unlock_twice_emits_once() {
        let seq = build(&[0, 0], false);
        let mut rx = seq.subscribe();
        assert!(seq.unlock(ids::FIRST_STEP).await.unwrap());
        assert!(!seq.unlock(ids::FIRST_STEP).await.unwrap());

        let mut unlocked = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, GuideEvent::AchievementUnlocked { .. }) {
                unlocked += 1;
            }
        }
        assert_eq!(unlocked, 1);
        let g = seq.gamification().await;
        assert_eq!(g.achievements.len(), 1);
        assert_eq!(g.xp, 25);
    }

    #[tokio::test]
    async fn skip_ends_the_session() {
        let seq = build(&[1, 1, 1], false);
        assert!(seq.skip());
        assert!(!seq.skip());
        assert_eq!(seq.advance(None).await, AdvanceOutcome::Ended);
        assert_eq!(seq.back().await, MoveOutcome::Ended);
        assert!(seq.snapshot().await.ended);
    }

    #[tokio::test]
    async fn finish_requires_final_step() {
        let seq = build(&[1, 1], false);
        assert_eq!(
            seq.finish().await,
            Err(SequenceError::NotAtFinalStep { index: 0 })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn end_cancels_celebration_timers() {
        let seq = build(&[150, 0], false);
        seq.advance(None).await;
        assert!(seq.pending_timers() > 0);
        seq.end();
        assert_eq!(seq.pending_timers(), 0);
    }
}
