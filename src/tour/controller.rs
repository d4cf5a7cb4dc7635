//! TourController — the live, in-product tour.
//!
//! Wraps the step sequencer for steps bound to real interface elements.
//! Activating a step navigates to its route (when it has one), waits for the
//! page to settle, re-applies the attachment table, and starts tracking the
//! step's anchor. Only one tracker is alive at a time.

use std::sync::{Arc, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::steps::TourPlan;
use crate::config::{AnchorTimeoutPolicy, GuideConfig};
use crate::error::SequenceError;
use crate::gamification::catalog::ids;
use crate::gamification::{AchievementCatalog, GamificationLedger, GamificationState};
use crate::locator::{
    Surface, SurfaceChange, TargetLocator, TargetStatus, TargetTracking, TargetView,
    TourAttachments,
};
use crate::profile::ProfileUpdate;
use crate::sequencer::{AdvanceOutcome, MoveOutcome, StepSequencer};
use crate::services::GuideServices;
use crate::session::SessionState;
use crate::transition::TransitionCoordinator;

/// How a tour session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TourSummary {
    pub gamification: GamificationState,
    pub skipped: bool,
    /// Whether the profile write succeeded.
    pub persisted: bool,
}

/// Drives a tour session against a live surface.
pub struct TourController {
    user_id: String,
    sequencer: StepSequencer,
    locator: TargetLocator,
    attachments: TourAttachments,
    services: GuideServices,
    navigation_settle: Duration,
    auto_advance: bool,
    tracking: Mutex<Option<TargetTracking>>,
    last_route: Mutex<Option<String>>,
    summary: Mutex<Option<TourSummary>>,
    timeouts: mpsc::UnboundedSender<usize>,
    background: Vec<JoinHandle<()>>,
}

impl TourController {
    /// Start the tour unless it already ran for this client or user.
    ///
    /// A returning user's stored XP and achievements seed the session ledger.
    /// The first step is activated before this returns.
    pub async fn launch(
        user_id: impl Into<String>,
        plan: TourPlan,
        config: &GuideConfig,
        coordinator: TransitionCoordinator,
        surface: Arc<dyn Surface>,
        services: GuideServices,
    ) -> Result<Option<Arc<Self>>, crate::Error> {
        let user_id = user_id.into();
        let flags = services.flags.load().await?;
        if !flags.should_launch_tour() {
            info!(user_id = %user_id, "Tour already completed on this client");
            return Ok(None);
        }

        let profile = match services.profiles.read_profile(&user_id).await {
            Ok(profile) => profile,
            Err(e) => {
                warn!(user_id = %user_id, "Failed to read profile; starting tour fresh: {}", e);
                None
            }
        };
        if profile.as_ref().is_some_and(|p| p.tour_completed) {
            info!(user_id = %user_id, "Tour already completed for this user");
            if let Err(e) = services.flags.mark_tour_completed().await {
                warn!("Failed to sync tour completion flag: {}", e);
            }
            return Ok(None);
        }

        let mut ledger = GamificationLedger::new(
            Arc::new(AchievementCatalog::standard()),
            config.achievement_bonus,
        );
        if let Some(profile) = profile {
            ledger = ledger.with_history(profile.xp, profile.achievements);
        }
        let sequencer = StepSequencer::new(plan.steps, config, coordinator, ledger)?;

        let report = plan.attachments.apply(surface.as_ref());
        debug!(
            attached = report.attached.len(),
            missing = report.missing.len(),
            "Applied tour attachments"
        );

        let locator = TargetLocator::new(Arc::clone(&surface), config);
        let auto_advance = matches!(config.anchor_timeout, AnchorTimeoutPolicy::SkipAfter(_));
        let navigation_settle = config.navigation_settle;
        let attachments = plan.attachments;

        let controller = Arc::new_cyclic(|weak: &Weak<Self>| {
            let (timeouts, timeout_rx) = mpsc::unbounded_channel();
            let background = vec![
                tokio::spawn(auto_advance_loop(weak.clone(), timeout_rx)),
                tokio::spawn(reattach_loop(Arc::clone(&surface), attachments.clone())),
            ];
            Self {
                user_id,
                sequencer,
                locator,
                attachments,
                services,
                navigation_settle,
                auto_advance,
                tracking: Mutex::new(None),
                last_route: Mutex::new(None),
                summary: Mutex::new(None),
                timeouts,
                background,
            }
        });

        info!(
            user_id = %controller.user_id,
            session_id = %controller.sequencer.session_id(),
            steps = controller.sequencer.len(),
            "Tour started"
        );
        controller.activate(0).await;
        Ok(Some(controller))
    }

    pub fn sequencer(&self) -> &StepSequencer {
        &self.sequencer
    }

    pub async fn snapshot(&self) -> SessionState {
        self.sequencer.snapshot().await
    }

    /// Latest geometry for the active step.
    pub async fn view(&self) -> Option<TargetView> {
        self.tracking.lock().await.as_ref().map(|t| t.current())
    }

    /// Receiver for re-rendering the spotlight on every geometry change.
    pub async fn subscribe_view(&self) -> Option<watch::Receiver<TargetView>> {
        self.tracking.lock().await.as_ref().map(|t| t.subscribe())
    }

    /// Wait until the active step's anchor resolves or gives up.
    pub async fn settled(&self) -> Option<TargetView> {
        let mut rx = self.subscribe_view().await?;
        if let Ok(view) = rx.wait_for(TargetView::is_settled).await {
            return Some(view.clone());
        }
        let view = rx.borrow().clone();
        Some(view)
    }

    /// Advance to the next stop.
    pub async fn next(&self) -> AdvanceOutcome {
        let outcome = self.sequencer.advance(None).await;
        if let AdvanceOutcome::Advanced { to, .. } = outcome {
            if to * 2 >= self.sequencer.len() {
                self.unlock_quiet(ids::TOUR_EXPLORER).await;
            }
            self.activate(to).await;
        }
        outcome
    }

    pub async fn back(&self) -> MoveOutcome {
        let outcome = self.sequencer.back().await;
        if let MoveOutcome::Moved { to, .. } = outcome {
            self.activate(to).await;
        }
        outcome
    }

    pub async fn jump_to(&self, index: usize) -> Result<MoveOutcome, SequenceError> {
        let outcome = self.sequencer.jump_to(index).await?;
        if let MoveOutcome::Moved { to, .. } = outcome {
            self.activate(to).await;
        }
        Ok(outcome)
    }

    /// Navigate (if needed), let the page settle, then track the step.
    async fn activate(&self, index: usize) {
        self.tracking.lock().await.take();
        let step = self.sequencer.steps()[index].clone();

        if let Some(route) = &step.route {
            let navigate = {
                let mut last = self.last_route.lock().await;
                let changed = last.as_deref() != Some(route.as_str());
                *last = Some(route.clone());
                changed
            };
            if navigate {
                self.services.navigator.navigate_to(route);
                tokio::time::sleep(self.navigation_settle).await;
            }
        }

        let mut slot = self.tracking.lock().await;
        if self.sequencer.is_ended() || self.sequencer.current_index().await != index {
            debug!(step_id = %step.id, index, "Dropping stale tour activation");
            return;
        }
        self.attachments.apply(self.locator.surface().as_ref());
        let tracking = self.locator.track(&step);

        if self.auto_advance && step.anchor.is_some() {
            let mut rx = tracking.subscribe();
            let timeouts = self.timeouts.clone();
            tokio::spawn(async move {
                let timed_out = rx
                    .wait_for(|view| view.status == TargetStatus::TimedOut)
                    .await
                    .is_ok();
                if timed_out {
                    let _ = timeouts.send(index);
                }
            });
        }

        debug!(step_id = %step.id, index, "Tour step active");
        *slot = Some(tracking);
    }

    async fn on_anchor_timeout(&self, index: usize) {
        if self.sequencer.is_ended() || self.sequencer.current_index().await != index {
            return;
        }
        let step_id = &self.sequencer.steps()[index].id;
        warn!(step_id = %step_id, index, "Tour anchor never resolved; moving on");
        if index + 1 == self.sequencer.len() {
            if let Err(e) = self.finish().await {
                warn!("Failed to finish tour after anchor timeout: {}", e);
            }
        } else {
            self.next().await;
        }
    }

    async fn unlock_quiet(&self, id: &str) {
        if let Err(e) = self.sequencer.unlock(id).await {
            warn!("Skipping tour achievement {}: {}", id, e);
        }
    }

    /// Finish the tour from its final stop. Repeat calls return the first
    /// summary.
    pub async fn finish(&self) -> Result<TourSummary, SequenceError> {
        let mut summary = self.summary.lock().await;
        if let Some(existing) = summary.as_ref() {
            return Ok(existing.clone());
        }
        self.sequencer.finish().await?;
        self.unlock_quiet(ids::TOUR_COMPLETE).await;

        let gamification = self.sequencer.gamification().await;
        let persisted = self
            .record_completion(ProfileUpdate {
                xp: Some(gamification.xp),
                level: Some(gamification.level),
                achievements: Some(gamification.achievements.clone()),
                tour_completed: Some(true),
                ..Default::default()
            })
            .await;

        info!(user_id = %self.user_id, xp = gamification.xp, persisted, "Tour finished");
        let finished = TourSummary {
            gamification,
            skipped: false,
            persisted,
        };
        *summary = Some(finished.clone());
        drop(summary);
        self.teardown().await;
        Ok(finished)
    }

    /// End the tour right away. Always available, even mid-transition.
    ///
    /// Returns `None` if the tour had already ended.
    pub async fn skip(&self) -> Option<TourSummary> {
        if !self.sequencer.skip() {
            return None;
        }
        self.teardown().await;
        let persisted = self
            .record_completion(ProfileUpdate {
                tour_completed: Some(true),
                ..Default::default()
            })
            .await;
        let skipped = TourSummary {
            gamification: self.sequencer.gamification().await,
            skipped: true,
            persisted,
        };
        *self.summary.lock().await = Some(skipped.clone());
        Some(skipped)
    }

    pub async fn summary(&self) -> Option<TourSummary> {
        self.summary.lock().await.clone()
    }

    async fn teardown(&self) {
        self.sequencer.end();
        self.tracking.lock().await.take();
    }

    /// Write to the profile store and set the local flag. The flag is set
    /// even when the write fails.
    async fn record_completion(&self, update: ProfileUpdate) -> bool {
        let persisted = match self
            .services
            .profiles
            .write_profile(&self.user_id, update)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                warn!(user_id = %self.user_id, "Failed to record tour completion: {}", e);
                false
            }
        };
        if let Err(e) = self.services.flags.mark_tour_completed().await {
            warn!("Failed to persist tour completion flag: {}", e);
        }
        persisted
    }
}

impl Drop for TourController {
    fn drop(&mut self) {
        for handle in &self.background {
            handle.abort();
        }
    }
}

async fn auto_advance_loop(controller: Weak<TourController>, mut rx: mpsc::UnboundedReceiver<usize>) {
    while let Some(index) = rx.recv().await {
        let Some(controller) = controller.upgrade() else {
            break;
        };
        controller.on_anchor_timeout(index).await;
    }
}

/// Re-tag late-rendered elements whenever the surface mutates.
async fn reattach_loop(surface: Arc<dyn Surface>, attachments: TourAttachments) {
    let mut changes = surface.subscribe();
    loop {
        match changes.recv().await {
            Ok(SurfaceChange::Mutated) | Err(broadcast::error::RecvError::Lagged(_)) => {
                attachments.apply(surface.as_ref());
            }
            Ok(_) => {}
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::{Rect, Size, VirtualSurface};
    use crate::navigation::RecordingNavigator;
    use crate::profile::{MemoryProfileStore, Profile, ProfileStore};
    use crate::storage::{FlagStore, MemoryStorage};
    use crate::step::{Anchor, Step};
    use crate::transition::{NoopEffects, VirtualStage};

    struct Harness {
        surface: Arc<VirtualSurface>,
        profiles: Arc<MemoryProfileStore>,
        flags: FlagStore,
        navigator: Arc<RecordingNavigator>,
    }

    impl Harness {
        fn new() -> Self {
            Self {
                surface: Arc::new(VirtualSurface::new(Size::new(1200.0, 800.0))),
                profiles: Arc::new(MemoryProfileStore::new()),
                flags: FlagStore::new(Arc::new(MemoryStorage::new())),
                navigator: Arc::new(RecordingNavigator::new()),
            }
        }

        async fn launch(&self, plan: TourPlan, config: GuideConfig) -> Option<Arc<TourController>> {
            let services =
                GuideServices::new(self.profiles.clone(), self.flags.clone(), self.navigator.clone());
            let coordinator =
                TransitionCoordinator::new(Arc::new(VirtualStage::new()), Arc::new(NoopEffects));
            TourController::launch("u1", plan, &config, coordinator, self.surface.clone(), services)
                .await
                .unwrap()
        }
    }

    fn plan() -> TourPlan {
        let attachments = TourAttachments::new()
            .attach("start-check-in", &["#create-checkin"])
            .unwrap()
            .attach("bestie-circle", &["#bestie-circle"])
            .unwrap();
        let steps = vec![
            Step::new("intro", 0).with_reward(5).with_route("/dashboard"),
            Step::new("checkin", 1)
                .with_reward(10)
                .with_route("/dashboard")
                .with_anchor(Anchor::attachment("start-check-in")),
            Step::new("circle", 2)
                .with_reward(10)
                .with_route("/besties")
                .with_anchor(Anchor::attachment("bestie-circle")),
            Step::new("done", 3).with_reward(20),
        ];
        TourPlan::new(steps, attachments)
    }

    #[tokio::test(start_paused = true)]
    async fn navigates_once_per_route_and_anchors_steps() {
        let h = Harness::new();
        h.surface.mount(&["#create-checkin"], Rect::new(600.0, 1000.0, 56.0, 56.0));
        let tour = h.launch(plan(), GuideConfig::default()).await.unwrap();
        assert_eq!(h.navigator.paths(), vec!["/dashboard".to_string()]);
        assert_eq!(tour.settled().await.unwrap().status, TargetStatus::Unanchored);

        tour.next().await;
        let view = tour.settled().await.unwrap();
        assert_eq!(view.step_id, "checkin");
        assert_eq!(view.status, TargetStatus::Anchored);
        // Same route: no second navigation.
        assert_eq!(h.navigator.paths().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn late_rendered_element_is_tagged_and_found() {
        let h = Harness::new();
        let tour = h.launch(plan(), GuideConfig::default()).await.unwrap();
        tour.next().await;
        tour.next().await;
        assert_eq!(
            h.navigator.paths(),
            vec!["/dashboard".to_string(), "/besties".to_string()]
        );
        assert_eq!(tour.view().await.unwrap().status, TargetStatus::Searching);

        h.surface.mount(&["#bestie-circle"], Rect::new(120.0, 40.0, 600.0, 300.0));
        let view = tour.settled().await.unwrap();
        assert_eq!(view.step_id, "circle");
        assert_eq!(view.status, TargetStatus::Anchored);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_records_completion_and_stops_tracking() {
        let h = Harness::new();
        let tour = h.launch(plan(), GuideConfig::default()).await.unwrap();
        tour.next().await;

        let summary = tour.skip().await.unwrap();
        assert!(summary.skipped);
        assert!(summary.persisted);
        assert!(tour.skip().await.is_none());
        assert!(tour.view().await.is_none());
        assert_eq!(tour.next().await, AdvanceOutcome::Ended);

        assert!(h.flags.load().await.unwrap().tour_completed);
        let profile = h.profiles.read_profile("u1").await.unwrap().unwrap();
        assert!(profile.tour_completed);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_anchor_auto_advances_under_skip_policy() {
        let h = Harness::new();
        let config = GuideConfig {
            anchor_timeout: AnchorTimeoutPolicy::SkipAfter(Duration::from_secs(2)),
            ..GuideConfig::default()
        };
        let tour = h.launch(plan(), config).await.unwrap();
        tour.next().await;
        assert_eq!(tour.sequencer().current_index().await, 1);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert_eq!(tour.sequencer().current_index().await, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn finish_persists_and_unions_history() {
        let h = Harness::new();
        h.profiles
            .insert(Profile {
                user_id: "u1".into(),
                xp: 120,
                level: 2,
                achievements: [ids::ONBOARDING_COMPLETE.to_string()].into_iter().collect(),
                ..Default::default()
            })
            .await;
        h.surface.mount(&["#create-checkin"], Rect::new(600.0, 1000.0, 56.0, 56.0));
        h.surface.mount(&["#bestie-circle"], Rect::new(120.0, 40.0, 600.0, 300.0));

        let tour = h.launch(plan(), GuideConfig::default()).await.unwrap();
        assert_eq!(tour.sequencer().gamification().await.xp, 120);
        while let AdvanceOutcome::Advanced { .. } = tour.next().await {}

        let summary = tour.finish().await.unwrap();
        let g = &summary.gamification;
        assert!(g.achievements.contains(ids::ONBOARDING_COMPLETE));
        assert!(g.achievements.contains(ids::TOUR_EXPLORER));
        assert!(g.achievements.contains(ids::TOUR_COMPLETE));
        // 120 history + 25 from steps left + 20 final + 2 x 25 bonuses.
        assert_eq!(g.xp, 215);

        let profile = h.profiles.read_profile("u1").await.unwrap().unwrap();
        assert!(profile.tour_completed);
        assert_eq!(profile.xp, 215);
        assert_eq!(tour.finish().await.unwrap(), summary);
    }

    #[tokio::test]
    async fn does_not_launch_twice() {
        let h = Harness::new();
        h.flags.mark_tour_completed().await.unwrap();
        assert!(h.launch(plan(), GuideConfig::default()).await.is_none());

        let h = Harness::new();
        h.profiles
            .write_profile(
                "u1",
                ProfileUpdate {
                    tour_completed: Some(true),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(h.launch(plan(), GuideConfig::default()).await.is_none());
        assert!(h.flags.load().await.unwrap().tour_completed);
    }
}
