//! OnboardingOrchestrator — drives the narrative deck, owns slide-local form
//! state, and flushes everything to the profile store once at the end.

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use super::deck::{Slide, default_deck};
use super::form::{FormPatch, OnboardingForm};
use crate::config::GuideConfig;
use crate::error::SequenceError;
use crate::gamification::catalog::ids;
use crate::gamification::{AchievementCatalog, GamificationLedger, GamificationState};
use crate::navigation::{PermissionOutcome, PermissionPrompt};
use crate::profile::ProfileUpdate;
use crate::sequencer::{AdvanceOutcome, MoveOutcome, StepSequencer};
use crate::services::GuideServices;
use crate::session::SessionState;
use crate::step::Step;
use crate::transition::{TransitionCoordinator, TransitionEffect};

/// Where the host is sent once onboarding completes.
pub const DASHBOARD_ROUTE: &str = "/dashboard";

/// Outcome of finishing the deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompletionReport {
    pub gamification: GamificationState,
    /// Whether the profile write succeeded.
    pub persisted: bool,
    /// Non-blocking message for the user when the write failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// Onboarding status returned by the REST endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct OnboardingStatus {
    pub slide: String,
    pub session: SessionState,
    pub form: OnboardingForm,
    pub gamification: GamificationState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion: Option<CompletionReport>,
}

/// Coordinates the onboarding deck: sequencing, milestone achievements, and
/// the final profile write.
pub struct OnboardingOrchestrator {
    user_id: String,
    sequencer: StepSequencer,
    form: RwLock<OnboardingForm>,
    services: GuideServices,
    permissions: Arc<dyn PermissionPrompt>,
    completion: Mutex<Option<CompletionReport>>,
}

impl OnboardingOrchestrator {
    pub fn new(
        user_id: impl Into<String>,
        sequencer: StepSequencer,
        services: GuideServices,
        permissions: Arc<dyn PermissionPrompt>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            sequencer,
            form: RwLock::new(OnboardingForm::default()),
            services,
            permissions,
            completion: Mutex::new(None),
        }
    }

    /// Build an orchestrator for the standard deck and catalog.
    pub fn with_deck(
        user_id: impl Into<String>,
        steps: Vec<Step>,
        config: &GuideConfig,
        coordinator: TransitionCoordinator,
        services: GuideServices,
        permissions: Arc<dyn PermissionPrompt>,
    ) -> Result<Self, SequenceError> {
        let ledger = GamificationLedger::new(
            Arc::new(AchievementCatalog::standard()),
            config.achievement_bonus,
        );
        let sequencer = StepSequencer::new(steps, config, coordinator, ledger)?;
        Ok(Self::new(user_id, sequencer, services, permissions))
    }

    /// Start onboarding unless this client already completed or skipped it.
    pub async fn launch(
        user_id: impl Into<String>,
        config: &GuideConfig,
        coordinator: TransitionCoordinator,
        services: GuideServices,
        permissions: Arc<dyn PermissionPrompt>,
    ) -> Result<Option<Self>, crate::Error> {
        let flags = services.flags.load().await?;
        if !flags.should_launch_onboarding() {
            info!(?flags, "Onboarding already handled on this client");
            return Ok(None);
        }
        let orchestrator = Self::with_deck(
            user_id,
            default_deck(),
            config,
            coordinator,
            services,
            permissions,
        )?;
        info!(
            user_id = %orchestrator.user_id,
            session_id = %orchestrator.sequencer.session_id(),
            "Onboarding started"
        );
        Ok(Some(orchestrator))
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn sequencer(&self) -> &StepSequencer {
        &self.sequencer
    }

    /// The current slide, when the step is one of the standard deck's.
    pub async fn current_slide(&self) -> Option<Slide> {
        Slide::from_id(&self.sequencer.current().await.id)
    }

    pub async fn form(&self) -> OnboardingForm {
        self.form.read().await.clone()
    }

    /// Go to the next slide, using the slide's signature effect unless the
    /// caller picks one.
    pub async fn next(&self, effect: Option<TransitionEffect>) -> AdvanceOutcome {
        let effect = match effect {
            Some(effect) => Some(effect),
            None => self.current_slide().await.and_then(|s| s.exit_effect()),
        };
        let outcome = self.sequencer.advance(effect).await;
        if let AdvanceOutcome::Advanced { to, .. } = outcome {
            self.unlock_quiet(ids::FIRST_STEP).await;
            if to + 1 == self.sequencer.len() {
                self.unlock_quiet(ids::CIRCLE_READY).await;
            }
        }
        outcome
    }

    pub async fn back(&self) -> MoveOutcome {
        self.sequencer.back().await
    }

    pub async fn jump_to(&self, index: usize) -> Result<MoveOutcome, SequenceError> {
        self.sequencer.jump_to(index).await
    }

    /// Merge a form patch and award any milestones it earns.
    pub async fn update_form(&self, patch: FormPatch) -> Result<OnboardingForm, SequenceError> {
        if self.sequencer.is_ended() {
            return Err(SequenceError::Ended);
        }
        let form = {
            let mut form = self.form.write().await;
            form.apply(patch);
            form.clone()
        };
        self.evaluate_milestones(&form).await;
        Ok(form)
    }

    /// Ask for notification permission. Every outcome lets the user continue.
    pub async fn request_notifications(&self) -> PermissionOutcome {
        let outcome = self.permissions.request().await;
        if self.sequencer.is_ended() {
            return outcome;
        }
        if outcome != PermissionOutcome::Granted {
            info!(user_id = %self.user_id, ?outcome, "Notifications not enabled; continuing");
        }
        let form = {
            let mut form = self.form.write().await;
            form.notifications = Some(outcome);
            form.clone()
        };
        self.evaluate_milestones(&form).await;
        outcome
    }

    async fn evaluate_milestones(&self, form: &OnboardingForm) {
        for id in form.milestones() {
            self.unlock_quiet(id).await;
        }
    }

    async fn unlock_quiet(&self, id: &str) {
        if let Err(e) = self.sequencer.unlock(id).await {
            warn!("Skipping milestone {}: {}", id, e);
        }
    }

    /// Leave onboarding without finishing. Sets the skipped flag.
    pub async fn skip(&self) -> bool {
        if !self.sequencer.skip() {
            return false;
        }
        if let Err(e) = self.services.flags.mark_onboarding_skipped().await {
            warn!("Failed to persist onboarding skip flag: {}", e);
        }
        true
    }

    /// Finish the deck from its final slide.
    ///
    /// Grants the final reward and the completion achievement, writes the
    /// form and gamification snapshot to the profile store in one call, sets
    /// the local completion flag, then navigates away. A failed profile write
    /// is reported in the returned notice and rolls nothing back. Repeat
    /// calls return the first report.
    pub async fn complete(&self) -> Result<CompletionReport, SequenceError> {
        let mut completion = self.completion.lock().await;
        if let Some(report) = completion.as_ref() {
            return Ok(report.clone());
        }

        self.sequencer.finish().await?;
        self.unlock_quiet(ids::ONBOARDING_COMPLETE).await;

        let gamification = self.sequencer.gamification().await;
        let form = self.form.read().await.clone();
        let update = ProfileUpdate {
            display_name: (!form.display_name.is_empty()).then(|| form.display_name.clone()),
            photo_url: form.photo_url.clone(),
            xp: Some(gamification.xp),
            level: Some(gamification.level),
            achievements: Some(gamification.achievements.clone()),
            safety_scenarios: Some(form.safety_scenarios.iter().cloned().collect()),
            notifications_enabled: Some(form.notifications_enabled()),
            location_consent: Some(form.location_consent),
            onboarding_completed: Some(true),
            onboarding_completed_at: Some(Utc::now()),
            ..Default::default()
        };

        let (persisted, notice) = match self
            .services
            .profiles
            .write_profile(&self.user_id, update)
            .await
        {
            Ok(()) => (true, None),
            Err(e) => {
                warn!(user_id = %self.user_id, "Failed to save onboarding profile: {}", e);
                (
                    false,
                    Some("We couldn't save your profile yet. Your progress is kept on this device.".to_string()),
                )
            }
        };

        if let Err(e) = self.services.flags.mark_onboarding_completed().await {
            warn!("Failed to persist onboarding completion flag: {}", e);
        }

        info!(
            user_id = %self.user_id,
            xp = gamification.xp,
            level = gamification.level,
            persisted,
            "Onboarding completed"
        );
        let report = CompletionReport {
            gamification,
            persisted,
            notice,
        };
        *completion = Some(report.clone());
        drop(completion);

        self.sequencer.end();
        self.services.navigator.navigate_to(DASHBOARD_ROUTE);
        Ok(report)
    }

    /// Current onboarding status (for the REST endpoint).
    pub async fn status(&self) -> OnboardingStatus {
        OnboardingStatus {
            slide: self.sequencer.current().await.id,
            session: self.sequencer.snapshot().await,
            form: self.form.read().await.clone(),
            gamification: self.sequencer.gamification().await,
            completion: self.completion.lock().await.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ProfileStoreError, StorageError};
    use crate::navigation::{FixedPermission, RecordingNavigator};
    use crate::profile::{MemoryProfileStore, Profile, ProfileStore};
    use crate::storage::{FlagStore, LocalStorage, MemoryStorage};
    use crate::transition::{NoopEffects, VirtualStage};
    use async_trait::async_trait;

    struct FailingProfiles;

    #[async_trait]
    impl ProfileStore for FailingProfiles {
        async fn read_profile(&self, _: &str) -> Result<Option<Profile>, ProfileStoreError> {
            Err(ProfileStoreError::Unavailable("offline".into()))
        }

        async fn write_profile(&self, _: &str, _: ProfileUpdate) -> Result<(), ProfileStoreError> {
            Err(ProfileStoreError::Unavailable("offline".into()))
        }
    }

    struct Harness {
        orchestrator: OnboardingOrchestrator,
        flags: FlagStore,
        navigator: Arc<RecordingNavigator>,
    }

    fn harness(profiles: Arc<dyn ProfileStore>, permission: PermissionOutcome) -> Harness {
        let flags = FlagStore::new(Arc::new(MemoryStorage::new()));
        let navigator = Arc::new(RecordingNavigator::new());
        let services = GuideServices::new(profiles, flags.clone(), navigator.clone());
        let coordinator =
            TransitionCoordinator::new(Arc::new(VirtualStage::new()), Arc::new(NoopEffects));
        let orchestrator = OnboardingOrchestrator::with_deck(
            "u1",
            default_deck(),
            &GuideConfig::default(),
            coordinator,
            services,
            Arc::new(FixedPermission(permission)),
        )
        .unwrap();
        Harness {
            orchestrator,
            flags,
            navigator,
        }
    }

    async fn run_to_last(o: &OnboardingOrchestrator) {
        while let AdvanceOutcome::Advanced { .. } = o.next(None).await {}
    }

    #[tokio::test(start_paused = true)]
    async fn full_run_writes_profile_once_and_sets_flag() {
        let profiles = Arc::new(MemoryProfileStore::new());
        let h = harness(profiles.clone(), PermissionOutcome::Granted);
        let o = &h.orchestrator;

        o.update_form(FormPatch {
            display_name: Some("Jo".into()),
            safety_scenarios: Some(vec!["night_out".into()]),
            location_consent: Some(true),
            ..Default::default()
        })
        .await
        .unwrap();
        assert_eq!(o.request_notifications().await, PermissionOutcome::Granted);
        run_to_last(o).await;
        assert!(profiles.read_profile("u1").await.unwrap().is_none());

        let report = o.complete().await.unwrap();
        assert!(report.persisted);
        assert!(report.notice.is_none());
        for id in [
            ids::FIRST_STEP,
            ids::PROFILE_STARTED,
            ids::SCENARIOS_CHOSEN,
            ids::ALERTS_READY,
            ids::CIRCLE_READY,
            ids::ONBOARDING_COMPLETE,
        ] {
            assert!(report.gamification.achievements.contains(id), "{id}");
        }
        assert!(!report.gamification.achievements.contains(ids::PHOTO_ADDED));
        // 150 from slides plus 6 x 25 from achievements.
        assert_eq!(report.gamification.xp, 300);

        let profile = profiles.read_profile("u1").await.unwrap().unwrap();
        assert_eq!(profile.display_name.as_deref(), Some("Jo"));
        assert_eq!(profile.xp, 300);
        assert_eq!(profile.level, 4);
        assert!(profile.onboarding_completed);
        assert!(profile.notifications_enabled);
        assert!(profile.location_consent);
        assert_eq!(profile.safety_scenarios, vec!["night_out".to_string()]);

        assert!(h.flags.load().await.unwrap().onboarding_completed);
        assert_eq!(h.navigator.paths(), vec![DASHBOARD_ROUTE.to_string()]);

        // Repeat completion is a no-op returning the same report.
        assert_eq!(o.complete().await.unwrap(), report);
        assert_eq!(h.navigator.paths().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_keeps_state_and_still_sets_flag() {
        let h = harness(Arc::new(FailingProfiles), PermissionOutcome::Denied);
        let o = &h.orchestrator;
        o.request_notifications().await;
        run_to_last(o).await;

        let report = o.complete().await.unwrap();
        assert!(!report.persisted);
        assert!(report.notice.is_some());
        assert!(report.gamification.xp > 0);
        assert!(!report.gamification.achievements.contains(ids::ALERTS_READY));
        assert!(h.flags.load().await.unwrap().onboarding_completed);
    }

    #[tokio::test]
    async fn complete_requires_last_slide() {
        let h = harness(Arc::new(MemoryProfileStore::new()), PermissionOutcome::Granted);
        assert_eq!(
            h.orchestrator.complete().await,
            Err(SequenceError::NotAtFinalStep { index: 0 })
        );
    }

    #[tokio::test]
    async fn skip_sets_flag_and_blocks_form_updates() {
        let h = harness(Arc::new(MemoryProfileStore::new()), PermissionOutcome::Unavailable);
        assert!(h.orchestrator.skip().await);
        assert!(!h.orchestrator.skip().await);

        let flags = h.flags.load().await.unwrap();
        assert!(flags.onboarding_skipped);
        assert!(!flags.should_launch_onboarding());
        assert_eq!(
            h.orchestrator.update_form(FormPatch::default()).await,
            Err(SequenceError::Ended)
        );
    }

    #[tokio::test]
    async fn repeated_form_updates_unlock_once() {
        let h = harness(Arc::new(MemoryProfileStore::new()), PermissionOutcome::Granted);
        let o = &h.orchestrator;
        for _ in 0..3 {
            o.update_form(FormPatch {
                display_name: Some("Jo".into()),
                ..Default::default()
            })
            .await
            .unwrap();
        }
        let g = o.sequencer().gamification().await;
        assert_eq!(g.achievements.len(), 1);
        assert_eq!(g.xp, 25);
    }

    #[tokio::test]
    async fn launch_respects_flags() {
        let flags = FlagStore::new(Arc::new(MemoryStorage::new()));
        flags.mark_onboarding_completed().await.unwrap();
        let services = GuideServices::new(
            Arc::new(MemoryProfileStore::new()),
            flags,
            Arc::new(RecordingNavigator::new()),
        );
        let coordinator =
            TransitionCoordinator::new(Arc::new(VirtualStage::new()), Arc::new(NoopEffects));
        let launched = OnboardingOrchestrator::launch(
            "u1",
            &GuideConfig::default(),
            coordinator,
            services,
            Arc::new(FixedPermission(PermissionOutcome::Granted)),
        )
        .await
        .unwrap();
        assert!(launched.is_none());
    }

    struct UnreadableStorage;

    #[async_trait]
    impl LocalStorage for UnreadableStorage {
        async fn get(&self, _: &str) -> Result<Option<String>, StorageError> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "locked").into())
        }

        async fn set(&self, _: &str, _: &str) -> Result<(), StorageError> {
            Ok(())
        }

        async fn remove(&self, _: &str) -> Result<(), StorageError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn launch_reports_unreadable_flags() {
        let services = GuideServices::new(
            Arc::new(MemoryProfileStore::new()),
            FlagStore::new(Arc::new(UnreadableStorage)),
            Arc::new(RecordingNavigator::new()),
        );
        let coordinator =
            TransitionCoordinator::new(Arc::new(VirtualStage::new()), Arc::new(NoopEffects));
        let result = OnboardingOrchestrator::launch(
            "u1",
            &GuideConfig::default(),
            coordinator,
            services,
            Arc::new(FixedPermission(PermissionOutcome::Granted)),
        )
        .await;
        assert!(matches!(result, Err(crate::Error::Storage(StorageError::Io(_)))));
    }
}
