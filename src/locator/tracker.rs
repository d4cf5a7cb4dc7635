//! Target locator — resolves a step's anchor and keeps its placement current
//! while the step is active.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::geometry::{self, PlacementConfig, PlacementResult, Rect, TooltipPlacement};
use super::surface::{Surface, SurfaceChange};
use super::watch::{CancelToken, WatchOutcome, WatchPolicy, watch_for};
use crate::config::{AnchorTimeoutPolicy, GuideConfig};
use crate::step::{Anchor, Step};

/// Where a tracked step stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetStatus {
    /// Anchor not found yet; still retrying.
    Searching,
    /// Anchor resolved; spotlight is valid.
    Anchored,
    /// Step has no anchor; tooltip only.
    Unanchored,
    /// Anchor never showed up within the configured timeout.
    TimedOut,
}

/// The latest geometry for the active step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TargetView {
    pub step_id: String,
    pub status: TargetStatus,
    /// Present only while anchored.
    pub placement: Option<PlacementResult>,
    /// Always present, so textual instructions stay readable.
    pub tooltip: TooltipPlacement,
}

impl TargetView {
    pub fn is_settled(&self) -> bool {
        self.status != TargetStatus::Searching
    }
}

/// Resolves anchors against a [`Surface`].
#[derive(Clone)]
pub struct TargetLocator {
    surface: Arc<dyn Surface>,
    placement: PlacementConfig,
    poll_interval: Duration,
    timeout: Option<Duration>,
    warn_after: Duration,
}

impl TargetLocator {
    pub fn new(surface: Arc<dyn Surface>, config: &GuideConfig) -> Self {
        let timeout = match config.anchor_timeout {
            AnchorTimeoutPolicy::WaitForever => None,
            AnchorTimeoutPolicy::SkipAfter(d) => Some(d),
        };
        Self {
            surface,
            placement: config.placement,
            poll_interval: config.anchor_poll_interval,
            timeout,
            warn_after: config.anchor_warn_after,
        }
    }

    pub fn surface(&self) -> &Arc<dyn Surface> {
        &self.surface
    }

    /// Current placement for a rectangle, using the live viewport.
    pub fn place(&self, target: Rect) -> PlacementResult {
        geometry::place(target, self.surface.viewport(), &self.placement)
    }

    fn view(&self, step_id: &str, status: TargetStatus, target: Option<Rect>) -> TargetView {
        let viewport = self.surface.viewport();
        match target {
            Some(rect) => {
                let placement = geometry::place(rect, viewport, &self.placement);
                TargetView {
                    step_id: step_id.to_string(),
                    status,
                    placement: Some(placement),
                    tooltip: placement.tooltip,
                }
            }
            None => TargetView {
                step_id: step_id.to_string(),
                status,
                placement: None,
                tooltip: geometry::place_unanchored(viewport, &self.placement),
            },
        }
    }

    /// Resolve an anchor once, retrying until found, timed out, or cancelled.
    ///
    /// Logs a warning once if the anchor is still missing after the
    /// configured grace period.
    pub async fn resolve(&self, anchor: &Anchor, cancel: &CancelToken) -> WatchOutcome<Rect> {
        let surface = Arc::clone(&self.surface);
        let probe = || surface.locate(anchor);

        let first_window = match self.timeout {
            Some(t) if t <= self.warn_after => Some(t),
            _ => Some(self.warn_after),
        };
        let first = watch_for(
            probe,
            WatchPolicy {
                interval: self.poll_interval,
                timeout: first_window,
            },
            Some(self.surface.subscribe()),
            cancel,
        )
        .await;

        match first {
            WatchOutcome::TimedOut => {}
            other => return other,
        }

        let remaining = match self.timeout {
            Some(t) if t <= self.warn_after => return WatchOutcome::TimedOut,
            Some(t) => Some(t - self.warn_after),
            None => None,
        };
        warn!(
            anchor = %anchor,
            waited_ms = self.warn_after.as_millis() as u64,
            "Tour anchor still unresolved; showing tooltip without spotlight"
        );

        let surface = Arc::clone(&self.surface);
        watch_for(
            || surface.locate(anchor),
            WatchPolicy {
                interval: self.poll_interval,
                timeout: remaining,
            },
            Some(self.surface.subscribe()),
            cancel,
        )
        .await
    }

    /// Start tracking a step. Geometry is republished on every resize,
    /// scroll, or mutation until the returned handle is dropped.
    pub fn track(&self, step: &Step) -> TargetTracking {
        let cancel = CancelToken::new();
        let initial = match step.anchor {
            Some(_) => self.view(&step.id, TargetStatus::Searching, None),
            None => self.view(&step.id, TargetStatus::Unanchored, None),
        };
        let (tx, rx) = watch::channel(initial);

        let locator = self.clone();
        let step_id = step.id.clone();
        let anchor = step.anchor.clone();
        let task_cancel = cancel.clone();
        let handle = tokio::spawn(async move {
            match anchor {
                Some(anchor) => locator.follow(&step_id, &anchor, &tx, &task_cancel).await,
                None => locator.follow_unanchored(&step_id, &tx, &task_cancel).await,
            }
        });

        TargetTracking { rx, cancel, handle }
    }

    async fn follow(
        &self,
        step_id: &str,
        anchor: &Anchor,
        tx: &watch::Sender<TargetView>,
        cancel: &CancelToken,
    ) {
        loop {
            let rect = match self.resolve(anchor, cancel).await {
                WatchOutcome::Ready(rect) => rect,
                WatchOutcome::TimedOut => {
                    warn!(step_id, anchor = %anchor, "Tour anchor timed out");
                    tx.send_replace(self.view(step_id, TargetStatus::TimedOut, None));
                    return;
                }
                WatchOutcome::Cancelled => return,
            };
            debug!(step_id, anchor = %anchor, "Tour anchor resolved");
            tx.send_replace(self.view(step_id, TargetStatus::Anchored, Some(rect)));

            // Follow the element until it disappears, then go back to searching.
            let mut changes = self.surface.subscribe();
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    change = changes.recv() => {
                        if let Err(broadcast::error::RecvError::Closed) = change {
                            return;
                        }
                    }
                }
                match self.surface.locate(anchor) {
                    Some(rect) => {
                        tx.send_replace(self.view(step_id, TargetStatus::Anchored, Some(rect)));
                    }
                    None => {
                        debug!(step_id, anchor = %anchor, "Tour anchor vanished; searching again");
                        tx.send_replace(self.view(step_id, TargetStatus::Searching, None));
                        break;
                    }
                }
            }
        }
    }

    async fn follow_unanchored(
        &self,
        step_id: &str,
        tx: &watch::Sender<TargetView>,
        cancel: &CancelToken,
    ) {
        let mut changes = self.surface.subscribe();
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                change = changes.recv() => match change {
                    Ok(SurfaceChange::Resized) | Err(broadcast::error::RecvError::Lagged(_)) => {
                        tx.send_replace(self.view(step_id, TargetStatus::Unanchored, None));
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Closed) => return,
                },
            }
        }
    }
}

/// Handle to a running tracker. Dropping it cancels the background task.
pub struct TargetTracking {
    rx: watch::Receiver<TargetView>,
    cancel: CancelToken,
    handle: JoinHandle<()>,
}

impl TargetTracking {
    /// Latest published view.
    pub fn current(&self) -> TargetView {
        self.rx.borrow().clone()
    }

    /// A receiver hosts can hold to re-render on every change.
    pub fn subscribe(&self) -> watch::Receiver<TargetView> {
        self.rx.clone()
    }

    /// Wait until the anchor resolves, times out, or the step has no anchor.
    pub async fn settled(&mut self) -> TargetView {
        if let Ok(view) = self.rx.wait_for(TargetView::is_settled).await {
            return view.clone();
        }
        // Tracker ended (cancelled); report the last thing it saw.
        self.rx.borrow().clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }
}

impl Drop for TargetTracking {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::locator::geometry::{Size, TooltipSide};
    use crate::locator::surface::VirtualSurface;

    fn setup(policy: AnchorTimeoutPolicy) -> (Arc<VirtualSurface>, TargetLocator) {
        let surface = Arc::new(VirtualSurface::new(Size::new(1200.0, 800.0)));
        let config = GuideConfig {
            anchor_timeout: policy,
            ..GuideConfig::default()
        };
        let locator = TargetLocator::new(surface.clone(), &config);
        (surface, locator)
    }

    fn anchored_step() -> Step {
        Step::new("fab", 0).with_anchor(Anchor::selector("#fab"))
    }

    #[tokio::test(start_paused = true)]
    async fn resolves_element_mounted_later() {
        let (surface, locator) = setup(AnchorTimeoutPolicy::WaitForever);
        let mut tracking = locator.track(&anchored_step());
        assert_eq!(tracking.current().status, TargetStatus::Searching);
        assert!(tracking.current().placement.is_none());

        let s = surface.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(350)).await;
            s.mount(&["#fab"], Rect::new(300.0, 500.0, 56.0, 56.0));
        });

        let view = tracking.settled().await;
        assert_eq!(view.status, TargetStatus::Anchored);
        assert_eq!(
            view.placement.unwrap().spotlight,
            Rect::new(292.0, 492.0, 72.0, 72.0)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn zero_poll_interval_still_resolves() {
        let surface = Arc::new(VirtualSurface::new(Size::new(1200.0, 800.0)));
        let config = GuideConfig {
            anchor_poll_interval: Duration::ZERO,
            ..GuideConfig::default()
        };
        let locator = TargetLocator::new(surface.clone(), &config);
        let mut tracking = locator.track(&anchored_step());

        let s = surface.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            s.mount(&["#fab"], Rect::new(300.0, 500.0, 56.0, 56.0));
        });

        let view = tokio::time::timeout(Duration::from_secs(1), tracking.settled())
            .await
            .unwrap();
        assert_eq!(view.status, TargetStatus::Anchored);
    }

    #[tokio::test(start_paused = true)]
    async fn times_out_under_skip_policy() {
        let (_surface, locator) =
            setup(AnchorTimeoutPolicy::SkipAfter(Duration::from_secs(2)));
        let mut tracking = locator.track(&anchored_step());
        let view = tracking.settled().await;
        assert_eq!(view.status, TargetStatus::TimedOut);
        assert!(view.placement.is_none());
        assert_eq!(view.tooltip.side, TooltipSide::Center);
    }

    #[tokio::test(start_paused = true)]
    async fn follows_moves_and_resizes() {
        let (surface, locator) = setup(AnchorTimeoutPolicy::WaitForever);
        surface.mount(&["#fab"], Rect::new(300.0, 500.0, 56.0, 56.0));
        let mut tracking = locator.track(&anchored_step());
        let first = tracking.settled().await;
        assert_eq!(first.tooltip.side, TooltipSide::Below);

        let mut rx = tracking.subscribe();
        surface.resize(Size::new(360.0, 640.0));
        rx.changed().await.unwrap();
        let view = rx.borrow_and_update().clone();
        assert_eq!(view.status, TargetStatus::Anchored);
        assert_eq!(view.tooltip.side, TooltipSide::BottomSheet);

        surface.move_to("#fab", Rect::new(40.0, 40.0, 56.0, 56.0));
        rx.changed().await.unwrap();
        let view = rx.borrow_and_update().clone();
        assert_eq!(view.placement.unwrap().spotlight.top, 32.0);
    }

    #[tokio::test(start_paused = true)]
    async fn vanished_anchor_goes_back_to_searching() {
        let (surface, locator) = setup(AnchorTimeoutPolicy::WaitForever);
        surface.mount(&["#fab"], Rect::new(300.0, 500.0, 56.0, 56.0));
        let mut tracking = locator.track(&anchored_step());
        tracking.settled().await;

        let mut rx = tracking.subscribe();
        surface.unmount("#fab");
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().status, TargetStatus::Searching);
        assert!(rx.borrow().placement.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn unanchored_step_settles_immediately() {
        let (_surface, locator) = setup(AnchorTimeoutPolicy::WaitForever);
        let mut tracking = locator.track(&Step::new("intro", 0));
        let view = tracking.settled().await;
        assert_eq!(view.status, TargetStatus::Unanchored);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_handle_cancels_the_task() {
        let (_surface, locator) = setup(AnchorTimeoutPolicy::WaitForever);
        let tracking = locator.track(&anchored_step());
        let rx = tracking.subscribe();
        drop(tracking);
        tokio::time::sleep(Duration::from_millis(10)).await;
        // Sender is gone once the task has been torn down.
        assert!(rx.has_changed().is_err());
    }
}
