//! Surface — the live UI the tour points at.
//!
//! The engine never touches a concrete UI toolkit. Hosts implement
//! [`Surface`]; [`VirtualSurface`] is an in-memory implementation used by
//! headless hosts and tests.

use std::sync::RwLock;

use tokio::sync::broadcast;
use tracing::debug;

use super::geometry::{Rect, Size, Viewport};
use crate::step::Anchor;

/// Default broadcast channel capacity for layout changes.
const DEFAULT_CHANGE_CAPACITY: usize = 64;

/// Something that may have moved a target element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceChange {
    Resized,
    Scrolled,
    /// Structural or attribute mutation anywhere in the tree.
    Mutated,
}

/// Read access to live element geometry, plus the attachment hook.
pub trait Surface: Send + Sync {
    /// Current visible window size.
    fn viewport(&self) -> Viewport;

    /// Current on-screen rectangle for an anchor, if it is rendered.
    fn locate(&self, anchor: &Anchor) -> Option<Rect>;

    /// Tag every element matching `selector` with a discoverable tour id.
    /// Returns the number of elements tagged.
    fn annotate(&self, selector: &str, semantic_id: &str) -> usize;

    /// Subscribe to resize, scroll, and mutation notifications.
    fn subscribe(&self) -> broadcast::Receiver<SurfaceChange>;
}

#[derive(Debug, Clone)]
struct VirtualElement {
    selectors: Vec<String>,
    /// Document coordinates (before scroll).
    rect: Rect,
    tour_id: Option<String>,
    hidden: bool,
}

#[derive(Debug)]
struct SurfaceInner {
    viewport: Viewport,
    scroll: (f64, f64),
    elements: Vec<VirtualElement>,
}

/// In-memory surface with scroll, resize, and mutation support.
pub struct VirtualSurface {
    inner: RwLock<SurfaceInner>,
    tx: broadcast::Sender<SurfaceChange>,
}

impl VirtualSurface {
    pub fn new(viewport: Viewport) -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_CHANGE_CAPACITY);
        Self {
            inner: RwLock::new(SurfaceInner {
                viewport,
                scroll: (0.0, 0.0),
                elements: Vec::new(),
            }),
            tx,
        }
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, SurfaceInner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, SurfaceInner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn notify(&self, change: SurfaceChange) {
        // Ok if nobody is tracking right now
        let _ = self.tx.send(change);
    }

    /// Render an element matching any of `selectors` at `rect`.
    pub fn mount(&self, selectors: &[&str], rect: Rect) {
        self.write().elements.push(VirtualElement {
            selectors: selectors.iter().map(|s| s.to_string()).collect(),
            rect,
            tour_id: None,
            hidden: false,
        });
        self.notify(SurfaceChange::Mutated);
    }

    /// Remove every element matching `selector`.
    pub fn unmount(&self, selector: &str) -> usize {
        let removed = {
            let mut inner = self.write();
            let before = inner.elements.len();
            inner
                .elements
                .retain(|e| !e.selectors.iter().any(|s| s == selector));
            before - inner.elements.len()
        };
        if removed > 0 {
            self.notify(SurfaceChange::Mutated);
        }
        removed
    }

    /// Move every element matching `selector`.
    pub fn move_to(&self, selector: &str, rect: Rect) {
        {
            let mut inner = self.write();
            for el in inner
                .elements
                .iter_mut()
                .filter(|e| e.selectors.iter().any(|s| s == selector))
            {
                el.rect = rect;
            }
        }
        self.notify(SurfaceChange::Mutated);
    }

    /// Toggle visibility without removing the element (e.g. a feature flag).
    pub fn set_hidden(&self, selector: &str, hidden: bool) {
        {
            let mut inner = self.write();
            for el in inner
                .elements
                .iter_mut()
                .filter(|e| e.selectors.iter().any(|s| s == selector))
            {
                el.hidden = hidden;
            }
        }
        self.notify(SurfaceChange::Mutated);
    }

    pub fn resize(&self, viewport: Size) {
        self.write().viewport = viewport;
        self.notify(SurfaceChange::Resized);
    }

    pub fn scroll_to(&self, x: f64, y: f64) {
        self.write().scroll = (x, y);
        self.notify(SurfaceChange::Scrolled);
    }

    /// Tour id currently attached to the first element matching `selector`.
    pub fn tour_id_of(&self, selector: &str) -> Option<String> {
        self.read()
            .elements
            .iter()
            .find(|e| e.selectors.iter().any(|s| s == selector))
            .and_then(|e| e.tour_id.clone())
    }
}

impl Surface for VirtualSurface {
    fn viewport(&self) -> Viewport {
        self.read().viewport
    }

    fn locate(&self, anchor: &Anchor) -> Option<Rect> {
        let inner = self.read();
        let el = inner.elements.iter().filter(|e| !e.hidden).find(|e| match anchor {
            Anchor::Selector(sel) => e.selectors.iter().any(|s| s == sel),
            Anchor::Attachment(id) => e.tour_id.as_deref() == Some(id.as_str()),
        })?;
        let (sx, sy) = inner.scroll;
        Some(el.rect.translate(-sx, -sy))
    }

    fn annotate(&self, selector: &str, semantic_id: &str) -> usize {
        let (tagged, changed) = {
            let mut inner = self.write();
            let (mut tagged, mut changed) = (0, 0);
            for el in inner
                .elements
                .iter_mut()
                .filter(|e| e.selectors.iter().any(|s| s == selector))
            {
                if el.tour_id.as_deref() != Some(semantic_id) {
                    el.tour_id = Some(semantic_id.to_string());
                    changed += 1;
                }
                tagged += 1;
            }
            (tagged, changed)
        };
        // Re-tagging with the same id is not a mutation.
        if changed > 0 {
            debug!(selector, semantic_id, changed, "Annotated elements");
            self.notify(SurfaceChange::Mutated);
        }
        tagged
    }

    fn subscribe(&self) -> broadcast::Receiver<SurfaceChange> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface() -> VirtualSurface {
        VirtualSurface::new(Size::new(1200.0, 800.0))
    }

    #[test]
    fn locate_by_selector_accounts_for_scroll() {
        let s = surface();
        s.mount(&["#fab"], Rect::new(900.0, 100.0, 56.0, 56.0));
        s.scroll_to(0.0, 400.0);
        assert_eq!(
            s.locate(&Anchor::selector("#fab")),
            Some(Rect::new(500.0, 100.0, 56.0, 56.0))
        );
    }

    #[test]
    fn attachment_lookup_requires_annotation() {
        let s = surface();
        s.mount(&[".checkin-button", "#start"], Rect::new(10.0, 10.0, 100.0, 40.0));
        let anchor = Anchor::attachment("primary-action");
        assert!(s.locate(&anchor).is_none());

        assert_eq!(s.annotate(".checkin-button", "primary-action"), 1);
        assert!(s.locate(&anchor).is_some());
        assert_eq!(s.tour_id_of("#start").as_deref(), Some("primary-action"));
    }

    #[test]
    fn re_annotating_is_silent() {
        let s = surface();
        s.mount(&["#start"], Rect::default());
        let mut rx = s.subscribe();
        assert_eq!(s.annotate("#start", "primary-action"), 1);
        assert_eq!(s.annotate("#start", "primary-action"), 1);
        assert_eq!(rx.try_recv().unwrap(), SurfaceChange::Mutated);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn hidden_elements_do_not_resolve() {
        let s = surface();
        s.mount(&["#beta"], Rect::new(0.0, 0.0, 10.0, 10.0));
        s.set_hidden("#beta", true);
        assert!(s.locate(&Anchor::selector("#beta")).is_none());
    }

    #[tokio::test]
    async fn changes_are_broadcast() {
        let s = surface();
        let mut rx = s.subscribe();
        s.resize(Size::new(360.0, 640.0));
        s.mount(&["#x"], Rect::default());
        assert_eq!(rx.recv().await.unwrap(), SurfaceChange::Resized);
        assert_eq!(rx.recv().await.unwrap(), SurfaceChange::Mutated);
    }

    #[test]
    fn unmount_reports_removed_count() {
        let s = surface();
        s.mount(&[".card"], Rect::default());
        s.mount(&[".card"], Rect::default());
        assert_eq!(s.unmount(".card"), 2);
        assert_eq!(s.unmount(".card"), 0);
    }
}
