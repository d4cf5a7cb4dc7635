//! Placement geometry — spotlight rectangles and tooltip positioning.
//!
//! All values are CSS pixels in viewport coordinates. Nothing here is cached:
//! callers recompute on every viewport or layout change.

use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(top: f64, left: f64, width: f64, height: f64) -> Self {
        Self {
            top,
            left,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn center(&self) -> (f64, f64) {
        (self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    /// Grow outward by `by` on every side.
    pub fn expand(&self, by: f64) -> Self {
        Self {
            top: self.top - by,
            left: self.left - by,
            width: self.width + by * 2.0,
            height: self.height + by * 2.0,
        }
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            top: self.top + dy,
            left: self.left + dx,
            ..*self
        }
    }
}

/// Width/height pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Visible window area.
pub type Viewport = Size;

/// Tooltip / spotlight geometry knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementConfig {
    /// Minimum distance between the tooltip and any viewport edge.
    pub margin: f64,
    /// Outward padding around the highlighted target.
    pub spotlight_padding: f64,
    /// Viewports narrower than this use the bottom-anchored layout.
    pub mobile_breakpoint: f64,
    /// Tooltip size on desktop.
    pub tooltip: Size,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            margin: 20.0,
            spotlight_padding: 8.0,
            mobile_breakpoint: 768.0,
            tooltip: Size::new(320.0, 180.0),
        }
    }
}

/// Where the tooltip ended up relative to its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TooltipSide {
    Below,
    Above,
    Right,
    Left,
    Center,
    /// Narrow-viewport layout, pinned near the bottom edge.
    BottomSheet,
}

/// Computed tooltip rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TooltipPlacement {
    pub side: TooltipSide,
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
}

impl TooltipPlacement {
    pub fn rect(&self) -> Rect {
        Rect::new(self.top, self.left, self.width, self.height)
    }
}

/// Highlighted target plus its tooltip, for the current step only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlacementResult {
    /// Spotlight hole, already padded.
    pub spotlight: Rect,
    pub tooltip: TooltipPlacement,
}

impl PlacementResult {
    pub fn tooltip_top(&self) -> f64 {
        self.tooltip.top
    }

    pub fn tooltip_left(&self) -> f64 {
        self.tooltip.left
    }
}

/// Clamp without panicking when `max < min`: the lower bound wins.
fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.min(max).max(min)
}

/// Shrink the tooltip so it fits between the margins, if needed.
fn fit(tooltip: Size, viewport: Viewport, margin: f64) -> Size {
    Size::new(
        tooltip.width.min((viewport.width - margin * 2.0).max(0.0)),
        tooltip.height.min((viewport.height - margin * 2.0).max(0.0)),
    )
}

fn is_mobile(viewport: Viewport, config: &PlacementConfig) -> bool {
    viewport.width < config.mobile_breakpoint
}

/// Spotlight hole for a target: padded outward so the border does not clip it.
pub fn spotlight(target: Rect, config: &PlacementConfig) -> Rect {
    target.expand(config.spotlight_padding)
}

/// Tooltip placement when there is no resolved target: centered.
pub fn place_unanchored(viewport: Viewport, config: &PlacementConfig) -> TooltipPlacement {
    let m = config.margin;
    let size = fit(config.tooltip, viewport, m);
    if is_mobile(viewport, config) {
        return bottom_sheet(size, viewport, m);
    }
    centered(size, viewport, m)
}

/// Place the tooltip next to `target`.
///
/// Desktop order of preference: below, above, right, left, centered in the
/// viewport. Narrow viewports always get the bottom sheet. Every result is
/// clamped to `[margin, viewport - margin]` on both axes.
pub fn place_tooltip(
    target: Rect,
    viewport: Viewport,
    config: &PlacementConfig,
) -> TooltipPlacement {
    let m = config.margin;
    let size = fit(config.tooltip, viewport, m);

    if is_mobile(viewport, config) {
        return bottom_sheet(size, viewport, m);
    }

    let hole = spotlight(target, config);
    let (cx, cy) = hole.center();
    let max_left = viewport.width - m - size.width;
    let max_top = viewport.height - m - size.height;

    let space_below = viewport.height - hole.bottom();
    let space_above = hole.top;
    let space_right = viewport.width - hole.right();
    let space_left = hole.left;

    let (side, top, left) = if space_below > size.height + m * 2.0 {
        (TooltipSide::Below, hole.bottom() + m, cx - size.width / 2.0)
    } else if space_above > size.height + m * 2.0 {
        (
            TooltipSide::Above,
            hole.top - m - size.height,
            cx - size.width / 2.0,
        )
    } else if space_right > size.width + m * 2.0 {
        (TooltipSide::Right, cy - size.height / 2.0, hole.right() + m)
    } else if space_left > size.width + m * 2.0 {
        (
            TooltipSide::Left,
            cy - size.height / 2.0,
            hole.left - m - size.width,
        )
    } else {
        return centered(size, viewport, m);
    };

    TooltipPlacement {
        side,
        top: clamp(top, m, max_top),
        left: clamp(left, m, max_left),
        width: size.width,
        height: size.height,
    }
}

/// Full placement for a resolved target.
pub fn place(target: Rect, viewport: Viewport, config: &PlacementConfig) -> PlacementResult {
    PlacementResult {
        spotlight: spotlight(target, config),
        tooltip: place_tooltip(target, viewport, config),
    }
}

fn centered(size: Size, viewport: Viewport, m: f64) -> TooltipPlacement {
    TooltipPlacement {
        side: TooltipSide::Center,
        top: clamp(
            (viewport.height - size.height) / 2.0,
            m,
            viewport.height - m - size.height,
        ),
        left: clamp(
            (viewport.width - size.width) / 2.0,
            m,
            viewport.width - m - size.width,
        ),
        width: size.width,
        height: size.height,
    }
}

fn bottom_sheet(size: Size, viewport: Viewport, m: f64) -> TooltipPlacement {
    // Full width between the margins on small screens.
    let width = (viewport.width - m * 2.0).max(0.0);
    TooltipPlacement {
        side: TooltipSide::BottomSheet,
        top: clamp(viewport.height - m - size.height, m, f64::MAX),
        left: m,
        width,
        height: size.height,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cfg() -> PlacementConfig {
        PlacementConfig::default()
    }

    fn desktop() -> Viewport {
        Size::new(1200.0, 800.0)
    }

    fn within(t: &TooltipPlacement, vp: Viewport, m: f64) -> bool {
        let eps = 1e-6;
        t.left >= m - eps
            && t.top >= m - eps
            && t.left + t.width <= vp.width - m + eps
            && t.top + t.height <= vp.height - m + eps
    }

    #[test]
    fn spotlight_is_padded() {
        let hole = spotlight(Rect::new(100.0, 100.0, 50.0, 40.0), &cfg());
        assert_eq!(hole, Rect::new(92.0, 92.0, 66.0, 56.0));
    }

    #[test]
    fn prefers_below() {
        let t = place_tooltip(Rect::new(100.0, 500.0, 100.0, 40.0), desktop(), &cfg());
        assert_eq!(t.side, TooltipSide::Below);
        assert_eq!(t.top, 148.0 + 20.0);
    }

    #[test]
    fn falls_back_to_above_near_bottom() {
        let t = place_tooltip(Rect::new(700.0, 500.0, 100.0, 40.0), desktop(), &cfg());
        assert_eq!(t.side, TooltipSide::Above);
        assert!(t.top + t.height <= 692.0);
    }

    #[test]
    fn falls_back_to_right_for_tall_targets() {
        let t = place_tooltip(Rect::new(100.0, 40.0, 200.0, 600.0), desktop(), &cfg());
        assert_eq!(t.side, TooltipSide::Right);
    }

    #[test]
    fn falls_back_to_left() {
        let t = place_tooltip(Rect::new(100.0, 800.0, 360.0, 600.0), desktop(), &cfg());
        assert_eq!(t.side, TooltipSide::Left);
    }

    #[test]
    fn centers_when_target_fills_viewport() {
        let t = place_tooltip(Rect::new(10.0, 10.0, 1180.0, 780.0), desktop(), &cfg());
        assert_eq!(t.side, TooltipSide::Center);
        assert_eq!(t.left, (1200.0 - 320.0) / 2.0);
    }

    #[test]
    fn clamps_horizontally_at_edges() {
        let t = place_tooltip(Rect::new(100.0, 0.0, 30.0, 30.0), desktop(), &cfg());
        assert_eq!(t.side, TooltipSide::Below);
        assert_eq!(t.left, 20.0);
    }

    #[test]
    fn narrow_viewport_uses_bottom_sheet() {
        let vp = Size::new(360.0, 740.0);
        let t = place_tooltip(Rect::new(10.0, 10.0, 40.0, 40.0), vp, &cfg());
        assert_eq!(t.side, TooltipSide::BottomSheet);
        assert_eq!(t.left, 20.0);
        assert_eq!(t.width, 320.0);
        assert_eq!(t.top, 740.0 - 20.0 - 180.0);
    }

    #[test]
    fn resize_from_desktop_to_mobile_repositions() {
        let target = Rect::new(300.0, 300.0, 80.0, 40.0);
        let before = place(target, desktop(), &cfg());
        let after = place(target, Size::new(360.0, 640.0), &cfg());
        assert_eq!(before.tooltip.side, TooltipSide::Below);
        assert_eq!(after.tooltip.side, TooltipSide::BottomSheet);
        assert_ne!(before.tooltip, after.tooltip);
        assert!(within(&after.tooltip, Size::new(360.0, 640.0), 20.0));
    }

    #[test]
    fn unanchored_is_centered_on_desktop() {
        let t = place_unanchored(desktop(), &cfg());
        assert_eq!(t.side, TooltipSide::Center);
        assert!(within(&t, desktop(), 20.0));
    }

    proptest! {
        #[test]
        fn tooltip_stays_inside_margins(
            top in -200.0f64..2000.0,
            left in -200.0f64..3000.0,
            w in 0.0f64..1500.0,
            h in 0.0f64..1500.0,
            vw in 360.0f64..2560.0,
            vh in 220.0f64..1600.0,
        ) {
            let vp = Size::new(vw, vh);
            let t = place_tooltip(Rect::new(top, left, w, h), vp, &cfg());
            prop_assert!(within(&t, vp, 20.0), "{:?} escapes {:?}", t, vp);
        }
    }
}
