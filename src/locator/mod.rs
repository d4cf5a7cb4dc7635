//! Target locator — finds live elements for tour steps and places the
//! spotlight and tooltip around them.

pub mod attachment;
pub mod geometry;
pub mod surface;
pub mod tracker;
pub mod watch;

pub use attachment::{AttachmentReport, TourAttachments};
pub use geometry::{PlacementConfig, PlacementResult, Rect, Size, TooltipPlacement, TooltipSide, Viewport};
pub use surface::{Surface, SurfaceChange, VirtualSurface};
pub use tracker::{TargetLocator, TargetStatus, TargetTracking, TargetView};
pub use watch::{CancelToken, WatchOutcome, WatchPolicy, watch_for};
