//! The viewer engine and its collaborator seams.
//!
//! [`Viewer`] owns everything the render pipeline needs for one open
//! slide:
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────┐
//! │                          Viewer                            │
//! │  ┌──────────┐ ┌───────────┐ ┌─────────┐ ┌──────────────┐   │
//! │  │ Viewport │ │ TileCache │ │ Minimap │ │  Prefetch    │   │
//! │  │ (camera) │ │ (dedup    │ │ (over-  │ │  scheduler   │   │
//! │  │          │ │  fetch)   │ │  view)  │ │  (debounce)  │   │
//! │  └──────────┘ └───────────┘ └─────────┘ └──────────────┘   │
//! └───────────┬──────────────────────────────┬─────────────────┘
//!             │ DrawSurface                  │ SlideTransport
//!             ▼                              ▼
//!        host painting                  slide server
//! ```
//!
//! - [`Viewer`] / [`ViewerConfig`] / [`ViewInfo`]: the engine
//! - [`DrawSurface`] / [`PixelSurface`]: the painting seam
//! - [`Minimap`]: overview + viewport rectangle
//! - [`PrefetchScheduler`]: debounced warm-up

mod engine;
mod minimap;
mod prefetch;
mod surface;

pub use engine::{ViewInfo, Viewer, ViewerConfig, ZOOM_STEP};
pub use minimap::{letterbox, Minimap};
pub use prefetch::{PrefetchScheduler, DEFAULT_PREFETCH_DELAY};
pub use surface::{Color, DrawSurface, PixelSurface, RED, WHITE};
