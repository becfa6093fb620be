//! # slideview
//!
//! A viewer engine for pyramidal Whole Slide Images (WSI) served over
//! HTTP.
//!
//! This library lets a client pan and zoom over a virtually unbounded
//! gigapixel image while only ever holding a bounded working set of tiles
//! in memory, fetching the rest on demand with low perceived latency.
//!
//! ## Features
//!
//! - **Progressive rendering**: every pass draws the best cached
//!   approximation immediately and streams sharper tiles in behind it
//! - **Deduplicated fetching**: at most one outstanding request per tile,
//!   no matter how many passes ask for it concurrently
//! - **Staleness-aware loading**: background work aborts the moment the
//!   camera leaves the pass it was started for
//! - **Debounced prefetch**: the next coarser level is warmed once the
//!   user goes quiet, so zooming out is instant
//! - **Minimap**: a letterboxed overview with the live viewport outlined
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`slide`] - Immutable pyramid metadata
//! - [`view`] - Viewport state and the pure tile/coordinate math
//! - [`tile`] - Tile cache with deduplicated async fetch
//! - [`viewer`] - The render pipeline, minimap and prefetch scheduler
//! - [`transport`] - The HTTP seam to the slide server
//! - [`error`] - Error taxonomy
//! - [`config`] - CLI configuration
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use slideview::{HttpSlideTransport, PixelSurface, Viewer, ViewerConfig, WHITE};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let base = url::Url::parse("http://localhost:5000/")?;
//!     let transport = Arc::new(HttpSlideTransport::new(base, "sample.svs"));
//!     let surface = Arc::new(PixelSurface::new(800, 600, WHITE));
//!
//!     let viewer = Viewer::open(transport, surface, None, ViewerConfig::default()).await?;
//!
//!     // Zoom toward a point and re-render.
//!     viewer.zoom_around(2.0, (400.0, 300.0)).await;
//!     viewer.render().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod slide;
pub mod tile;
pub mod transport;
pub mod view;
pub mod viewer;

// Re-export commonly used types
pub use config::Config;
pub use error::{MetadataError, TileError, TransportError};
pub use slide::SlideMetadata;
pub use tile::{split_stitched, TileBounds, TileCache, TileSlot};
pub use transport::{HttpSlideTransport, SlideTransport};
pub use view::{
    grid_extent, sort_tiles_from_center, tile_dimensions, visible_tiles, Rect, TileKey, Viewport,
    ZoomConfig, ABSOLUTE_MIN_ZOOM, DEFAULT_MAX_ZOOM, DEFAULT_TILE_SIZE,
};
pub use viewer::{
    letterbox, Color, DrawSurface, Minimap, PixelSurface, PrefetchScheduler, ViewInfo, Viewer,
    ViewerConfig, DEFAULT_PREFETCH_DELAY, RED, WHITE, ZOOM_STEP,
};
