//! Configuration for the snapshot CLI.
//!
//! All options can also be set via environment variables with the
//! `SLIDEVIEW_` prefix:
//!
//! - `SLIDEVIEW_URL` - Base URL of the slide server (required)
//! - `SLIDEVIEW_SLIDE` - Slide identifier on the server (required)
//! - `SLIDEVIEW_WIDTH` / `SLIDEVIEW_HEIGHT` - Canvas size (default: 800x600)
//! - `SLIDEVIEW_TILE_SIZE` - Tile edge length (default: 256)
//! - `SLIDEVIEW_CACHE_TILES` - Resolved-tile cache bound, 0 = unbounded
//! - `SLIDEVIEW_PREFETCH_DELAY_MS` - Prefetch quiet period (default: 500)

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::view::{ZoomConfig, DEFAULT_MAX_ZOOM, DEFAULT_TILE_SIZE};
use crate::viewer::ViewerConfig;

// =============================================================================
// Default Values
// =============================================================================

/// Default logical canvas width in pixels.
pub const DEFAULT_CANVAS_WIDTH: u32 = 800;

/// Default logical canvas height in pixels.
pub const DEFAULT_CANVAS_HEIGHT: u32 = 600;

/// Default minimap frame edge length in pixels.
pub const DEFAULT_MINIMAP_SIZE: u32 = 200;

/// Default prefetch quiet period in milliseconds.
pub const DEFAULT_PREFETCH_DELAY_MS: u64 = 500;

// =============================================================================
// CLI Arguments
// =============================================================================

/// slideview - a headless viewer for pyramidal Whole Slide Images.
///
/// Opens a slide on a slide server, positions the camera, runs one full
/// progressive render pass and writes the result as a PNG snapshot.
#[derive(Parser, Debug, Clone)]
#[command(name = "slideview")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server
    // =========================================================================
    /// Base URL of the slide server, e.g. http://localhost:5000/
    #[arg(long, env = "SLIDEVIEW_URL")]
    pub url: String,

    /// Slide identifier on the server.
    #[arg(long, env = "SLIDEVIEW_SLIDE")]
    pub slide: String,

    // =========================================================================
    // Canvas
    // =========================================================================
    /// Logical canvas width in pixels.
    #[arg(long, default_value_t = DEFAULT_CANVAS_WIDTH, env = "SLIDEVIEW_WIDTH")]
    pub width: u32,

    /// Logical canvas height in pixels.
    #[arg(long, default_value_t = DEFAULT_CANVAS_HEIGHT, env = "SLIDEVIEW_HEIGHT")]
    pub height: u32,

    // =========================================================================
    // Camera
    // =========================================================================
    /// Zoom factor to apply after the initial fit-to-view (canvas pixels
    /// per base-level image pixel).
    #[arg(long)]
    pub zoom: Option<f64>,

    /// Image X coordinate (base-level pixels) to center the view on.
    #[arg(long)]
    pub center_x: Option<f64>,

    /// Image Y coordinate (base-level pixels) to center the view on.
    #[arg(long)]
    pub center_y: Option<f64>,

    /// Allow zooming out below the fit-to-view zoom, down to the absolute
    /// floor.
    #[arg(long, default_value_t = false, env = "SLIDEVIEW_ALLOW_ZOOM_BELOW_FIT")]
    pub allow_zoom_below_fit: bool,

    /// Hard upper zoom limit.
    #[arg(long, default_value_t = DEFAULT_MAX_ZOOM, env = "SLIDEVIEW_MAX_ZOOM")]
    pub max_zoom: f64,

    // =========================================================================
    // Tiles and caching
    // =========================================================================
    /// Tile edge length used by the server.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "SLIDEVIEW_TILE_SIZE")]
    pub tile_size: u32,

    /// Maximum number of resolved tiles to keep cached (0 = unbounded,
    /// the default: tiles live until the slide is closed).
    #[arg(long, default_value_t = 0, env = "SLIDEVIEW_CACHE_TILES")]
    pub cache_tiles: usize,

    /// Warm the next coarser level with a single stitched batch request.
    #[arg(long, default_value_t = false, env = "SLIDEVIEW_BATCH")]
    pub batch: bool,

    /// Prefetch quiet period in milliseconds.
    #[arg(long, default_value_t = DEFAULT_PREFETCH_DELAY_MS, env = "SLIDEVIEW_PREFETCH_DELAY_MS")]
    pub prefetch_delay_ms: u64,

    // =========================================================================
    // Output
    // =========================================================================
    /// Where to write the snapshot PNG.
    #[arg(short, long, default_value = "snapshot.png")]
    pub output: PathBuf,

    /// Also write a minimap PNG next to the snapshot.
    #[arg(long)]
    pub minimap: Option<PathBuf>,

    /// Minimap frame edge length in pixels.
    #[arg(long, default_value_t = DEFAULT_MINIMAP_SIZE)]
    pub minimap_size: u32,

    /// Print slide metadata and exit without rendering.
    #[arg(long, default_value_t = false)]
    pub info: bool,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("server URL is required. Set --url or SLIDEVIEW_URL".to_string());
        }
        if self.slide.is_empty() {
            return Err("slide identifier is required. Set --slide or SLIDEVIEW_SLIDE".to_string());
        }
        if self.width == 0 || self.height == 0 {
            return Err("canvas dimensions must be greater than 0".to_string());
        }
        if self.tile_size == 0 {
            return Err("tile_size must be greater than 0".to_string());
        }
        if self.max_zoom <= 0.0 || !self.max_zoom.is_finite() {
            return Err("max_zoom must be a positive number".to_string());
        }
        if let Some(zoom) = self.zoom {
            if zoom <= 0.0 || !zoom.is_finite() {
                return Err("zoom must be a positive number".to_string());
            }
        }
        if self.minimap_size == 0 {
            return Err("minimap_size must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Build the engine configuration from the CLI options.
    pub fn viewer_config(&self) -> ViewerConfig {
        ViewerConfig {
            tile_size: self.tile_size,
            zoom: ZoomConfig {
                max_zoom: self.max_zoom,
                allow_below_fit: self.allow_zoom_below_fit,
            },
            prefetch_delay: Duration::from_millis(self.prefetch_delay_ms),
            cache_capacity: NonZeroUsize::new(self.cache_tiles),
            batch_prefetch: self.batch,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
