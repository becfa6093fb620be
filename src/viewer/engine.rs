//! The viewer engine: progressive render pipeline over one open slide.
//!
//! A render pass runs `Idle -> ImmediateDraw -> BackgroundLoad -> Idle`:
//!
//! 1. **Immediate phase** (no network waits): clear the surface, draw the
//!    best already-cached approximation (coarser-level tiles, else the
//!    overview section), refresh the info readouts, release the phase
//!    guard. Pan and zoom never wait on tile decoding.
//! 2. **Minimap sync**: redraw the overview with the live viewport
//!    rectangle.
//! 3. **Background phase**: await each visible tile in center-out order
//!    (raster order on the very first pass), re-checking the live
//!    viewport before every draw and aborting the rest of the pass the
//!    moment the level changes or the camera has drifted too far.
//! 4. Arm the debounced prefetch of the next coarser level.
//!
//! The guard covers only the immediate phase: background loading of one
//! pass may still be in flight while the next pass's immediate phase
//! runs. A trigger arriving during an immediate phase is dropped; that
//! is lossless because a pass reads the viewport state itself, not an
//! event queue.
//!
//! All state lives behind `tokio::sync` primitives and the engine is
//! cheap to clone (`Arc` inside), so UI callbacks, background
//! continuations and the prefetch task can all hold it.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::RgbaImage;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::error::MetadataError;
use crate::slide::SlideMetadata;
use crate::tile::TileCache;
use crate::transport::SlideTransport;
use crate::view::{
    sort_tiles_from_center, visible_tiles, Rect, TileKey, Viewport, ZoomConfig, DEFAULT_TILE_SIZE,
};

use super::minimap::Minimap;
use super::prefetch::{PrefetchScheduler, DEFAULT_PREFETCH_DELAY};
use super::surface::DrawSurface;

/// Zoom multiplier of the zoom-in/zoom-out steps.
pub const ZOOM_STEP: f64 = 1.25;

/// Background-phase abort threshold for offset drift, in base-level px.
const PAN_DRIFT_LIMIT: f64 = 100.0;

/// Background-phase abort threshold for zoom drift.
const ZOOM_DRIFT_LIMIT: f64 = 0.1;

// =============================================================================
// Configuration
// =============================================================================

/// Tunables for one viewer instance.
#[derive(Debug, Clone)]
pub struct ViewerConfig {
    /// Tile edge length the server cuts levels into
    pub tile_size: u32,

    /// Zoom-range policy
    pub zoom: ZoomConfig,

    /// Quiet period before prefetch fires
    pub prefetch_delay: Duration,

    /// Bound on resolved cache entries; `None` keeps every tile for the
    /// lifetime of the open slide
    pub cache_capacity: Option<NonZeroUsize>,

    /// Warm the next coarser level with one stitched batch request
    /// instead of per-tile fetches (falls back per-tile on failure)
    pub batch_prefetch: bool,
}

impl Default for ViewerConfig {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            zoom: ZoomConfig::default(),
            prefetch_delay: DEFAULT_PREFETCH_DELAY,
            cache_capacity: None,
            batch_prefetch: false,
        }
    }
}

// =============================================================================
// Info readouts
// =============================================================================

/// Read-only readouts refreshed during every immediate phase.
#[derive(Debug, Clone, Default)]
pub struct ViewInfo {
    pub level: usize,
    pub level_dimensions: (u32, u32),
    pub downsample: f64,
    pub visible_tiles: usize,
    pub tile_size: u32,
    pub offset: (f64, f64),
    pub zoom: f64,
}

// =============================================================================
// Viewer
// =============================================================================

/// Tile-viewer engine for one open slide.
///
/// Cloning is cheap and every clone drives the same viewer.
#[derive(Clone)]
pub struct Viewer {
    inner: Arc<Inner>,
}

struct Inner {
    metadata: SlideMetadata,
    viewport: RwLock<Viewport>,
    cache: TileCache,
    surface: Arc<dyn DrawSurface>,
    overview: Option<Arc<RgbaImage>>,
    minimap: Option<Minimap>,
    prefetch: PrefetchScheduler,
    /// Re-entrancy guard covering the immediate phase only
    drawing: AtomicBool,
    /// First pass after fit-to-view loads in raster order
    first_pass: AtomicBool,
    config: ViewerConfig,
    info: RwLock<ViewInfo>,
}

impl Viewer {
    /// Open a slide: fetch and validate metadata, fetch the overview
    /// image, set up the fit-to-view camera and run the initial render
    /// pass.
    ///
    /// Metadata failure is fatal: no partial viewer is produced. A
    /// failed overview fetch only costs the coarse fallback and minimap
    /// content and is downgraded to a warning.
    pub async fn open(
        transport: Arc<dyn SlideTransport>,
        surface: Arc<dyn DrawSurface>,
        minimap_surface: Option<Arc<dyn DrawSurface>>,
        config: ViewerConfig,
    ) -> Result<Self, MetadataError> {
        let metadata = transport.fetch_metadata().await?;
        metadata.validate()?;
        info!(
            slide = transport.slide_id(),
            width = metadata.dimensions.0,
            height = metadata.dimensions.1,
            levels = metadata.level_count(),
            "slide opened"
        );

        let overview = match transport.fetch_thumbnail().await {
            Ok(bytes) => match image::load_from_memory(&bytes) {
                Ok(img) => Some(Arc::new(img.to_rgba8())),
                Err(e) => {
                    warn!(error = %e, "overview image undecodable, continuing without it");
                    None
                }
            },
            Err(e) => {
                warn!(error = %e, "overview image unavailable, continuing without it");
                None
            }
        };

        let (canvas_w, canvas_h) = surface.size();
        let viewport = Viewport::new(
            metadata.dimensions.0,
            metadata.dimensions.1,
            canvas_w,
            canvas_h,
            config.zoom,
        );

        let cache = match config.cache_capacity {
            Some(capacity) => TileCache::with_capacity(Arc::clone(&transport), capacity),
            None => TileCache::new(Arc::clone(&transport)),
        };

        let minimap = match (&overview, minimap_surface) {
            (Some(thumb), Some(map_surface)) => Some(Minimap::new(
                map_surface,
                Arc::clone(thumb),
                metadata.dimensions,
            )),
            _ => None,
        };

        let viewer = Self {
            inner: Arc::new(Inner {
                prefetch: PrefetchScheduler::new(config.prefetch_delay),
                metadata,
                viewport: RwLock::new(viewport),
                cache,
                surface,
                overview,
                minimap,
                drawing: AtomicBool::new(false),
                first_pass: AtomicBool::new(true),
                config,
                info: RwLock::new(ViewInfo::default()),
            }),
        };

        viewer.render().await;
        Ok(viewer)
    }

    /// The pyramid metadata of the open slide.
    pub fn metadata(&self) -> &SlideMetadata {
        &self.inner.metadata
    }

    /// Snapshot of the current camera state.
    pub async fn viewport(&self) -> Viewport {
        self.inner.viewport.read().await.clone()
    }

    /// Snapshot of the info readouts from the latest immediate phase.
    pub async fn info(&self) -> ViewInfo {
        self.inner.info.read().await.clone()
    }

    /// The tile cache backing this viewer.
    pub fn cache(&self) -> &TileCache {
        &self.inner.cache
    }

    // =========================================================================
    // Camera mutations
    // =========================================================================
    //
    // Each mutation clamps before returning; the UI calls `render` (or
    // `trigger_render`) afterwards.

    /// Pan by a delta in canvas pixels.
    pub async fn pan_by(&self, dx: f64, dy: f64) {
        self.inner.viewport.write().await.pan_by(dx, dy);
    }

    /// Multiply the zoom by `factor` around a canvas-point pivot.
    pub async fn zoom_around(&self, factor: f64, pivot: (f64, f64)) {
        self.inner.viewport.write().await.zoom_around(factor, pivot);
    }

    /// One zoom-in step around the canvas center.
    pub async fn zoom_in(&self) {
        self.inner.viewport.write().await.zoom_centered(ZOOM_STEP);
    }

    /// One zoom-out step around the canvas center.
    pub async fn zoom_out(&self) {
        self.inner
            .viewport
            .write()
            .await
            .zoom_centered(1.0 / ZOOM_STEP);
    }

    /// Back to fit-to-view, centered.
    pub async fn reset_to_fit(&self) {
        self.inner.viewport.write().await.reset_to_fit();
    }

    // =========================================================================
    // Render pipeline
    // =========================================================================

    /// Fire a render pass without waiting for its background phase.
    pub fn trigger_render(&self) {
        let viewer = self.clone();
        tokio::spawn(async move { viewer.render().await });
    }

    /// Run one full render pass: immediate draw, minimap sync, background
    /// tile loading, prefetch arming.
    ///
    /// Returns immediately (without drawing) when another pass's
    /// immediate phase is in progress; the dropped trigger is lossless
    /// because the next one reads fresh viewport state.
    pub async fn render(&self) {
        let inner = &self.inner;
        if inner.drawing.swap(true, Ordering::AcqRel) {
            debug!("render trigger dropped, immediate phase in progress");
            return;
        }

        // This snapshot is the pass's generation token: background draws
        // position against it and abort once the live state leaves it.
        let pass = inner.viewport.read().await.clone();
        let level = inner.metadata.best_level_for_zoom(pass.zoom());
        let mut tiles = visible_tiles(&inner.metadata, level, &pass, inner.config.tile_size);
        debug!(
            level,
            tiles = tiles.len(),
            zoom = pass.zoom(),
            "render pass"
        );

        self.draw_immediate(&pass, level, tiles.len()).await;
        inner.drawing.store(false, Ordering::Release);

        if let Some(minimap) = &inner.minimap {
            minimap.update(&pass);
        }

        // On the very first pass after fit-to-view nothing is cached yet,
        // so center-out ordering buys nothing; keep raster order there.
        if !inner.first_pass.swap(false, Ordering::AcqRel) {
            sort_tiles_from_center(&mut tiles, &inner.metadata, level, &pass, inner.config.tile_size);
        }

        self.load_tiles(&pass, level, tiles).await;
        self.arm_prefetch(level);
    }

    /// Immediate phase: best available approximation without any network
    /// wait, then refresh the info readouts.
    async fn draw_immediate(&self, pass: &Viewport, level: usize, visible_count: usize) {
        let inner = &self.inner;
        inner.surface.clear();

        // Prefer any resolved tile from a coarser level overlapping the
        // viewport; the first coarser level that contributes wins.
        let mut fallback_drawn = false;
        for coarse in (level + 1)..inner.metadata.level_count() {
            let Some(downsample) = inner.metadata.level_downsample(coarse) else {
                continue;
            };
            for key in visible_tiles(&inner.metadata, coarse, pass, inner.config.tile_size) {
                if let Some(tile) = inner.cache.peek_resolved(&key).await {
                    let dst = self.tile_dest_rect(pass, downsample, key, &tile);
                    inner.surface.draw_image(&tile, dst);
                    fallback_drawn = true;
                }
            }
            if fallback_drawn {
                break;
            }
        }

        // Otherwise scale the always-resident overview over the whole
        // viewport.
        if !fallback_drawn {
            if let Some(overview) = &inner.overview {
                let (image_w, image_h) = (
                    f64::from(inner.metadata.dimensions.0),
                    f64::from(inner.metadata.dimensions.1),
                );
                let visible = pass.visible_rect();
                let sx = visible.x / image_w * f64::from(overview.width());
                let sy = visible.y / image_h * f64::from(overview.height());
                let sw = visible.width / image_w * f64::from(overview.width());
                let sh = visible.height / image_h * f64::from(overview.height());
                let (canvas_w, canvas_h) = pass.canvas_size();
                inner.surface.draw_image_section(
                    overview,
                    Rect::new(sx, sy, sw, sh),
                    Rect::new(0.0, 0.0, canvas_w, canvas_h),
                );
            }
        }

        *inner.info.write().await = ViewInfo {
            level,
            level_dimensions: inner.metadata.level_dimensions(level).unwrap_or((0, 0)),
            downsample: inner.metadata.level_downsample(level).unwrap_or(1.0),
            visible_tiles: visible_count,
            tile_size: inner.config.tile_size,
            offset: pass.offset(),
            zoom: pass.zoom(),
        };
    }

    /// Background phase: await tiles in order, draw survivors, abort on
    /// staleness.
    async fn load_tiles(&self, pass: &Viewport, level: usize, tiles: Vec<TileKey>) {
        let inner = &self.inner;
        let Some(downsample) = inner.metadata.level_downsample(level) else {
            return;
        };

        let total = tiles.len();
        let mut drawn = 0;
        for key in tiles {
            match inner.cache.get_tile(key).await {
                Ok(tile) => {
                    // Staleness checks against the live viewport, re-read
                    // at every checkpoint rather than closed over.
                    let live = inner.viewport.read().await.clone();
                    let live_level = inner.metadata.best_level_for_zoom(live.zoom());
                    if live_level != level {
                        debug!(level, live_level, "level changed, aborting pass");
                        break;
                    }
                    if viewport_drifted(&live, pass) {
                        debug!(level, "viewport drifted, aborting pass");
                        break;
                    }

                    let dst = self.tile_dest_rect(pass, downsample, key, &tile);
                    inner.surface.draw_image(&tile, dst);
                    drawn += 1;
                }
                // Tile unavailable this pass; no retry, no pass abort.
                Err(e) => debug!(error = %e, "skipping tile"),
            }
        }
        debug!(drawn, total, level, "background phase finished");
    }

    /// Canvas destination of a tile, sized by its *actual* decoded pixel
    /// dimensions so partial edge tiles are not stretched.
    fn tile_dest_rect(
        &self,
        pass: &Viewport,
        downsample: f64,
        key: TileKey,
        tile: &RgbaImage,
    ) -> Rect {
        let tile_size = f64::from(self.inner.config.tile_size);
        let origin = (
            f64::from(key.col) * tile_size * downsample,
            f64::from(key.row) * tile_size * downsample,
        );
        let (x, y) = pass.image_to_canvas(origin);
        Rect::new(
            x,
            y,
            f64::from(tile.width()) * downsample * pass.zoom(),
            f64::from(tile.height()) * downsample * pass.zoom(),
        )
    }

    // =========================================================================
    // Prefetch
    // =========================================================================

    fn arm_prefetch(&self, level: usize) {
        let viewer = self.clone();
        self.inner
            .prefetch
            .arm(async move { viewer.warm_next_level(level).await });
    }

    /// Warm every tile the viewport would need at the next coarser level,
    /// so a subsequent zoom-out hits the cache. Failures are logged and
    /// swallowed.
    async fn warm_next_level(&self, level: usize) {
        let inner = &self.inner;
        let next = level + 1;
        if next >= inner.metadata.level_count() {
            return;
        }

        let viewport = inner.viewport.read().await.clone();
        let tiles = visible_tiles(&inner.metadata, next, &viewport, inner.config.tile_size);
        debug!(next, tiles = tiles.len(), "prefetching next coarser level");

        if inner.config.batch_prefetch {
            match inner
                .cache
                .warm_batch(&inner.metadata, next, &tiles, inner.config.tile_size)
                .await
            {
                Ok(()) => return,
                Err(e) => debug!(error = %e, "batch prefetch failed, falling back to per-tile"),
            }
        }

        for key in tiles {
            if let Err(e) = inner.cache.get_tile(key).await {
                debug!(error = %e, "prefetch tile failed");
            }
        }
    }
}

/// Epsilon-drift staleness: has the camera moved materially since the
/// pass snapshot was taken?
fn viewport_drifted(live: &Viewport, pass: &Viewport) -> bool {
    let (lx, ly) = live.offset();
    let (px, py) = pass.offset();
    (lx - px).abs() > PAN_DRIFT_LIMIT
        || (ly - py).abs() > PAN_DRIFT_LIMIT
        || (live.zoom() - pass.zoom()).abs() > ZOOM_DRIFT_LIMIT
}

// =============================================================================
// Tests
// =============================================================================
