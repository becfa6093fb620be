//! Shared test doubles: a counting/gating mock transport and a recording
//! draw surface.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use bytes::Bytes;
use image::{Rgba, RgbaImage};
use tokio::sync::Semaphore;

use slideview::{Rect, SlideMetadata, SlideTransport, TransportError};

/// PNG-encode a solid-color raster.
pub fn encode_png(width: u32, height: u32, color: [u8; 4]) -> Bytes {
    let img = RgbaImage::from_pixel(width, height, Rgba(color));
    let mut buf = std::io::Cursor::new(Vec::new());
    img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
    Bytes::from(buf.into_inner())
}

/// Metadata JSON for a 10000x8000 slide with three levels.
pub const THREE_LEVEL_INFO: &str = r#"{
    "dimensions": [10000, 8000],
    "level_dimensions": [[10000, 8000], [2500, 2000], [625, 500]],
    "level_downsamples": [1.0, 4.0, 16.0]
}"#;

/// Metadata JSON for a 2048x1536 slide with two levels.
pub const TWO_LEVEL_INFO: &str = r#"{
    "dimensions": [2048, 1536],
    "level_dimensions": [[2048, 1536], [512, 384]],
    "level_downsamples": [1.0, 4.0]
}"#;

// =============================================================================
// MockTransport
// =============================================================================

/// Configurable in-memory slide server.
pub struct MockTransport {
    info: &'static str,
    thumbnail: Option<Bytes>,
    /// Tiles that answer with a 500
    fail_tiles: Vec<(usize, u32, u32)>,
    /// Levels whose tile fetches block on [`MockTransport::release`]
    gated_levels: Vec<usize>,
    gate: Semaphore,
    /// Whether `tiles_batch` succeeds or answers with a 500
    batch_ok: bool,
    tile_fetches: StdMutex<HashMap<usize, usize>>,
    batch_fetches: AtomicUsize,
}

impl MockTransport {
    pub fn new(info: &'static str) -> Self {
        Self {
            info,
            thumbnail: None,
            fail_tiles: Vec::new(),
            gated_levels: Vec::new(),
            gate: Semaphore::new(0),
            batch_ok: false,
            tile_fetches: StdMutex::new(HashMap::new()),
            batch_fetches: AtomicUsize::new(0),
        }
    }

    pub fn with_thumbnail(mut self, width: u32, height: u32) -> Self {
        self.thumbnail = Some(encode_png(width, height, [0, 180, 0, 255]));
        self
    }

    pub fn with_failing_tiles(mut self, tiles: Vec<(usize, u32, u32)>) -> Self {
        self.fail_tiles = tiles;
        self
    }

    pub fn with_gated_levels(mut self, levels: Vec<usize>) -> Self {
        self.gated_levels = levels;
        self
    }

    pub fn with_batch(mut self) -> Self {
        self.batch_ok = true;
        self
    }

    /// Let `count` gated tile fetches proceed.
    pub fn release(&self, count: usize) {
        self.gate.add_permits(count);
    }

    /// Number of single-tile fetches seen for `level`.
    pub fn tile_fetches(&self, level: usize) -> usize {
        *self.tile_fetches.lock().unwrap().get(&level).unwrap_or(&0)
    }

    /// Total single-tile fetches across all levels.
    pub fn total_tile_fetches(&self) -> usize {
        self.tile_fetches.lock().unwrap().values().sum()
    }

    pub fn batch_fetches(&self) -> usize {
        self.batch_fetches.load(Ordering::SeqCst)
    }

    fn metadata(&self) -> SlideMetadata {
        serde_json::from_str(self.info).unwrap()
    }
}

#[async_trait]
impl SlideTransport for MockTransport {
    fn slide_id(&self) -> &str {
        "mock.svs"
    }

    async fn fetch_metadata(&self) -> Result<SlideMetadata, TransportError> {
        Ok(self.metadata())
    }

    async fn fetch_thumbnail(&self) -> Result<Bytes, TransportError> {
        self.thumbnail
            .clone()
            .ok_or_else(|| TransportError::NotFound("thumbnail".to_string()))
    }

    async fn fetch_tile(&self, level: usize, col: u32, row: u32) -> Result<Bytes, TransportError> {
        *self.tile_fetches.lock().unwrap().entry(level).or_insert(0) += 1;

        if self.gated_levels.contains(&level) {
            let permit = self.gate.acquire().await.expect("gate closed");
            permit.forget();
        }
        if self.fail_tiles.contains(&(level, col, row)) {
            return Err(TransportError::Status {
                status: 500,
                url: format!("mock://tile/{level}/{col}/{row}"),
            });
        }

        // Edge tiles come back at their actual (partial) size.
        let meta = self.metadata();
        let (level_w, level_h) = meta.level_dimensions(level).unwrap();
        let w = 256.min(level_w - col * 256);
        let h = 256.min(level_h - row * 256);
        Ok(encode_png(w, h, [60, 60, 60, 255]))
    }

    async fn fetch_tile_batch(
        &self,
        level: usize,
        tiles: &[(u32, u32)],
        tile_size: u32,
    ) -> Result<Bytes, TransportError> {
        self.batch_fetches.fetch_add(1, Ordering::SeqCst);
        if !self.batch_ok {
            return Err(TransportError::Status {
                status: 500,
                url: "mock://tiles_batch".to_string(),
            });
        }

        let min_col = tiles.iter().map(|t| t.0).min().unwrap_or(0);
        let max_col = tiles.iter().map(|t| t.0).max().unwrap_or(0);
        let min_row = tiles.iter().map(|t| t.1).min().unwrap_or(0);
        let max_row = tiles.iter().map(|t| t.1).max().unwrap_or(0);
        let width = (max_col - min_col + 1) * tile_size;
        let height = (max_row - min_row + 1) * tile_size;
        let _ = level;
        Ok(encode_png(width, height, [90, 90, 90, 255]))
    }
}

// =============================================================================
// RecordingSurface
// =============================================================================

/// One recorded draw command.
#[derive(Debug, Clone)]
pub enum DrawCommand {
    Clear,
    Fill,
    Image { dst: Rect },
    Section { dst: Rect },
    Stroke { rect: Rect },
}

/// Draw surface that records commands instead of painting.
pub struct RecordingSurface {
    size: (f64, f64),
    commands: StdMutex<Vec<DrawCommand>>,
}

impl RecordingSurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            size: (width, height),
            commands: StdMutex::new(Vec::new()),
        }
    }

    pub fn commands(&self) -> Vec<DrawCommand> {
        self.commands.lock().unwrap().clone()
    }

    /// Forget everything recorded so far.
    pub fn reset(&self) {
        self.commands.lock().unwrap().clear();
    }

    /// Number of `draw_image` commands recorded.
    pub fn image_draws(&self) -> usize {
        self.commands()
            .iter()
            .filter(|c| matches!(c, DrawCommand::Image { .. }))
            .count()
    }

    /// Number of `draw_image_section` commands recorded.
    pub fn section_draws(&self) -> usize {
        self.commands()
            .iter()
            .filter(|c| matches!(c, DrawCommand::Section { .. }))
            .count()
    }

    fn push(&self, command: DrawCommand) {
        self.commands.lock().unwrap().push(command);
    }
}

impl slideview::DrawSurface for RecordingSurface {
    fn size(&self) -> (f64, f64) {
        self.size
    }

    fn clear(&self) {
        self.push(DrawCommand::Clear);
    }

    fn fill(&self, _color: slideview::Color) {
        self.push(DrawCommand::Fill);
    }

    fn draw_image(&self, _image: &RgbaImage, dst: Rect) {
        self.push(DrawCommand::Image { dst });
    }

    fn draw_image_section(&self, _image: &RgbaImage, _src: Rect, dst: Rect) {
        self.push(DrawCommand::Section { dst });
    }

    fn stroke_rect(&self, rect: Rect, _color: slideview::Color, _line_width: f64) {
        self.push(DrawCommand::Stroke { rect });
    }
}
