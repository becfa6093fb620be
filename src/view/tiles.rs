//! Tile-grid math: which tiles of a pyramid level intersect the viewport.
//!
//! A level of `w x h` pixels is cut into tiles of a fixed edge length; the
//! last column/row may be partial. [`visible_tiles`] over-covers the
//! viewport (never under-covers), which is what guarantees a gap-free
//! frame once every returned tile is drawn.

use crate::slide::SlideMetadata;

use super::viewport::Viewport;

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

// =============================================================================
// TileKey
// =============================================================================

/// Address of one tile: pyramid level plus grid column/row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileKey {
    /// Pyramid level (0 = highest resolution)
    pub level: usize,

    /// Tile column (0-indexed from the left)
    pub col: u32,

    /// Tile row (0-indexed from the top)
    pub row: u32,
}

impl TileKey {
    pub fn new(level: usize, col: u32, row: u32) -> Self {
        Self { level, col, row }
    }
}

impl std::fmt::Display for TileKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "L{} C{} R{}", self.level, self.col, self.row)
    }
}

// =============================================================================
// Grid math
// =============================================================================

/// Number of tile columns and rows covering a level of `w x h` pixels.
pub fn grid_extent(level_w: u32, level_h: u32, tile_size: u32) -> (u32, u32) {
    (level_w.div_ceil(tile_size), level_h.div_ceil(tile_size))
}

/// Pixel dimensions of one tile within its level, accounting for partial
/// tiles at the right/bottom edges.
pub fn tile_dimensions(level_w: u32, level_h: u32, tile_size: u32, col: u32, row: u32) -> (u32, u32) {
    let w = tile_size.min(level_w.saturating_sub(col * tile_size));
    let h = tile_size.min(level_h.saturating_sub(row * tile_size));
    (w, h)
}

/// Compute the set of tiles of `level` intersecting the viewport.
///
/// The viewport rectangle is taken at base-level scale, converted into the
/// level's pixel space (top-left floored, bottom-right ceiled, so the
/// result over-covers), then into tile-grid coordinates and clipped to the
/// grid. Deterministic for identical inputs; tiles come out in row-major
/// order.
///
/// Returns an empty set when `level` is out of range.
pub fn visible_tiles(
    meta: &SlideMetadata,
    level: usize,
    viewport: &Viewport,
    tile_size: u32,
) -> Vec<TileKey> {
    let Some(downsample) = meta.level_downsample(level) else {
        return Vec::new();
    };
    let Some((level_w, level_h)) = meta.level_dimensions(level) else {
        return Vec::new();
    };

    let visible = viewport.visible_rect();

    // Viewport corners in this level's pixel space; over-cover.
    let left = (visible.x / downsample).floor();
    let top = (visible.y / downsample).floor();
    let right = (visible.right() / downsample).ceil();
    let bottom = (visible.bottom() / downsample).ceil();

    // Tile-grid coordinates of both corners.
    let first_col = (left / f64::from(tile_size)).floor();
    let first_row = (top / f64::from(tile_size)).floor();
    let last_col = (right / f64::from(tile_size)).floor();
    let last_row = (bottom / f64::from(tile_size)).floor();

    let (cols, rows) = grid_extent(level_w, level_h, tile_size);
    let max_col = cols - 1;
    let max_row = rows - 1;

    let first_col = (first_col.max(0.0) as u32).min(max_col);
    let first_row = (first_row.max(0.0) as u32).min(max_row);
    let last_col = (last_col.max(0.0) as u32).min(max_col);
    let last_row = (last_row.max(0.0) as u32).min(max_row);

    let mut tiles = Vec::with_capacity(
        ((last_col - first_col + 1) * (last_row - first_row + 1)) as usize,
    );
    for row in first_row..=last_row {
        for col in first_col..=last_col {
            tiles.push(TileKey::new(level, col, row));
        }
    }
    tiles
}

/// Order tiles by Euclidean distance from the viewport center, both
/// expressed in tile-grid units.
///
/// Centric loading grows the image radially outward from what the user is
/// looking at instead of filling in raster-scan order.
pub fn sort_tiles_from_center(
    tiles: &mut [TileKey],
    meta: &SlideMetadata,
    level: usize,
    viewport: &Viewport,
    tile_size: u32,
) {
    let Some(downsample) = meta.level_downsample(level) else {
        return;
    };

    let visible = viewport.visible_rect();
    let center_x = (visible.x + visible.width / 2.0) / (f64::from(tile_size) * downsample);
    let center_y = (visible.y + visible.height / 2.0) / (f64::from(tile_size) * downsample);

    let distance = |t: &TileKey| {
        let dx = f64::from(t.col) + 0.5 - center_x;
        let dy = f64::from(t.row) + 0.5 - center_y;
        dx * dx + dy * dy
    };
    tiles.sort_by(|a, b| {
        distance(a)
            .partial_cmp(&distance(b))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
}

// =============================================================================
// Tests
// =============================================================================
