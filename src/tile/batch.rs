//! Batch warm-up: one stitched request instead of many tile requests.
//!
//! The batch endpoint returns a single raster covering the bounding box
//! of the requested tiles, laid out in `tile_size` cells from the box
//! origin. Splitting that raster repopulates the cache exactly as if each
//! tile had been fetched individually, including the smaller actual
//! dimensions of edge tiles, which are cropped out of their cell.
//!
//! Batch failure is recoverable: callers fall back to per-tile fetches
//! for the same tile set.

use image::RgbaImage;
use tracing::debug;

use crate::error::TileError;
use crate::slide::SlideMetadata;
use crate::view::{tile_dimensions, TileKey};

use super::cache::TileCache;

/// Inclusive tile-grid bounding box of a tile set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileBounds {
    pub min_col: u32,
    pub max_col: u32,
    pub min_row: u32,
    pub max_row: u32,
}

impl TileBounds {
    /// Bounding box of `tiles`, or `None` when the set is empty.
    pub fn of(tiles: &[TileKey]) -> Option<Self> {
        let first = tiles.first()?;
        let mut bounds = Self {
            min_col: first.col,
            max_col: first.col,
            min_row: first.row,
            max_row: first.row,
        };
        for t in &tiles[1..] {
            bounds.min_col = bounds.min_col.min(t.col);
            bounds.max_col = bounds.max_col.max(t.col);
            bounds.min_row = bounds.min_row.min(t.row);
            bounds.max_row = bounds.max_row.max(t.row);
        }
        Some(bounds)
    }

    /// Every tile of the box in row-major order, as `(col, row)` pairs.
    /// The batch endpoint expects the full box, not the sparse set.
    pub fn tiles(&self) -> Vec<(u32, u32)> {
        let mut out = Vec::new();
        for row in self.min_row..=self.max_row {
            for col in self.min_col..=self.max_col {
                out.push((col, row));
            }
        }
        out
    }
}

/// Split a stitched raster into per-tile images.
///
/// Cells are `tile_size` squares from the box origin; each tile is
/// cropped to its actual extent within the level, so edge tiles come out
/// partial exactly as a single-tile fetch would return them. Returns an
/// error if the raster is too small to contain the box.
pub fn split_stitched(
    stitched: &RgbaImage,
    level: usize,
    bounds: TileBounds,
    level_dims: (u32, u32),
    tile_size: u32,
) -> Result<Vec<(TileKey, RgbaImage)>, TileError> {
    let cols = bounds.max_col - bounds.min_col + 1;
    let rows = bounds.max_row - bounds.min_row + 1;
    if stitched.width() < cols * tile_size || stitched.height() < rows * tile_size {
        return Err(TileError::BatchFailed {
            level,
            reason: format!(
                "stitched raster {}x{} smaller than {}x{} tile box",
                stitched.width(),
                stitched.height(),
                cols,
                rows
            ),
        });
    }

    let mut tiles = Vec::with_capacity((cols * rows) as usize);
    for row in bounds.min_row..=bounds.max_row {
        for col in bounds.min_col..=bounds.max_col {
            let (w, h) = tile_dimensions(level_dims.0, level_dims.1, tile_size, col, row);
            if w == 0 || h == 0 {
                continue;
            }
            let cell_x = (col - bounds.min_col) * tile_size;
            let cell_y = (row - bounds.min_row) * tile_size;
            let tile = image::imageops::crop_imm(stitched, cell_x, cell_y, w, h).to_image();
            tiles.push((TileKey::new(level, col, row), tile));
        }
    }
    Ok(tiles)
}

impl TileCache {
    /// Warm `tiles` through one stitched batch request.
    ///
    /// On success every tile of the bounding box becomes a resolved cache
    /// entry. Any failure (unsupported transport, bad status, undecodable
    /// or undersized raster) is reported as [`TileError::BatchFailed`] so
    /// the caller can fall back to per-tile fetches.
    pub async fn warm_batch(
        &self,
        meta: &SlideMetadata,
        level: usize,
        tiles: &[TileKey],
        tile_size: u32,
    ) -> Result<(), TileError> {
        let Some(bounds) = TileBounds::of(tiles) else {
            return Ok(());
        };
        let level_dims = meta.level_dimensions(level).ok_or(TileError::BatchFailed {
            level,
            reason: "level out of range".to_string(),
        })?;

        let box_tiles = bounds.tiles();
        let bytes = self
            .transport()
            .fetch_tile_batch(level, &box_tiles, tile_size)
            .await
            .map_err(|e| TileError::BatchFailed {
                level,
                reason: e.to_string(),
            })?;

        let stitched = image::load_from_memory(&bytes)
            .map_err(|e| TileError::BatchFailed {
                level,
                reason: format!("decode: {e}"),
            })?
            .to_rgba8();

        let split = split_stitched(&stitched, level, bounds, level_dims, tile_size)?;
        let count = split.len();
        for (key, tile) in split {
            self.insert_decoded(key, tile).await;
        }
        debug!(level, count, "batch warmed tiles");
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================
