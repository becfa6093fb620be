//! Tile cache and fetch layer.
//!
//! The cache sits between the render pipeline and the transport:
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │             Render pipeline             │
//! └────────────────────┬────────────────────┘
//!                      │ get_tile / peek / warm_batch
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │                TileCache                │
//! │   resolved + kept failures   in-flight  │
//! │   (unbounded / bounded LRU)  dedup map  │
//! └────────────────────┬────────────────────┘
//!                      │ fetch_tile / fetch_tile_batch
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │             SlideTransport              │
//! └─────────────────────────────────────────┘
//! ```
//!
//! - [`TileCache`]: deduplicated asynchronous fetch with kept failures
//! - [`split_stitched`] / [`TileBounds`]: batch raster splitting

mod batch;
mod cache;

pub use batch::{split_stitched, TileBounds};
pub use cache::{TileCache, TileSlot};
