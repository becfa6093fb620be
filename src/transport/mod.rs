//! Transport layer: how the engine reaches the slide server.
//!
//! The engine only ever talks to the server through the [`SlideTransport`]
//! trait - one instance per open slide. This keeps the render pipeline
//! testable against in-memory mocks and independent of the wire details,
//! the same way the I/O seam isolates a storage backend.
//!
//! The production implementation is [`HttpSlideTransport`], which speaks
//! the four HTTP endpoints of the slide server:
//!
//! - `GET  /slide/{id}/info` - pyramid metadata (JSON)
//! - `GET  /slide/{id}/thumbnail` - whole-image overview raster
//! - `GET  /slide/{id}/tile?level=L&col=C&row=R` - one tile raster
//! - `POST /slide/{id}/tiles_batch` - stitched raster over a tile set

mod http;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::TransportError;
use crate::slide::SlideMetadata;

pub use http::HttpSlideTransport;

// =============================================================================
// SlideTransport
// =============================================================================

/// Async access to one slide's server endpoints.
///
/// Implementations must be cheap to share behind an `Arc`; every method
/// corresponds to a single request-response exchange. All raster payloads
/// come back as undecoded bytes - decoding belongs to the tile cache.
#[async_trait]
pub trait SlideTransport: Send + Sync {
    /// Identifier of the slide this transport is bound to, for logging.
    fn slide_id(&self) -> &str;

    /// Fetch the pyramid metadata document.
    ///
    /// The result is parsed but not yet validated; the viewer validates
    /// invariants before any rendering starts.
    async fn fetch_metadata(&self) -> Result<SlideMetadata, TransportError>;

    /// Fetch the whole-image overview raster.
    async fn fetch_thumbnail(&self) -> Result<Bytes, TransportError>;

    /// Fetch a single tile raster.
    ///
    /// Nominally `tile_size x tile_size` pixels, smaller at grid edges.
    async fn fetch_tile(&self, level: usize, col: u32, row: u32) -> Result<Bytes, TransportError>;

    /// Fetch one stitched raster covering the bounding box of `tiles`.
    ///
    /// Optional: transports that cannot batch return
    /// [`TransportError::Unsupported`] and callers fall back to per-tile
    /// fetches.
    async fn fetch_tile_batch(
        &self,
        _level: usize,
        _tiles: &[(u32, u32)],
        _tile_size: u32,
    ) -> Result<Bytes, TransportError> {
        Err(TransportError::Unsupported("tiles_batch"))
    }
}
