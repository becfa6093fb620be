use thiserror::Error;

/// Errors raised at the transport boundary when talking to the slide server.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    /// The server answered with a non-success status code
    #[error("server returned status {status} for {url}")]
    Status { status: u16, url: String },

    /// The requested resource does not exist on the server
    #[error("not found: {0}")]
    NotFound(String),

    /// Network or connection error
    #[error("connection error: {0}")]
    Connection(String),

    /// The response body could not be read or parsed
    #[error("malformed response body: {0}")]
    Body(String),

    /// The transport does not implement this operation
    #[error("operation not supported by this transport: {0}")]
    Unsupported(&'static str),
}

/// Errors raised while opening a slide.
///
/// Any of these is fatal to opening: the viewer must not start rendering
/// without validated metadata.
#[derive(Debug, Clone, Error)]
pub enum MetadataError {
    /// The metadata request itself failed
    #[error("metadata unavailable: {0}")]
    Unavailable(#[from] TransportError),

    /// The metadata document violates the pyramid invariants
    #[error("malformed metadata: {reason}")]
    Malformed { reason: String },
}

/// Errors raised while fetching or decoding tiles.
///
/// A tile failure is local: the tile is omitted from the current frame and
/// the render pass carries on. Failed entries stay in the cache, so callers
/// asking again get the same error without a new network request.
#[derive(Debug, Clone, Error)]
pub enum TileError {
    /// The tile could not be fetched or decoded
    #[error("tile load failed at level {level} col {col} row {row}: {reason}")]
    LoadFailed {
        level: usize,
        col: u32,
        row: u32,
        reason: String,
    },

    /// A batch request failed; callers fall back to per-tile fetches
    #[error("batch load failed at level {level}: {reason}")]
    BatchFailed { level: usize, reason: String },
}

// =============================================================================
// Tests
// =============================================================================
