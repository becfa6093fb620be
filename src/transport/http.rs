//! HTTP implementation of [`SlideTransport`] over a slide server.

use async_trait::async_trait;
use bytes::Bytes;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::TransportError;
use crate::slide::SlideMetadata;

use super::SlideTransport;

// =============================================================================
// HttpSlideTransport
// =============================================================================

/// Talks to one slide on a slide server over HTTP.
///
/// Holds a shared `reqwest::Client` (connection pooling) plus the base URL
/// and slide identifier; every trait method is one request.
pub struct HttpSlideTransport {
    client: reqwest::Client,
    base: Url,
    slide_id: String,
}

/// Body of a `tiles_batch` request.
#[derive(Debug, Serialize)]
struct BatchRequest {
    level: usize,
    tiles: Vec<BatchTile>,
    tile_size: u32,
}

#[derive(Debug, Serialize)]
struct BatchTile {
    col: u32,
    row: u32,
}

impl HttpSlideTransport {
    /// Create a transport for `slide_id` on the server at `base`.
    ///
    /// `base` is the server root, e.g. `http://localhost:5000/`.
    pub fn new(base: Url, slide_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base,
            slide_id: slide_id.into(),
        }
    }

    /// Create a transport reusing an existing client.
    pub fn with_client(client: reqwest::Client, base: Url, slide_id: impl Into<String>) -> Self {
        Self {
            client,
            base,
            slide_id: slide_id.into(),
        }
    }

    fn endpoint(&self, suffix: &str) -> Result<Url, TransportError> {
        self.base
            .join(&format!("slide/{}/{}", self.slide_id, suffix))
            .map_err(|e| TransportError::Body(format!("invalid endpoint url: {e}")))
    }

    /// Map a completed response to bytes, folding HTTP statuses into the
    /// transport error taxonomy.
    async fn read_body(response: reqwest::Response) -> Result<Bytes, TransportError> {
        let url = response.url().to_string();
        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(TransportError::NotFound(url));
        }
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
                url,
            });
        }

        response
            .bytes()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))
    }

    fn request_error(err: reqwest::Error) -> TransportError {
        if err.is_connect() || err.is_timeout() {
            TransportError::Connection(err.to_string())
        } else {
            TransportError::Body(err.to_string())
        }
    }
}

#[async_trait]
impl SlideTransport for HttpSlideTransport {
    fn slide_id(&self) -> &str {
        &self.slide_id
    }

    async fn fetch_metadata(&self) -> Result<SlideMetadata, TransportError> {
        let url = self.endpoint("info")?;
        debug!(slide = %self.slide_id, %url, "fetching metadata");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Self::request_error)?;
        let body = Self::read_body(response).await?;

        serde_json::from_slice(&body)
            .map_err(|e| TransportError::Body(format!("invalid metadata document: {e}")))
    }

    async fn fetch_thumbnail(&self) -> Result<Bytes, TransportError> {
        let url = self.endpoint("thumbnail")?;
        debug!(slide = %self.slide_id, %url, "fetching thumbnail");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Self::request_error)?;
        Self::read_body(response).await
    }

    async fn fetch_tile(&self, level: usize, col: u32, row: u32) -> Result<Bytes, TransportError> {
        let mut url = self.endpoint("tile")?;
        url.query_pairs_mut()
            .append_pair("level", &level.to_string())
            .append_pair("col", &col.to_string())
            .append_pair("row", &row.to_string());
        debug!(slide = %self.slide_id, level, col, row, "fetching tile");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(Self::request_error)?;
        Self::read_body(response).await
    }

    async fn fetch_tile_batch(
        &self,
        level: usize,
        tiles: &[(u32, u32)],
        tile_size: u32,
    ) -> Result<Bytes, TransportError> {
        let url = self.endpoint("tiles_batch")?;
        let body = BatchRequest {
            level,
            tiles: tiles
                .iter()
                .map(|&(col, row)| BatchTile { col, row })
                .collect(),
            tile_size,
        };
        debug!(slide = %self.slide_id, level, count = tiles.len(), "fetching tile batch");

        let response = self
            .client
            .post(url)
            .json(&body)
            .send()
            .await
            .map_err(Self::request_error)?;
        Self::read_body(response).await
    }
}

// =============================================================================
// Tests
// =============================================================================
