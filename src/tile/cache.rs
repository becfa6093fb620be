//! Tile cache with deduplicated asynchronous fetch.
//!
//! Maps a [`TileKey`] to either a resolved decoded image, a kept failure,
//! or an in-flight fetch. The contract is **at most one outstanding fetch
//! per key**: however many render passes, fallback scans and prefetch
//! sweeps ask for the same tile concurrently, the network sees one
//! request and every caller gets the same result.
//!
//! # Slots
//!
//! A resolved slot holds `Ok(Arc<RgbaImage>)` with the tile's actual
//! pixel dimensions (edge tiles are smaller than the nominal size). A
//! failed fetch is kept as `Err(TileError)`: there is no automatic
//! retry; callers treat the error as "tile unavailable this pass".
//!
//! # Eviction
//!
//! The default store is unbounded for the lifetime of the open slide,
//! preserving the original viewer's behavior. An optional bounded mode
//! puts resolved slots in an LRU; in-flight fetches live in a separate
//! map and are never evicted, so the dedup invariant holds in both modes.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;

use image::RgbaImage;
use lru::LruCache;
use tokio::sync::{Mutex, Notify};
use tracing::debug;

use crate::error::{TileError, TransportError};
use crate::transport::SlideTransport;
use crate::view::TileKey;

/// Outcome of a finished fetch, kept in the store and cloned to callers.
pub type TileSlot = Result<Arc<RgbaImage>, TileError>;

// =============================================================================
// Store
// =============================================================================

/// Finished-slot storage: unbounded by default, optionally a bounded LRU.
enum TileStore {
    Unbounded(HashMap<TileKey, TileSlot>),
    Bounded(LruCache<TileKey, TileSlot>),
}

impl TileStore {
    /// Look up a slot, refreshing recency in bounded mode.
    fn get(&mut self, key: &TileKey) -> Option<&TileSlot> {
        match self {
            TileStore::Unbounded(map) => map.get(key),
            TileStore::Bounded(lru) => lru.get(key),
        }
    }

    /// Look up a resolved image without touching recency.
    fn peek_resolved(&self, key: &TileKey) -> Option<Arc<RgbaImage>> {
        let slot = match self {
            TileStore::Unbounded(map) => map.get(key),
            TileStore::Bounded(lru) => lru.peek(key),
        };
        match slot {
            Some(Ok(image)) => Some(Arc::clone(image)),
            _ => None,
        }
    }

    fn insert(&mut self, key: TileKey, slot: TileSlot) {
        match self {
            TileStore::Unbounded(map) => {
                map.insert(key, slot);
            }
            TileStore::Bounded(lru) => {
                lru.put(key, slot);
            }
        }
    }

    fn len(&self) -> usize {
        match self {
            TileStore::Unbounded(map) => map.len(),
            TileStore::Bounded(lru) => lru.len(),
        }
    }
}

/// Singleflight state for one in-flight fetch.
struct InFlightFetch {
    /// Wakes joiners once `result` is published
    notify: Notify,
    /// Set exactly once, before `notify` fires
    result: Mutex<Option<TileSlot>>,
}

// =============================================================================
// TileCache
// =============================================================================

/// Decoded-tile cache with request deduplication.
pub struct TileCache {
    transport: Arc<dyn SlideTransport>,
    store: Mutex<TileStore>,
    in_flight: Mutex<HashMap<TileKey, Arc<InFlightFetch>>>,
}

impl TileCache {
    /// Create an unbounded cache (the default: entries live until the
    /// slide is closed and the cache is discarded wholesale).
    pub fn new(transport: Arc<dyn SlideTransport>) -> Self {
        Self {
            transport,
            store: Mutex::new(TileStore::Unbounded(HashMap::new())),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Create a cache bounding resolved entries to `capacity` tiles with
    /// LRU eviction.
    pub fn with_capacity(transport: Arc<dyn SlideTransport>, capacity: NonZeroUsize) -> Self {
        Self {
            transport,
            store: Mutex::new(TileStore::Bounded(LruCache::new(capacity))),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Get a tile, fetching and decoding it if necessary.
    ///
    /// Concurrent calls for the same key join the one outstanding fetch;
    /// the pending entry is registered before the first suspension point,
    /// so a second caller can never race a duplicate request past it.
    /// A kept failure is returned as-is without hitting the network again.
    pub async fn get_tile(&self, key: TileKey) -> TileSlot {
        // Fast path: already finished (hit or kept failure).
        if let Some(slot) = self.store.lock().await.get(&key) {
            return slot.clone();
        }

        let fetch = {
            let mut in_flight = self.in_flight.lock().await;

            if let Some(fetch) = in_flight.get(&key) {
                Arc::clone(fetch)
            } else {
                // The fetch may have finished between the fast path and
                // taking this lock; re-check before becoming the leader.
                if let Some(slot) = self.store.lock().await.get(&key) {
                    return slot.clone();
                }

                let fetch = Arc::new(InFlightFetch {
                    notify: Notify::new(),
                    result: Mutex::new(None),
                });
                in_flight.insert(key, Arc::clone(&fetch));
                drop(in_flight);

                // Leader: perform the fetch, publish, then wake joiners.
                let slot = self.fetch_and_decode(key).await;

                *fetch.result.lock().await = Some(slot.clone());
                self.store.lock().await.insert(key, slot.clone());
                self.in_flight.lock().await.remove(&key);
                fetch.notify.notify_waiters();

                return slot;
            }
        };

        // Joiner: wait for the leader to publish. The notified future is
        // enabled before the result check so a publish landing in between
        // is not lost.
        loop {
            let notified = fetch.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(slot) = fetch.result.lock().await.as_ref() {
                return slot.clone();
            }
            notified.await;
        }
    }

    /// Resolved image for `key` if one is cached, without fetching and
    /// without touching LRU recency. Used by the immediate-draw fallback
    /// scan, which must not promote or create entries.
    pub async fn peek_resolved(&self, key: &TileKey) -> Option<Arc<RgbaImage>> {
        self.store.lock().await.peek_resolved(key)
    }

    /// Insert an already-decoded image, e.g. a tile split out of a
    /// stitched batch raster. Overwrites a kept failure for the same key.
    pub async fn insert_decoded(&self, key: TileKey, image: RgbaImage) {
        self.store.lock().await.insert(key, Ok(Arc::new(image)));
    }

    /// Number of finished slots (resolved or kept failures).
    pub async fn len(&self) -> usize {
        self.store.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// The transport this cache fetches through.
    pub fn transport(&self) -> &Arc<dyn SlideTransport> {
        &self.transport
    }

    async fn fetch_and_decode(&self, key: TileKey) -> TileSlot {
        let load_failed = |reason: String| TileError::LoadFailed {
            level: key.level,
            col: key.col,
            row: key.row,
            reason,
        };

        let bytes = self
            .transport
            .fetch_tile(key.level, key.col, key.row)
            .await
            .map_err(|e: TransportError| load_failed(e.to_string()))?;

        let image = image::load_from_memory(&bytes)
            .map_err(|e| load_failed(format!("decode: {e}")))?
            .to_rgba8();

        debug!(%key, width = image.width(), height = image.height(), "tile resolved");
        Ok(Arc::new(image))
    }
}

// =============================================================================
// Tests
// =============================================================================
