//! # Cache Module
//!
//! Layered caching system for the channel data layer.
//!
//! This module provides a namespaced TTL (time-to-live) cache used to avoid
//! redundant calls against the video platform API. Two logical caches are
//! built on the same abstraction:
//!
//! - **Listing cache**: short-lived cache for raw API listings (the
//!   channel's playlists), tuned for freshness.
//! - **Playlist cache**: long-lived cache for hydrated playlist videos, so
//!   revisiting a page does not refetch every playlist.
//!
//! ## Features
//!
//! - **TTL Expiration**: entries expire after a configurable time-to-live
//! - **Lazy Expiry**: a read never returns an expired entry, even before
//!   the periodic sweep runs
//! - **Namespacing**: several logical caches can share one underlying map
//!   without key collisions; bulk operations stay namespace-scoped
//! - **Thread Safety**: concurrent access from multiple tasks
//! - **Metrics**: built-in hit/miss ratio tracking per namespace
//!
//! ## Configuration
//!
//! Cache behavior is controlled via environment variables:
//!
//! ```env
//! API_CACHE_TTL_SECS=600        # Listing cache TTL (10 minutes)
//! PLAYLIST_CACHE_TTL_SECS=1800  # Playlist video cache TTL (30 minutes)
//! ```
//!
//! ## Eviction
//!
//! There is no LRU or size cap: the keyspace is bounded by the number of
//! playlists and pages a single session touches, so TTL alone keeps memory
//! bounded. `cleanup_old_entries` exists for bulk housekeeping and should
//! be invoked periodically or opportunistically, not on every read.
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use channel_data::cache::{PlaylistCache, playlist_videos_key, PLAYLIST_CACHE_NAMESPACE};
//! use std::time::Duration;
//!
//! # fn example() {
//! let cache = PlaylistCache::new(PLAYLIST_CACHE_NAMESPACE, Duration::from_secs(1800));
//!
//! if let Some(videos) = cache.get(&playlist_videos_key("PLabc123")) {
//!     println!("cache hit: {} videos", videos.len());
//! }
//! # }
//! ```

pub mod ttl_cache;

use std::time::Duration;
use tracing::info;

use crate::sources::{Playlist, Video};
pub use ttl_cache::{CacheMetrics, TtlCache};

/// Namespace for short-lived raw API listing responses.
pub const API_CACHE_NAMESPACE: &str = "api";

/// Namespace for hydrated per-playlist video lists.
pub const PLAYLIST_CACHE_NAMESPACE: &str = "playlist-videos";

/// Default TTL for the listing cache (10 minutes).
pub const DEFAULT_API_TTL: Duration = Duration::from_secs(600);

/// Default TTL for the playlist video cache (30 minutes).
pub const DEFAULT_PLAYLIST_TTL: Duration = Duration::from_secs(1800);

/// Key under which the ranked channel playlist listing is cached.
pub const CHANNEL_PLAYLISTS_KEY: &str = "channel-playlists";

/// Short-lived cache for the channel's playlist listing.
pub type ListingCache = TtlCache<Vec<Playlist>>;

/// Long-lived cache for a playlist's hydrated videos, keyed by
/// [`playlist_videos_key`].
pub type PlaylistCache = TtlCache<Vec<Video>>;

/// Cache key for one playlist's hydrated videos.
pub fn playlist_videos_key(playlist_id: &str) -> String {
    format!("playlist-videos-{}", playlist_id)
}

impl PlaylistCache {
    /// Performs cache maintenance by removing expired entries.
    ///
    /// Intended to be called once per page composition or from a periodic
    /// task owned by the consumer. Reads already self-clean individually;
    /// this sweep is for bulk housekeeping and memory bounding.
    pub fn cleanup_old_entries(&self) {
        let removed = self.cleanup_expired();
        if removed > 0 {
            info!("🧹 Cache cleanup: removed {} expired entries", removed);
        }
    }
}
