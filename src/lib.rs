//! # Channel Data Layer
//!
//! Client-side data layer for a channel-centric site: fetches a channel's
//! videos and playlists from the YouTube Data API v3 and serves them to
//! multiple UI consumers (video grid, playlist marquees, search bar)
//! through a layered cache, respecting the API's quota with batched,
//! throttled fetches.
//!
//! ## Subsystems
//!
//! - [`cache`]: namespaced TTL cache, instantiated twice (short-lived
//!   listing cache, long-lived playlist video cache)
//! - [`hydrator`]: batched, rate-limited crawl that populates each
//!   playlist's videos incrementally, with per-playlist failure isolation
//! - [`pagination`]: token-based forward/back cursor plus "load more"
//!   accumulation over the flat video list
//! - [`search`]: debounced search mode with its own page accumulation and
//!   a stale-response guard
//! - [`sources`]: the `VideoSource` collaborator trait and its reqwest
//!   implementation; orchestration depends only on the trait
//!
//! Every component takes its collaborators by injection, so the whole
//! layer runs against a mock source and a paused tokio clock in tests.
//!
//! ## Example
//!
//! ```rust,no_run
//! use channel_data::ChannelData;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let data = ChannelData::from_env()?;
//!
//! // Marquesinas de playlists, hidratadas por lotes
//! let playlists = data.hydrator.hydrate().await?;
//!
//! // Grilla de videos paginada
//! data.pagination.load_first_page().await?;
//!
//! // Búsqueda con debounce
//! data.search.submit_query("rust").await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod hydrator;
pub mod pagination;
pub mod search;
pub mod sources;

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::cache::{ListingCache, PlaylistCache, API_CACHE_NAMESPACE, PLAYLIST_CACHE_NAMESPACE};
use crate::config::Config;
use crate::hydrator::PlaylistHydrator;
use crate::pagination::PaginationManager;
use crate::search::SearchSession;
use crate::sources::{VideoOrder, VideoSource, YouTubeAPIv3Client};

pub use crate::error::SourceError;

/// Fachada que arma el data layer completo: caches, hidratador,
/// paginación y búsqueda sobre una misma fuente inyectada.
pub struct ChannelData {
    pub hydrator: PlaylistHydrator,
    pub pagination: PaginationManager,
    pub search: SearchSession,
}

impl ChannelData {
    pub fn new(config: &Config, source: Arc<dyn VideoSource>) -> Self {
        let listing_cache = ListingCache::new(API_CACHE_NAMESPACE, config.api_cache_ttl());
        let playlist_cache = PlaylistCache::new(PLAYLIST_CACHE_NAMESPACE, config.playlist_cache_ttl());

        Self {
            hydrator: PlaylistHydrator::new(
                Arc::clone(&source),
                listing_cache,
                playlist_cache,
                config.hydrator_policy(),
            ),
            pagination: PaginationManager::new(
                Arc::clone(&source),
                config.page_size,
                VideoOrder::Date,
            ),
            search: SearchSession::new(source, config.page_size, config.search_debounce()),
        }
    }

    /// Construye el data layer desde variables de entorno, con el cliente
    /// real de la YouTube Data API v3 como fuente.
    pub fn from_env() -> Result<Self> {
        let config = Config::load()?;
        info!("🎬 Iniciando channel-data v{}", env!("CARGO_PKG_VERSION"));
        info!("{}", config.summary());

        let source = YouTubeAPIv3Client::new(
            config.api_key.clone(),
            config.channel_id.clone(),
            config.request_timeout(),
        )?;

        Ok(Self::new(&config, Arc::new(source)))
    }
}
