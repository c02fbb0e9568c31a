use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::hydrator::HydratorPolicy;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // API del canal
    pub api_key: String,
    pub channel_id: String,
    pub request_timeout_secs: u64,

    // Caches
    pub api_cache_ttl_secs: u64,
    pub playlist_cache_ttl_secs: u64,

    // Hidratación de playlists
    pub top_playlists: usize,
    pub videos_per_playlist: u32,
    pub batch_size: usize,
    pub batch_delay_ms: u64,
    pub load_more_delay_ms: u64,

    // Paginación y búsqueda
    pub page_size: u32,
    pub search_debounce_ms: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            // API
            api_key: std::env::var("YOUTUBE_API_KEY")?,
            channel_id: std::env::var("YOUTUBE_CHANNEL_ID")?,
            request_timeout_secs: std::env::var("REQUEST_TIMEOUT_SECS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,

            // Caches (el de playlists dura más para sobrevivir navegaciones)
            api_cache_ttl_secs: std::env::var("API_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "600".to_string()) // 10 minutos
                .parse()?,
            playlist_cache_ttl_secs: std::env::var("PLAYLIST_CACHE_TTL_SECS")
                .unwrap_or_else(|_| "1800".to_string()) // 30 minutos
                .parse()?,

            // Hidratación (valores pensados para la cuota de la API)
            top_playlists: std::env::var("TOP_PLAYLISTS")
                .unwrap_or_else(|_| "10".to_string())
                .parse()?,
            videos_per_playlist: std::env::var("VIDEOS_PER_PLAYLIST")
                .unwrap_or_else(|_| "5".to_string())
                .parse()?,
            batch_size: std::env::var("BATCH_SIZE")
                .unwrap_or_else(|_| "2".to_string())
                .parse()?,
            batch_delay_ms: std::env::var("BATCH_DELAY_MS")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()?,
            load_more_delay_ms: std::env::var("LOAD_MORE_DELAY_MS")
                .unwrap_or_else(|_| "2000".to_string())
                .parse()?,

            // Paginación y búsqueda
            page_size: std::env::var("PAGE_SIZE")
                .unwrap_or_else(|_| "20".to_string())
                .parse()?,
            search_debounce_ms: std::env::var("SEARCH_DEBOUNCE_MS")
                .unwrap_or_else(|_| "500".to_string())
                .parse()?,
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// Catches the mistakes that would make the data layer misbehave
    /// quietly: zero-sized batches or pages, empty credentials, TTLs of
    /// zero that would turn every read into a miss.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            anyhow::bail!("YOUTUBE_API_KEY must not be empty");
        }

        if self.channel_id.trim().is_empty() {
            anyhow::bail!("YOUTUBE_CHANNEL_ID must not be empty");
        }

        if self.api_cache_ttl_secs == 0 || self.playlist_cache_ttl_secs == 0 {
            anyhow::bail!("Cache TTLs must be greater than 0");
        }

        if self.batch_size == 0 {
            anyhow::bail!("Batch size must be greater than 0");
        }

        if self.page_size == 0 {
            anyhow::bail!("Page size must be greater than 0");
        }

        if self.videos_per_playlist == 0 {
            anyhow::bail!("Videos per playlist must be greater than 0");
        }

        Ok(())
    }

    pub fn api_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.api_cache_ttl_secs)
    }

    pub fn playlist_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.playlist_cache_ttl_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    pub fn hydrator_policy(&self) -> HydratorPolicy {
        HydratorPolicy {
            top_playlists: self.top_playlists,
            videos_per_playlist: self.videos_per_playlist,
            batch_size: self.batch_size,
            batch_delay: Duration::from_millis(self.batch_delay_ms),
            load_more_delay: Duration::from_millis(self.load_more_delay_ms),
        }
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// Excludes the API key.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Channel: {}\n  \
            Caches: {}s api, {}s playlists\n  \
            Hydration: top {} playlists, {} videos each, batches of {} every {}ms\n  \
            Pagination: {} per page, {}ms search debounce",
            self.channel_id,
            self.api_cache_ttl_secs,
            self.playlist_cache_ttl_secs,
            self.top_playlists,
            self.videos_per_playlist,
            self.batch_size,
            self.batch_delay_ms,
            self.page_size,
            self.search_debounce_ms,
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided. Tuned
/// for the free YouTube Data API quota.
impl Default for Config {
    fn default() -> Self {
        Self {
            // API (no defaults - must be provided)
            api_key: String::new(),
            channel_id: String::new(),
            request_timeout_secs: 5,

            // Cache defaults
            api_cache_ttl_secs: 600,      // 10 minutos
            playlist_cache_ttl_secs: 1800, // 30 minutos

            // Hydration defaults
            top_playlists: 10,
            videos_per_playlist: 5,
            batch_size: 2,
            batch_delay_ms: 1000,
            load_more_delay_ms: 2000,

            // Pagination defaults
            page_size: 20,
            search_debounce_ms: 500,
        }
    }
}
