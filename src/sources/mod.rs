pub mod youtube_api_v3;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use youtube_api_v3::YouTubeAPIv3Client;

/// Orden de los resultados al listar videos del canal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoOrder {
    #[default]
    Date,
    ViewCount,
    Relevance,
}

impl VideoOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoOrder::Date => "date",
            VideoOrder::ViewCount => "viewCount",
            VideoOrder::Relevance => "relevance",
        }
    }
}

/// Miniatura de un video o playlist
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Thumbnail {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

/// Representa un video del canal.
///
/// Inmutable una vez construido a partir de la respuesta de la API; la
/// identidad es `id`. Se cachea completo y solo se reemplaza cuando un
/// fetch más fresco sobreescribe la entrada.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Video {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: Thumbnail,
    pub published_at: Option<DateTime<Utc>>,
    /// Duración legible ("12:34", "1:02:03")
    pub duration: String,
    /// Vistas formateadas para UI ("1,234,567")
    pub view_count: String,
    /// Vistas crudas, para ordenar
    pub view_count_raw: Option<u64>,
    pub like_count: Option<String>,
    pub embed_url: String,
    pub watch_url: String,
    pub playlist_id: Option<String>,
    pub tags: Vec<String>,
    pub category_id: String,
}

impl Video {
    pub fn new(id: String, title: String) -> Self {
        let watch_url = format!("https://www.youtube.com/watch?v={}", id);
        let embed_url = format!("https://www.youtube.com/embed/{}", id);
        Self {
            id,
            title,
            description: String::new(),
            thumbnail: Thumbnail::default(),
            published_at: None,
            duration: String::new(),
            view_count: String::new(),
            view_count_raw: None,
            like_count: None,
            embed_url,
            watch_url,
            playlist_id: None,
            tags: Vec::new(),
            category_id: String::new(),
        }
    }

    // Setters
    pub fn with_description(mut self, description: String) -> Self {
        self.description = description;
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: Thumbnail) -> Self {
        self.thumbnail = thumbnail;
        self
    }

    pub fn with_published_at(mut self, published_at: Option<DateTime<Utc>>) -> Self {
        self.published_at = published_at;
        self
    }

    pub fn with_duration(mut self, duration: String) -> Self {
        self.duration = duration;
        self
    }

    pub fn with_views(mut self, formatted: String, raw: Option<u64>) -> Self {
        self.view_count = formatted;
        self.view_count_raw = raw;
        self
    }

    pub fn with_like_count(mut self, like_count: Option<String>) -> Self {
        self.like_count = like_count;
        self
    }

    pub fn with_playlist_id(mut self, playlist_id: String) -> Self {
        self.playlist_id = Some(playlist_id);
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn with_category_id(mut self, category_id: String) -> Self {
        self.category_id = category_id;
        self
    }
}

/// Playlist del canal, tal como la devuelve la API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub title: String,
    pub description: String,
    pub thumbnail: Thumbnail,
    pub video_count: u32,
    pub published_at: Option<DateTime<Utc>>,
    pub privacy: String,
}

/// Página del listado plano de videos del canal
#[derive(Debug, Clone, Default)]
pub struct VideoPage {
    pub videos: Vec<Video>,
    pub total_results: u64,
    pub next_page_token: Option<String>,
    pub prev_page_token: Option<String>,
}

/// Página de videos de una playlist concreta
#[derive(Debug, Clone, Default)]
pub struct PlaylistVideosPage {
    pub videos: Vec<Video>,
    pub next_page_token: Option<String>,
}

/// Página de resultados de búsqueda
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub videos: Vec<Video>,
    pub total_results: u64,
    pub next_page_token: Option<String>,
}

/// Trait común para las fuentes de datos de video.
///
/// Las capas de orquestación (hidratador, paginación, búsqueda) dependen
/// solo de este trait, nunca del cliente HTTP concreto.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VideoSource: Send + Sync {
    /// Lista una página del listado plano de videos del canal
    async fn get_channel_videos(
        &self,
        max_results: u32,
        page_token: Option<String>,
        order: VideoOrder,
    ) -> Result<VideoPage>;

    /// Lista una página de videos de una playlist
    async fn get_playlist_videos(
        &self,
        playlist_id: &str,
        max_results: u32,
        page_token: Option<String>,
    ) -> Result<PlaylistVideosPage>;

    /// Lista las playlists públicas del canal
    async fn get_channel_playlists(&self) -> Result<Vec<Playlist>>;

    /// Busca videos dentro del canal
    async fn search_videos(
        &self,
        query: &str,
        max_results: u32,
        page_token: Option<String>,
    ) -> Result<SearchPage>;
}

/// Ordena playlists por número de videos descendente, el ranking que usa
/// el hidratador para decidir qué playlists se cargan primero.
pub fn rank_playlists(mut playlists: Vec<Playlist>) -> Vec<Playlist> {
    playlists.sort_by(|a, b| b.video_count.cmp(&a.video_count));
    playlists
}
