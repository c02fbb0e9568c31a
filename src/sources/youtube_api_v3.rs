use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use num_format::{Locale, ToFormattedString};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, error, warn};

use super::{
    Playlist, PlaylistVideosPage, SearchPage, Thumbnail, Video, VideoOrder, VideoPage, VideoSource,
};
use crate::error::SourceError;

const API_BASE: &str = "https://www.googleapis.com/youtube/v3";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    total_results: u64,
}

#[derive(Debug, Deserialize, Default)]
struct ThumbnailSet {
    default: Option<ThumbnailInfo>,
    medium: Option<ThumbnailInfo>,
    high: Option<ThumbnailInfo>,
}

#[derive(Debug, Deserialize, Clone)]
struct ThumbnailInfo {
    url: String,
    width: Option<u32>,
    height: Option<u32>,
}

impl ThumbnailSet {
    /// Mejor miniatura disponible (high > medium > default)
    fn best(&self) -> Thumbnail {
        let info = self
            .high
            .clone()
            .or_else(|| self.medium.clone())
            .or_else(|| self.default.clone());
        match info {
            Some(t) => Thumbnail {
                url: t.url,
                width: t.width.unwrap_or(0),
                height: t.height.unwrap_or(0),
            },
            None => Thumbnail::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchListResponse {
    items: Vec<SearchItem>,
    next_page_token: Option<String>,
    prev_page_token: Option<String>,
    page_info: Option<PageInfo>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchItemId {
    video_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    #[serde(default)]
    description: String,
    published_at: Option<String>,
    #[serde(default)]
    thumbnails: ThumbnailSet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemsResponse {
    items: Vec<PlaylistItem>,
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItem {
    snippet: PlaylistItemSnippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistItemSnippet {
    title: String,
    #[serde(default)]
    description: String,
    published_at: Option<String>,
    #[serde(default)]
    thumbnails: ThumbnailSet,
    resource_id: ResourceId,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResourceId {
    video_id: String,
}

#[derive(Debug, Deserialize)]
struct PlaylistListResponse {
    items: Vec<PlaylistResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistResource {
    id: String,
    snippet: Snippet,
    content_details: Option<PlaylistContentDetails>,
    status: Option<PlaylistStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistContentDetails {
    item_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaylistStatus {
    privacy_status: String,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    items: Vec<VideoResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoResource {
    id: String,
    snippet: Option<VideoSnippet>,
    content_details: Option<VideoContentDetails>,
    statistics: Option<VideoStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoSnippet {
    #[serde(default)]
    tags: Vec<String>,
    category_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct VideoContentDetails {
    duration: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoStatistics {
    view_count: Option<String>,
    like_count: Option<String>,
}

/// Detalles de un video que el endpoint de listado no incluye
#[derive(Debug, Default, Clone)]
struct VideoDetails {
    duration: String,
    view_count: String,
    view_count_raw: Option<u64>,
    like_count: Option<String>,
    tags: Vec<String>,
    category_id: String,
}

/// Cliente de la YouTube Data API v3 para un canal concreto
pub struct YouTubeAPIv3Client {
    api_key: String,
    channel_id: String,
    client: reqwest::Client,
}

impl YouTubeAPIv3Client {
    pub fn new(api_key: String, channel_id: String, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key,
            channel_id,
            client,
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, &str)],
    ) -> Result<T> {
        let url = format!("{}/{}", API_BASE, endpoint);

        let response = self
            .client
            .get(&url)
            .query(params)
            .query(&[("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(SourceError::Network)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("❌ YouTube API error: {} - {}", status, body);
            if status.as_u16() == 403 && body.contains("quota") {
                return Err(SourceError::QuotaExceeded.into());
            }
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        response
            .json::<T>()
            .await
            .map_err(|e| SourceError::Malformed(e.to_string()).into())
    }

    /// Segunda llamada a `videos` para completar duración, estadísticas y
    /// tags, que los endpoints de listado no devuelven. Si falla se degrada
    /// a videos sin detalles en vez de perder la página entera.
    async fn fetch_details(&self, ids: &[String]) -> HashMap<String, VideoDetails> {
        if ids.is_empty() {
            return HashMap::new();
        }

        let joined = ids.join(",");
        let result: Result<VideoListResponse> = self
            .get_json(
                "videos",
                &[
                    ("part", "snippet,contentDetails,statistics"),
                    ("id", joined.as_str()),
                ],
            )
            .await;

        let response = match result {
            Ok(r) => r,
            Err(e) => {
                warn!("⚠️ No se pudieron obtener detalles de {} videos: {}", ids.len(), e);
                return HashMap::new();
            }
        };

        response
            .items
            .into_iter()
            .map(|item| {
                let raw_views = item
                    .statistics
                    .as_ref()
                    .and_then(|s| s.view_count.as_ref())
                    .and_then(|v| v.parse::<u64>().ok());
                let details = VideoDetails {
                    duration: item
                        .content_details
                        .map(|c| format_duration(parse_iso8601_duration(&c.duration)))
                        .unwrap_or_default(),
                    view_count: raw_views.map(format_views).unwrap_or_default(),
                    view_count_raw: raw_views,
                    like_count: item.statistics.and_then(|s| s.like_count),
                    tags: item.snippet.as_ref().map(|s| s.tags.clone()).unwrap_or_default(),
                    category_id: item
                        .snippet
                        .and_then(|s| s.category_id)
                        .unwrap_or_default(),
                };
                (item.id, details)
            })
            .collect()
    }

    fn apply_details(videos: &mut [Video], details: &HashMap<String, VideoDetails>) {
        for video in videos.iter_mut() {
            if let Some(d) = details.get(&video.id) {
                video.duration = d.duration.clone();
                video.view_count = d.view_count.clone();
                video.view_count_raw = d.view_count_raw;
                video.like_count = d.like_count.clone();
                video.tags = d.tags.clone();
                video.category_id = d.category_id.clone();
            }
        }
    }

    fn video_from_snippet(id: String, snippet: Snippet) -> Video {
        Video::new(id, snippet.title)
            .with_description(snippet.description)
            .with_thumbnail(snippet.thumbnails.best())
            .with_published_at(parse_timestamp(snippet.published_at.as_deref()))
    }
}

#[async_trait]
impl VideoSource for YouTubeAPIv3Client {
    async fn get_channel_videos(
        &self,
        max_results: u32,
        page_token: Option<String>,
        order: VideoOrder,
    ) -> Result<VideoPage> {
        debug!("🔍 Listando videos del canal (order={})", order.as_str());

        let max = max_results.to_string();
        let mut params = vec![
            ("part", "snippet"),
            ("channelId", self.channel_id.as_str()),
            ("type", "video"),
            ("order", order.as_str()),
            ("maxResults", max.as_str()),
        ];
        if let Some(token) = page_token.as_deref() {
            params.push(("pageToken", token));
        }

        let response: SearchListResponse = self.get_json("search", &params).await?;

        let mut videos: Vec<Video> = response
            .items
            .into_iter()
            .filter_map(|item| {
                let id = item.id.video_id?;
                Some(Self::video_from_snippet(id, item.snippet))
            })
            .collect();

        let ids: Vec<String> = videos.iter().map(|v| v.id.clone()).collect();
        let details = self.fetch_details(&ids).await;
        Self::apply_details(&mut videos, &details);

        debug!("✅ Página de canal: {} videos", videos.len());
        Ok(VideoPage {
            videos,
            total_results: response.page_info.map(|p| p.total_results).unwrap_or(0),
            next_page_token: response.next_page_token,
            prev_page_token: response.prev_page_token,
        })
    }

    async fn get_playlist_videos(
        &self,
        playlist_id: &str,
        max_results: u32,
        page_token: Option<String>,
    ) -> Result<PlaylistVideosPage> {
        debug!("🔍 Listando videos de playlist {}", playlist_id);

        let max = max_results.to_string();
        let mut params = vec![
            ("part", "snippet"),
            ("playlistId", playlist_id),
            ("maxResults", max.as_str()),
        ];
        if let Some(token) = page_token.as_deref() {
            params.push(("pageToken", token));
        }

        let response: PlaylistItemsResponse = self.get_json("playlistItems", &params).await?;

        let mut videos: Vec<Video> = response
            .items
            .into_iter()
            .map(|item| {
                let snippet = item.snippet;
                Video::new(snippet.resource_id.video_id.clone(), snippet.title)
                    .with_description(snippet.description)
                    .with_thumbnail(snippet.thumbnails.best())
                    .with_published_at(parse_timestamp(snippet.published_at.as_deref()))
                    .with_playlist_id(playlist_id.to_string())
            })
            .collect();

        let ids: Vec<String> = videos.iter().map(|v| v.id.clone()).collect();
        let details = self.fetch_details(&ids).await;
        Self::apply_details(&mut videos, &details);

        Ok(PlaylistVideosPage {
            videos,
            next_page_token: response.next_page_token,
        })
    }

    async fn get_channel_playlists(&self) -> Result<Vec<Playlist>> {
        debug!("🔍 Listando playlists del canal {}", self.channel_id);

        let response: PlaylistListResponse = self
            .get_json(
                "playlists",
                &[
                    ("part", "snippet,contentDetails,status"),
                    ("channelId", self.channel_id.as_str()),
                    ("maxResults", "50"),
                ],
            )
            .await?;

        let playlists: Vec<Playlist> = response
            .items
            .into_iter()
            .map(|item| Playlist {
                id: item.id,
                title: item.snippet.title,
                description: item.snippet.description,
                thumbnail: item.snippet.thumbnails.best(),
                video_count: item.content_details.map(|c| c.item_count).unwrap_or(0),
                published_at: parse_timestamp(item.snippet.published_at.as_deref()),
                privacy: item
                    .status
                    .map(|s| s.privacy_status)
                    .unwrap_or_else(|| "public".to_string()),
            })
            .collect();

        debug!("✅ {} playlists encontradas", playlists.len());
        Ok(playlists)
    }

    async fn search_videos(
        &self,
        query: &str,
        max_results: u32,
        page_token: Option<String>,
    ) -> Result<SearchPage> {
        debug!("🔍 Búsqueda en el canal: '{}'", query);

        let max = max_results.to_string();
        let mut params = vec![
            ("part", "snippet"),
            ("channelId", self.channel_id.as_str()),
            ("type", "video"),
            ("q", query),
            ("maxResults", max.as_str()),
        ];
        if let Some(token) = page_token.as_deref() {
            params.push(("pageToken", token));
        }

        let response: SearchListResponse = self.get_json("search", &params).await?;

        let mut videos: Vec<Video> = response
            .items
            .into_iter()
            .filter_map(|item| {
                let id = item.id.video_id?;
                Some(Self::video_from_snippet(id, item.snippet))
            })
            .collect();

        let ids: Vec<String> = videos.iter().map(|v| v.id.clone()).collect();
        let details = self.fetch_details(&ids).await;
        Self::apply_details(&mut videos, &details);

        debug!("✅ Búsqueda '{}': {} resultados", query, videos.len());
        Ok(SearchPage {
            videos,
            total_results: response.page_info.map(|p| p.total_results).unwrap_or(0),
            next_page_token: response.next_page_token,
        })
    }
}

fn parse_timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

/// Parsea duración ISO 8601 (PT1H2M3S)
fn parse_iso8601_duration(duration: &str) -> Duration {
    let mut hours: u64 = 0;
    let mut minutes: u64 = 0;
    let mut seconds: u64 = 0;

    let mut current_num = String::new();

    for ch in duration.chars() {
        match ch {
            'P' | 'T' => continue,
            'H' => {
                hours = current_num.parse().unwrap_or(0);
                current_num.clear();
            }
            'M' => {
                minutes = current_num.parse().unwrap_or(0);
                current_num.clear();
            }
            'S' => {
                seconds = current_num.parse().unwrap_or(0);
                current_num.clear();
            }
            _ if ch.is_ascii_digit() => {
                current_num.push(ch);
            }
            _ => continue,
        }
    }

    Duration::from_secs(hours * 3600 + minutes * 60 + seconds)
}

/// Formatea una duración como "M:SS" o "H:MM:SS"
fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// Formatea vistas con separador de miles ("1,234,567")
fn format_views(views: u64) -> String {
    views.to_formatted_string(&Locale::en)
}
