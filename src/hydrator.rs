use anyhow::Result;
use futures::future::join_all;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::cache::{playlist_videos_key, ListingCache, PlaylistCache, CHANNEL_PLAYLISTS_KEY};
use crate::sources::{rank_playlists, Playlist, Video, VideoSource};

/// Política de hidratación: cuántas playlists, cuántos videos por playlist
/// y a qué ritmo se consulta la API para no agotar la cuota.
#[derive(Debug, Clone)]
pub struct HydratorPolicy {
    /// Playlists top (por número de videos) que se hidratan de entrada
    pub top_playlists: usize,
    /// Videos por playlist, para acotar el uso de cuota
    pub videos_per_playlist: u32,
    /// Fetches concurrentes por lote
    pub batch_size: usize,
    /// Pausa entre lotes
    pub batch_delay: Duration,
    /// Pausa entre fetches de "cargar más" (secuencial, baja prioridad)
    pub load_more_delay: Duration,
}

impl Default for HydratorPolicy {
    fn default() -> Self {
        Self {
            top_playlists: 10,
            videos_per_playlist: 5,
            batch_size: 2,
            batch_delay: Duration::from_millis(1000),
            load_more_delay: Duration::from_millis(2000),
        }
    }
}

/// Estado transitorio por playlist que consume la UI.
///
/// No se persiste al cache: se reconstruye cada sesión a partir de los
/// `Video` cacheados más el flag de carga.
#[derive(Debug, Clone)]
pub struct PlaylistState {
    pub playlist: Playlist,
    pub videos: Vec<Video>,
    pub is_loading: bool,
}

/// Hidratador de playlists: puebla `videos` de cada playlist con un
/// crawl por lotes contra la API externa, escribiendo al cache de
/// playlists de paso.
///
/// Un fallo en una playlist no aborta ni el lote ni el crawl: esa
/// playlist queda con `videos` vacío y `is_loading = false`, y el resto
/// continúa. Re-invocar el crawl con el cache fresco es un no-op.
pub struct PlaylistHydrator {
    source: Arc<dyn VideoSource>,
    listing_cache: ListingCache,
    playlist_cache: PlaylistCache,
    policy: HydratorPolicy,
    state: Mutex<Vec<PlaylistState>>,
    /// Cuántas playlists del ranking ya se procesaron (cursor de "cargar más")
    hydrated: AtomicUsize,
}

impl PlaylistHydrator {
    pub fn new(
        source: Arc<dyn VideoSource>,
        listing_cache: ListingCache,
        playlist_cache: PlaylistCache,
        policy: HydratorPolicy,
    ) -> Self {
        Self {
            source,
            listing_cache,
            playlist_cache,
            policy,
            state: Mutex::new(Vec::new()),
            hydrated: AtomicUsize::new(0),
        }
    }

    /// Listado de playlists del canal, rankeado por videos descendente y
    /// cacheado con el TTL corto.
    pub async fn playlists(&self) -> Result<Vec<Playlist>> {
        if let Some(cached) = self.listing_cache.get(CHANNEL_PLAYLISTS_KEY) {
            debug!("✅ Listado de playlists desde cache");
            return Ok(cached);
        }

        let playlists = rank_playlists(self.source.get_channel_playlists().await?);
        self.listing_cache
            .set(CHANNEL_PLAYLISTS_KEY, playlists.clone());
        debug!("✅ {} playlists obtenidas de la API", playlists.len());
        Ok(playlists)
    }

    /// Hidrata las playlists top en lotes concurrentes acotados.
    ///
    /// Las playlists ya cacheadas se resuelven sin tocar la red; las
    /// demás se procesan en lotes de `batch_size` con una pausa de
    /// `batch_delay` entre lote y lote. El estado se actualiza playlist a
    /// playlist, así que [`snapshot`](Self::snapshot) refleja el avance
    /// parcial mientras el crawl sigue corriendo.
    ///
    /// Si la sesión ya extendió el ranking con
    /// [`load_more_playlists`](Self::load_more_playlists), re-hidratar
    /// conserva ese tramo extendido: las playlists extra se resuelven
    /// desde el cache en vez de desaparecer del snapshot.
    pub async fn hydrate(&self) -> Result<Vec<PlaylistState>> {
        let ranked = self.playlists().await?;
        let target = self
            .hydrated
            .load(Ordering::SeqCst)
            .max(self.policy.top_playlists);
        let top: Vec<Playlist> = ranked.into_iter().take(target).collect();

        let mut pending: Vec<Playlist> = Vec::new();
        {
            let mut state = self.state.lock();
            state.clear();
            for playlist in &top {
                match self.playlist_cache.get(&playlist_videos_key(&playlist.id)) {
                    Some(videos) => state.push(PlaylistState {
                        playlist: playlist.clone(),
                        videos,
                        is_loading: false,
                    }),
                    None => {
                        state.push(PlaylistState {
                            playlist: playlist.clone(),
                            videos: Vec::new(),
                            is_loading: true,
                        });
                        pending.push(playlist.clone());
                    }
                }
            }
        }

        if pending.is_empty() {
            debug!("✅ Todas las playlists top ya estaban cacheadas");
        } else {
            info!(
                "📥 Hidratando {} playlists en lotes de {}",
                pending.len(),
                self.policy.batch_size
            );
        }

        let batch_size = self.policy.batch_size.max(1);
        let batches: Vec<&[Playlist]> = pending.chunks(batch_size).collect();
        let total_batches = batches.len();

        for (i, batch) in batches.into_iter().enumerate() {
            join_all(batch.iter().map(|p| self.fetch_and_merge(p))).await;
            if i + 1 < total_batches {
                sleep(self.policy.batch_delay).await;
            }
        }

        self.hydrated.store(top.len(), Ordering::SeqCst);
        Ok(self.snapshot())
    }

    /// Extiende el crawl al siguiente tramo del ranking, por acción
    /// explícita del usuario. Estrictamente secuencial y con la pausa
    /// larga: es una operación de baja prioridad que no debe competir en
    /// cuota con la hidratación inicial.
    pub async fn load_more_playlists(&self, count: usize) -> Result<Vec<PlaylistState>> {
        let ranked = self.playlists().await?;
        let start = self.hydrated.load(Ordering::SeqCst);
        let slice: Vec<Playlist> = ranked.into_iter().skip(start).take(count).collect();

        if slice.is_empty() {
            debug!("✅ No quedan más playlists por cargar");
            return Ok(self.snapshot());
        }
        info!("📥 Cargando {} playlists adicionales", slice.len());

        let mut pending: Vec<Playlist> = Vec::new();
        {
            let mut state = self.state.lock();
            for playlist in &slice {
                match self.playlist_cache.get(&playlist_videos_key(&playlist.id)) {
                    Some(videos) => state.push(PlaylistState {
                        playlist: playlist.clone(),
                        videos,
                        is_loading: false,
                    }),
                    None => {
                        state.push(PlaylistState {
                            playlist: playlist.clone(),
                            videos: Vec::new(),
                            is_loading: true,
                        });
                        pending.push(playlist.clone());
                    }
                }
            }
        }

        for (i, playlist) in pending.iter().enumerate() {
            if i > 0 {
                sleep(self.policy.load_more_delay).await;
            }
            self.fetch_and_merge(playlist).await;
        }

        self.hydrated.store(start + slice.len(), Ordering::SeqCst);
        Ok(self.snapshot())
    }

    /// Estado actual por playlist; los consumidores lo leen de forma
    /// incremental mientras el crawl avanza.
    pub fn snapshot(&self) -> Vec<PlaylistState> {
        self.state.lock().clone()
    }

    async fn fetch_and_merge(&self, playlist: &Playlist) {
        match self
            .source
            .get_playlist_videos(&playlist.id, self.policy.videos_per_playlist, None)
            .await
        {
            Ok(page) => {
                self.playlist_cache
                    .set(&playlist_videos_key(&playlist.id), page.videos.clone());
                debug!(
                    "✅ Playlist '{}' hidratada: {} videos",
                    playlist.title,
                    page.videos.len()
                );
                self.merge(&playlist.id, page.videos);
            }
            Err(e) => {
                // Fallo aislado: esta playlist queda vacía y el crawl sigue
                warn!("❌ Error al hidratar playlist '{}': {}", playlist.title, e);
                self.merge(&playlist.id, Vec::new());
            }
        }
    }

    fn merge(&self, playlist_id: &str, videos: Vec<Video>) {
        let mut state = self.state.lock();
        if let Some(entry) = state.iter_mut().find(|s| s.playlist.id == playlist_id) {
            entry.videos = videos;
            entry.is_loading = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{API_CACHE_NAMESPACE, PLAYLIST_CACHE_NAMESPACE};
    use crate::sources::{PlaylistVideosPage, SearchPage, Thumbnail, VideoOrder, VideoPage};
    use anyhow::anyhow;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use tokio::time::Instant;

    /// Fuente falsa que registra cada fetch de playlist con su timestamp
    struct FakeSource {
        playlists: Vec<Playlist>,
        fail_ids: HashSet<String>,
        calls: Mutex<Vec<(String, Instant)>>,
    }

    impl FakeSource {
        fn new(playlists: Vec<Playlist>) -> Self {
            Self {
                playlists,
                fail_ids: HashSet::new(),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn failing(mut self, id: &str) -> Self {
            self.fail_ids.insert(id.to_string());
            self
        }

        fn calls(&self) -> Vec<(String, Instant)> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl VideoSource for FakeSource {
        async fn get_channel_videos(
            &self,
            _max_results: u32,
            _page_token: Option<String>,
            _order: VideoOrder,
        ) -> Result<VideoPage> {
            unimplemented!("no se usa en estos tests")
        }

        async fn get_playlist_videos(
            &self,
            playlist_id: &str,
            _max_results: u32,
            _page_token: Option<String>,
        ) -> Result<PlaylistVideosPage> {
            self.calls
                .lock()
                .push((playlist_id.to_string(), Instant::now()));

            if self.fail_ids.contains(playlist_id) {
                return Err(anyhow!("error simulado para {}", playlist_id));
            }

            Ok(PlaylistVideosPage {
                videos: vec![
                    video(&format!("{}-v1", playlist_id)),
                    video(&format!("{}-v2", playlist_id)),
                ],
                next_page_token: None,
            })
        }

        async fn get_channel_playlists(&self) -> Result<Vec<Playlist>> {
            Ok(self.playlists.clone())
        }

        async fn search_videos(
            &self,
            _query: &str,
            _max_results: u32,
            _page_token: Option<String>,
        ) -> Result<SearchPage> {
            unimplemented!("no se usa en estos tests")
        }
    }

    fn video(id: &str) -> Video {
        Video::new(id.to_string(), format!("Video {}", id))
    }

    fn playlist(id: &str, video_count: u32) -> Playlist {
        Playlist {
            id: id.to_string(),
            title: format!("Playlist {}", id),
            description: String::new(),
            thumbnail: Thumbnail::default(),
            video_count,
            published_at: None,
            privacy: "public".to_string(),
        }
    }

    fn hydrator(source: Arc<FakeSource>, policy: HydratorPolicy) -> PlaylistHydrator {
        PlaylistHydrator::new(
            source,
            ListingCache::new(API_CACHE_NAMESPACE, Duration::from_secs(600)),
            PlaylistCache::new(PLAYLIST_CACHE_NAMESPACE, Duration::from_secs(1800)),
            policy,
        )
    }

    fn test_policy(batch_size: usize, batch_delay_ms: u64) -> HydratorPolicy {
        HydratorPolicy {
            top_playlists: 10,
            videos_per_playlist: 5,
            batch_size,
            batch_delay: Duration::from_millis(batch_delay_ms),
            load_more_delay: Duration::from_millis(0),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_miss_triggers_exactly_one_fetch() {
        let source = Arc::new(FakeSource::new(vec![playlist("A", 50), playlist("B", 10)]));
        let hydrator = hydrator(Arc::clone(&source), test_policy(2, 0));

        hydrator.hydrate().await.unwrap();
        let first_calls = source.calls();
        assert_eq!(first_calls.len(), 2);

        // Segunda invocación con cache fresco: cero fetches
        hydrator.hydrate().await.unwrap();
        assert_eq!(source.calls().len(), first_calls.len());
    }

    #[tokio::test(start_paused = true)]
    async fn test_batches_are_throttled() {
        let playlists = vec![
            playlist("A", 50),
            playlist("B", 40),
            playlist("C", 30),
            playlist("D", 20),
            playlist("E", 10),
        ];
        let source = Arc::new(FakeSource::new(playlists));
        let hydrator = hydrator(Arc::clone(&source), test_policy(2, 1000));

        hydrator.hydrate().await.unwrap();

        // 5 playlists con lotes de 2: los timestamps se agrupan en 3
        // instantes separados por la pausa, no en 5 llamadas simultáneas
        let calls = source.calls();
        assert_eq!(calls.len(), 5);
        let mut groups: Vec<Instant> = calls.iter().map(|(_, t)| *t).collect();
        groups.dedup();
        assert_eq!(groups.len(), 3);
        assert_eq!(groups[1] - groups[0], Duration::from_millis(1000));
        assert_eq!(groups[2] - groups[1], Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_is_isolated() {
        let playlists = vec![playlist("A", 30), playlist("B", 20), playlist("C", 10)];
        let source = Arc::new(FakeSource::new(playlists).failing("B"));
        let hydrator = hydrator(Arc::clone(&source), test_policy(3, 0));

        let states = hydrator.hydrate().await.unwrap();
        assert_eq!(states.len(), 3);

        let by_id = |id: &str| states.iter().find(|s| s.playlist.id == id).unwrap();
        assert_eq!(by_id("A").videos.len(), 2);
        assert_eq!(by_id("C").videos.len(), 2);
        // B falló: lista vacía, sin flag de carga, sin excepción
        assert_eq!(by_id("B").videos.len(), 0);
        assert!(!by_id("B").is_loading);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hydrates_in_descending_video_count_order() {
        let source = Arc::new(FakeSource::new(vec![playlist("B", 10), playlist("A", 50)]));
        let hydrator = hydrator(Arc::clone(&source), test_policy(1, 0));

        let states = hydrator.hydrate().await.unwrap();

        let order: Vec<String> = source.calls().into_iter().map(|(id, _)| id).collect();
        assert_eq!(order, vec!["A".to_string(), "B".to_string()]);
        assert!(states.iter().all(|s| !s.is_loading));
        assert!(states.iter().all(|s| !s.videos.is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_more_is_sequential_with_long_delay() {
        let playlists = vec![
            playlist("A", 50),
            playlist("B", 40),
            playlist("C", 30),
            playlist("D", 20),
        ];
        let source = Arc::new(FakeSource::new(playlists));
        let policy = HydratorPolicy {
            top_playlists: 2,
            load_more_delay: Duration::from_millis(2000),
            batch_delay: Duration::from_millis(0),
            ..HydratorPolicy::default()
        };
        let hydrator = hydrator(Arc::clone(&source), policy);

        hydrator.hydrate().await.unwrap();
        assert_eq!(source.calls().len(), 2);

        let states = hydrator.load_more_playlists(2).await.unwrap();
        assert_eq!(states.len(), 4);

        let calls = source.calls();
        assert_eq!(calls.len(), 4);
        // C y D secuenciales, separados por la pausa larga
        assert_eq!(calls[2].0, "C");
        assert_eq!(calls[3].0, "D");
        assert_eq!(calls[3].1 - calls[2].1, Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rehydrate_keeps_slice_extended_by_load_more() {
        let playlists = vec![
            playlist("A", 50),
            playlist("B", 40),
            playlist("C", 30),
            playlist("D", 20),
        ];
        let source = Arc::new(FakeSource::new(playlists));
        let policy = HydratorPolicy {
            top_playlists: 2,
            batch_delay: Duration::from_millis(0),
            load_more_delay: Duration::from_millis(0),
            ..HydratorPolicy::default()
        };
        let hydrator = hydrator(Arc::clone(&source), policy);

        hydrator.hydrate().await.unwrap();
        hydrator.load_more_playlists(2).await.unwrap();
        assert_eq!(source.calls().len(), 4);

        // Re-hidratar no reduce la vista a las top 2: C y D siguen en el
        // snapshot, resueltas desde el cache sin tocar la red
        let states = hydrator.hydrate().await.unwrap();
        let ids: Vec<&str> = states.iter().map(|s| s.playlist.id.as_str()).collect();
        assert_eq!(ids, vec!["A", "B", "C", "D"]);
        assert!(states.iter().all(|s| !s.is_loading && !s.videos.is_empty()));
        assert_eq!(source.calls().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_more_past_end_is_noop() {
        let source = Arc::new(FakeSource::new(vec![playlist("A", 50)]));
        let hydrator = hydrator(Arc::clone(&source), test_policy(2, 0));

        hydrator.hydrate().await.unwrap();
        let states = hydrator.load_more_playlists(5).await.unwrap();
        assert_eq!(states.len(), 1);
        assert_eq!(source.calls().len(), 1);
    }
}
