use anyhow::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::sources::{Video, VideoOrder, VideoPage, VideoSource};

/// Estado del cursor de paginación sobre el listado plano de videos.
///
/// Lo muta únicamente el [`PaginationManager`]: `items` crece con
/// "cargar más" o se reemplaza entero al navegar de página.
#[derive(Debug, Clone, Default)]
pub struct PaginationState {
    pub items: Vec<Video>,
    pub total_results: u64,
    pub next_page_token: Option<String>,
    pub prev_page_token: Option<String>,
    pub current_page: u32,
}

impl PaginationState {
    /// Transición "cargar más": agrega la página al final, preservando
    /// los items existentes y su orden.
    pub fn apply_append(&self, page: &VideoPage) -> Self {
        let mut items = self.items.clone();
        items.extend(page.videos.iter().cloned());
        Self {
            items,
            total_results: page.total_results,
            next_page_token: page.next_page_token.clone(),
            prev_page_token: self.prev_page_token.clone(),
            current_page: self.current_page,
        }
    }

    /// Transición de navegación: reemplaza los items enteros y actualiza
    /// ambos tokens y el número de página.
    pub fn apply_replace(&self, page: &VideoPage, page_number: u32) -> Self {
        Self {
            items: page.videos.clone(),
            total_results: page.total_results,
            next_page_token: page.next_page_token.clone(),
            prev_page_token: page.prev_page_token.clone(),
            current_page: page_number,
        }
    }

    pub fn has_next_page(&self) -> bool {
        self.next_page_token.is_some()
    }

    pub fn has_prev_page(&self) -> bool {
        self.current_page > 1
    }

    pub fn total_pages(&self, page_size: u32) -> u32 {
        if page_size == 0 {
            return 0;
        }
        self.total_results.div_ceil(page_size as u64) as u32
    }
}

/// Cursor de páginas por token sobre el listado plano del canal,
/// independiente del crawl de playlists: no comparten estado mutable.
///
/// Mientras hay una navegación en vuelo, cualquier otra navegación o
/// "cargar más" es un no-op, para que una respuesta tardía no pise
/// estado más nuevo.
pub struct PaginationManager {
    source: Arc<dyn VideoSource>,
    page_size: u32,
    order: VideoOrder,
    state: Mutex<PaginationState>,
    in_flight: AtomicBool,
    on_navigate: Option<Box<dyn Fn(u32) + Send + Sync>>,
}

impl PaginationManager {
    pub fn new(source: Arc<dyn VideoSource>, page_size: u32, order: VideoOrder) -> Self {
        Self {
            source,
            page_size,
            order,
            state: Mutex::new(PaginationState {
                current_page: 1,
                ..PaginationState::default()
            }),
            in_flight: AtomicBool::new(false),
            on_navigate: None,
        }
    }

    /// Hook que la UI engancha para el scroll-to-top al cambiar de página
    pub fn with_on_navigate(mut self, hook: impl Fn(u32) + Send + Sync + 'static) -> Self {
        self.on_navigate = Some(Box::new(hook));
        self
    }

    pub fn state(&self) -> PaginationState {
        self.state.lock().clone()
    }

    pub fn total_pages(&self) -> u32 {
        self.state.lock().total_pages(self.page_size)
    }

    /// Carga la primera página (o recarga desde el principio)
    pub async fn load_first_page(&self) -> Result<()> {
        self.go_to_page(None, 1).await
    }

    /// Agrega la siguiente página al final de `items`. No-op si no hay
    /// token o si ya hay un fetch en vuelo.
    pub async fn load_more(&self) -> Result<()> {
        let token = match self.state.lock().next_page_token.clone() {
            Some(token) => token,
            None => {
                debug!("📄 load_more sin token: no-op");
                return Ok(());
            }
        };

        if !self.try_begin_fetch() {
            return Ok(());
        }

        let result = self
            .source
            .get_channel_videos(self.page_size, Some(token), self.order)
            .await;

        match result {
            Ok(page) => {
                let mut state = self.state.lock();
                let next = state.apply_append(&page);
                *state = next;
                debug!("✅ load_more: {} items acumulados", state.items.len());
            }
            Err(e) => {
                // "cargar más no hizo nada": el estado queda intacto
                warn!("❌ Error en load_more: {}", e);
            }
        }

        self.end_fetch();
        Ok(())
    }

    /// Navega a una página concreta reemplazando `items` entero. No-op si
    /// ya hay una navegación en vuelo.
    pub async fn go_to_page(&self, token: Option<String>, page_number: u32) -> Result<()> {
        if !self.try_begin_fetch() {
            debug!("📄 Navegación en vuelo, ignorando go_to_page({})", page_number);
            return Ok(());
        }

        let result = self
            .source
            .get_channel_videos(self.page_size, token, self.order)
            .await;

        match result {
            Ok(page) => {
                {
                    let mut state = self.state.lock();
                    let next = state.apply_replace(&page, page_number);
                    *state = next;
                }
                debug!("✅ Página {} cargada", page_number);
                if let Some(hook) = &self.on_navigate {
                    hook(page_number);
                }
            }
            Err(e) => {
                warn!("❌ Error al navegar a la página {}: {}", page_number, e);
            }
        }

        self.end_fetch();
        Ok(())
    }

    pub async fn go_to_next(&self) -> Result<()> {
        let (token, page) = {
            let state = self.state.lock();
            if !state.has_next_page() {
                return Ok(());
            }
            (state.next_page_token.clone(), state.current_page + 1)
        };
        self.go_to_page(token, page).await
    }

    pub async fn go_to_prev(&self) -> Result<()> {
        let (token, page) = {
            let state = self.state.lock();
            if !state.has_prev_page() {
                return Ok(());
            }
            // Sin token de retroceso solo se puede volver a la página 1;
            // desde más atrás sería etiquetar otra página con el número
            // equivocado
            if state.prev_page_token.is_none() && state.current_page > 2 {
                debug!("📄 go_to_prev sin token en página {}: no-op", state.current_page);
                return Ok(());
            }
            (state.prev_page_token.clone(), state.current_page - 1)
        };
        self.go_to_page(token, page).await
    }

    pub async fn go_to_first(&self) -> Result<()> {
        self.go_to_page(None, 1).await
    }

    fn try_begin_fetch(&self) -> bool {
        self.in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn end_fetch(&self) {
        self.in_flight.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::{MockVideoSource, Playlist, PlaylistVideosPage, SearchPage};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::time::Duration;
    use tokio::time::sleep;

    fn video(id: &str) -> Video {
        Video::new(id.to_string(), format!("Video {}", id))
    }

    fn page(ids: &[&str], total: u64, next: Option<&str>, prev: Option<&str>) -> VideoPage {
        VideoPage {
            videos: ids.iter().map(|id| video(id)).collect(),
            total_results: total,
            next_page_token: next.map(String::from),
            prev_page_token: prev.map(String::from),
        }
    }

    /// Fuente simulada que resuelve por token: sin token es la página 1
    fn paged_source() -> MockVideoSource {
        let mut mock = MockVideoSource::new();
        mock.expect_get_channel_videos().returning(|_, token, _| {
            Ok(match token.as_deref() {
                None => page(&["a1", "a2"], 45, Some("t2"), None),
                Some("t2") => page(&["b1", "b2"], 45, Some("t3"), Some("t1")),
                Some("t3") => page(&["c1"], 45, None, Some("t2")),
                Some(other) => panic!("token inesperado: {}", other),
            })
        });
        mock
    }

    /// Fuente con latencia fija que registra el token de cada fetch,
    /// para ejercitar el guard de navegación en vuelo
    struct SlowSource {
        delay: Duration,
        calls: Mutex<Vec<Option<String>>>,
    }

    impl SlowSource {
        fn new(delay_ms: u64) -> Self {
            Self {
                delay: Duration::from_millis(delay_ms),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<Option<String>> {
            self.calls.lock().clone()
        }
    }

    #[async_trait]
    impl VideoSource for SlowSource {
        async fn get_channel_videos(
            &self,
            _max_results: u32,
            page_token: Option<String>,
            _order: VideoOrder,
        ) -> Result<VideoPage> {
            self.calls.lock().push(page_token.clone());
            sleep(self.delay).await;
            Ok(match page_token.as_deref() {
                None => page(&["a1", "a2"], 45, Some("t2"), None),
                Some("t2") => page(&["b1", "b2"], 45, Some("t3"), Some("t1")),
                // La API puede omitir el token de retroceso
                Some("t3") => page(&["c1"], 45, None, None),
                Some(other) => panic!("token inesperado: {}", other),
            })
        }

        async fn get_playlist_videos(
            &self,
            _playlist_id: &str,
            _max_results: u32,
            _page_token: Option<String>,
        ) -> Result<PlaylistVideosPage> {
            unimplemented!()
        }

        async fn get_channel_playlists(&self) -> Result<Vec<Playlist>> {
            unimplemented!()
        }

        async fn search_videos(
            &self,
            _query: &str,
            _max_results: u32,
            _page_token: Option<String>,
        ) -> Result<SearchPage> {
            unimplemented!()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_navigation_in_flight_rejects_second_navigation() {
        let source = Arc::new(SlowSource::new(1000));
        let manager = Arc::new(PaginationManager::new(
            Arc::clone(&source) as Arc<dyn VideoSource>,
            20,
            VideoOrder::Date,
        ));

        let first = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.go_to_page(None, 1).await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Con la primera navegación en vuelo, la segunda es no-op
        manager.go_to_page(Some("t2".to_string()), 2).await.unwrap();
        first.await.unwrap().unwrap();

        assert_eq!(source.calls(), vec![None]);
        let state = manager.state();
        assert_eq!(state.current_page, 1);
        let ids: Vec<&str> = state.items.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_load_more_in_flight_rejects_second_load_more() {
        let source = Arc::new(SlowSource::new(1000));
        let manager = Arc::new(PaginationManager::new(
            Arc::clone(&source) as Arc<dyn VideoSource>,
            20,
            VideoOrder::Date,
        ));

        manager.load_first_page().await.unwrap();

        let first = tokio::spawn({
            let manager = Arc::clone(&manager);
            async move { manager.load_more().await }
        });
        tokio::time::sleep(Duration::from_millis(100)).await;

        // Segundo load_more con el primero en vuelo: cero fetches extra,
        // sin append duplicado
        manager.load_more().await.unwrap();
        first.await.unwrap().unwrap();

        assert_eq!(source.calls(), vec![None, Some("t2".to_string())]);
        let ids: Vec<String> = manager
            .state()
            .items
            .iter()
            .map(|v| v.id.clone())
            .collect();
        assert_eq!(ids, vec!["a1", "a2", "b1", "b2"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_go_to_prev_without_token_past_page_two_is_noop() {
        let source = Arc::new(SlowSource::new(0));
        let manager = PaginationManager::new(
            Arc::clone(&source) as Arc<dyn VideoSource>,
            20,
            VideoOrder::Date,
        );

        manager.go_to_page(Some("t3".to_string()), 3).await.unwrap();
        let state = manager.state();
        assert_eq!(state.current_page, 3);
        assert!(state.prev_page_token.is_none());

        // Retroceder sin token desde la página 3 re-etiquetaría la
        // página 1 como página 2: debe ser no-op
        manager.go_to_prev().await.unwrap();
        assert_eq!(manager.state().current_page, 3);
        assert_eq!(source.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_load_more_appends_preserving_order() {
        let manager = PaginationManager::new(Arc::new(paged_source()), 20, VideoOrder::Date);

        manager.load_first_page().await.unwrap();
        let before = manager.state();
        assert_eq!(before.items.len(), 2);

        manager.load_more().await.unwrap();
        let after = manager.state();
        assert_eq!(after.items.len(), 4);
        let ids: Vec<&str> = after.items.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["a1", "a2", "b1", "b2"]);
        // current_page no cambia al acumular
        assert_eq!(after.current_page, before.current_page);
    }

    #[tokio::test]
    async fn test_go_to_page_replaces_items() {
        let manager = PaginationManager::new(Arc::new(paged_source()), 20, VideoOrder::Date);

        manager.load_first_page().await.unwrap();
        manager.go_to_page(Some("t2".to_string()), 2).await.unwrap();

        let state = manager.state();
        let ids: Vec<&str> = state.items.iter().map(|v| v.id.as_str()).collect();
        assert_eq!(ids, vec!["b1", "b2"]);
        assert_eq!(state.current_page, 2);
        assert_eq!(state.prev_page_token.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn test_boundary_navigation() {
        let manager = PaginationManager::new(Arc::new(paged_source()), 20, VideoOrder::Date);

        manager.load_first_page().await.unwrap();
        assert_eq!(manager.total_pages(), 3); // ceil(45 / 20)
        assert!(!manager.state().has_prev_page());

        manager.go_to_next().await.unwrap();
        manager.go_to_next().await.unwrap();

        let state = manager.state();
        assert_eq!(state.current_page, 3);
        assert!(!state.has_next_page());

        // En la última página, go_to_next es no-op
        manager.go_to_next().await.unwrap();
        assert_eq!(manager.state().current_page, 3);
    }

    #[tokio::test]
    async fn test_load_more_without_token_is_noop() {
        let mut mock = MockVideoSource::new();
        mock.expect_get_channel_videos()
            .times(1)
            .returning(|_, _, _| Ok(page(&["a1"], 1, None, None)));

        let manager = PaginationManager::new(Arc::new(mock), 20, VideoOrder::Date);
        manager.load_first_page().await.unwrap();

        // Sin next_page_token: cero llamadas adicionales (times(1) lo valida)
        manager.load_more().await.unwrap();
        assert_eq!(manager.state().items.len(), 1);
    }

    #[tokio::test]
    async fn test_fetch_error_leaves_state_untouched() {
        let mut mock = MockVideoSource::new();
        let mut first = true;
        mock.expect_get_channel_videos().returning(move |_, _, _| {
            if first {
                first = false;
                Ok(page(&["a1"], 45, Some("t2"), None))
            } else {
                Err(anyhow::anyhow!("fallo simulado"))
            }
        });

        let manager = PaginationManager::new(Arc::new(mock), 20, VideoOrder::Date);
        manager.load_first_page().await.unwrap();
        let before = manager.state();

        manager.load_more().await.unwrap();
        let after = manager.state();
        assert_eq!(after.items.len(), before.items.len());
        assert_eq!(after.current_page, before.current_page);
    }

    #[tokio::test]
    async fn test_navigate_hook_fires_on_replace() {
        let fired = Arc::new(std::sync::atomic::AtomicU32::new(0));
        let fired_clone = Arc::clone(&fired);

        let manager = PaginationManager::new(Arc::new(paged_source()), 20, VideoOrder::Date)
            .with_on_navigate(move |page| {
                fired_clone.store(page, Ordering::SeqCst);
            });

        manager.load_first_page().await.unwrap();
        manager.go_to_next().await.unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }
}
