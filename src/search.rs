use anyhow::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::sources::{Video, VideoSource};

/// Estado del modo búsqueda. Se entra con una query no vacía tras el
/// debounce y se sale al limpiarla; el cursor del listado normal vive en
/// el `PaginationManager` y nunca se mezcla con este.
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pub query: String,
    pub results: Vec<Video>,
    pub total_results: u64,
    pub next_page_token: Option<String>,
    pub is_search_mode: bool,
}

/// Sesión de búsqueda con debounce y paginación propia.
///
/// Cada entrada de texto se debouncea antes de disparar la llamada de
/// red, y cada request lleva un número de secuencia monótono: una
/// respuesta cuya secuencia ya no es la vigente se descarta antes de
/// tocar el estado, así una respuesta lenta nunca pisa una query más
/// nueva.
pub struct SearchSession {
    source: Arc<dyn VideoSource>,
    page_size: u32,
    debounce: Duration,
    seq: AtomicU64,
    state: Mutex<SearchState>,
    loading_more: AtomicBool,
}

impl SearchSession {
    pub fn new(source: Arc<dyn VideoSource>, page_size: u32, debounce: Duration) -> Self {
        Self {
            source,
            page_size,
            debounce,
            seq: AtomicU64::new(0),
            state: Mutex::new(SearchState::default()),
            loading_more: AtomicBool::new(false),
        }
    }

    pub fn state(&self) -> SearchState {
        self.state.lock().clone()
    }

    /// Registra un cambio en el campo de búsqueda.
    ///
    /// Espera el debounce; si mientras tanto llegó otra entrada, esta se
    /// descarta sin tocar la red. Query vacía tras el debounce: se sale
    /// del modo búsqueda.
    pub async fn submit_query(&self, query: &str) -> Result<()> {
        let my_seq = self.seq.fetch_add(1, Ordering::SeqCst) + 1;
        let query = query.trim().to_string();

        sleep(self.debounce).await;
        if self.seq.load(Ordering::SeqCst) != my_seq {
            debug!("⏰ Entrada '{}' superada durante el debounce", query);
            return Ok(());
        }

        if query.is_empty() {
            *self.state.lock() = SearchState::default();
            debug!("🔙 Query vacía: saliendo del modo búsqueda");
            return Ok(());
        }

        let result = self.source.search_videos(&query, self.page_size, None).await;

        // Guard de respuesta vieja: solo la secuencia vigente comitea
        if self.seq.load(Ordering::SeqCst) != my_seq {
            debug!("⏰ Respuesta tardía para '{}' descartada", query);
            return Ok(());
        }

        match result {
            Ok(page) => {
                let mut state = self.state.lock();
                debug!("✅ Búsqueda '{}': {} resultados", query, page.videos.len());
                *state = SearchState {
                    query,
                    results: page.videos,
                    total_results: page.total_results,
                    next_page_token: page.next_page_token,
                    is_search_mode: true,
                };
            }
            Err(e) => {
                // Degradación: modo búsqueda sin resultados, no un error global
                warn!("❌ Error en búsqueda '{}': {}", query, e);
                *self.state.lock() = SearchState {
                    query,
                    is_search_mode: true,
                    ..SearchState::default()
                };
            }
        }

        Ok(())
    }

    /// Acumula la siguiente página de la query vigente. No-op si no hay
    /// token, la query está vacía o ya hay una carga en vuelo.
    pub async fn load_more_results(&self) -> Result<()> {
        let (query, token, my_seq) = {
            let state = self.state.lock();
            if !state.is_search_mode || state.query.is_empty() {
                return Ok(());
            }
            match &state.next_page_token {
                Some(token) => (
                    state.query.clone(),
                    token.clone(),
                    self.seq.load(Ordering::SeqCst),
                ),
                None => {
                    debug!("📄 load_more_results sin token: no-op");
                    return Ok(());
                }
            }
        };

        if self
            .loading_more
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Ok(());
        }

        let result = self
            .source
            .search_videos(&query, self.page_size, Some(token))
            .await;

        // Comitea solo si la query sigue siendo la vigente
        let still_current =
            self.seq.load(Ordering::SeqCst) == my_seq && self.state.lock().query == query;
        if still_current {
            match result {
                Ok(page) => {
                    let mut state = self.state.lock();
                    state.results.extend(page.videos);
                    state.total_results = page.total_results;
                    state.next_page_token = page.next_page_token;
                    debug!(
                        "✅ load_more_results '{}': {} acumulados",
                        query,
                        state.results.len()
                    );
                }
                Err(e) => {
                    warn!("❌ Error en load_more_results '{}': {}", query, e);
                }
            }
        } else {
            debug!("⏰ load_more_results de '{}' descartado por query nueva", query);
        }

        self.loading_more.store(false, Ordering::SeqCst);
        Ok(())
    }
}
