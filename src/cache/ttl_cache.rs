use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Entrada de cache con expiración absoluta
#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn new(value: V, ttl: Duration) -> Self {
        Self {
            value,
            expires_at: Instant::now() + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() > self.expires_at
    }
}

/// Cache clave/valor con TTL y namespace.
///
/// El namespace es un prefijo sobre la clave, de modo que varios caches
/// lógicos pueden compartir el mismo mapa subyacente sin colisionar.
/// `len`, `clear` y `cleanup_expired` operan solo sobre las claves del
/// namespace propio. Un `get` nunca devuelve una entrada expirada aunque
/// el barrido todavía no haya corrido: la lectura se auto-limpia.
#[derive(Debug)]
pub struct TtlCache<V> {
    namespace: String,
    default_ttl: Duration,
    data: Arc<DashMap<String, CacheEntry<V>>>,
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    expired_removals: Arc<AtomicU64>,
}

impl<V> TtlCache<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(namespace: impl Into<String>, default_ttl: Duration) -> Self {
        Self {
            namespace: namespace.into(),
            default_ttl,
            data: Arc::new(DashMap::new()),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            expired_removals: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Otra vista sobre el mismo mapa subyacente, con namespace y TTL
    /// propios. Los contadores de métricas no se comparten.
    pub fn shared_with(&self, namespace: impl Into<String>, default_ttl: Duration) -> Self {
        Self {
            namespace: namespace.into(),
            default_ttl,
            data: Arc::clone(&self.data),
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            expired_removals: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    fn scoped_key(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }

    fn scope_prefix(&self) -> String {
        format!("{}:", self.namespace)
    }

    /// Devuelve el valor si existe y no expiró. Una entrada expirada se
    /// elimina en el acto y cuenta como miss.
    pub fn get(&self, key: &str) -> Option<V> {
        let scoped = self.scoped_key(key);
        match self.data.get(&scoped) {
            Some(entry) if entry.is_expired() => {
                drop(entry);
                self.data.remove(&scoped);
                self.expired_removals.fetch_add(1, Ordering::Relaxed);
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Some(entry) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Some(entry.value.clone())
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Inserta con el TTL por defecto del cache
    pub fn set(&self, key: &str, value: V) -> Option<V> {
        self.set_with_ttl(key, value, self.default_ttl)
    }

    /// Inserta sobreescribiendo incondicionalmente; devuelve el valor previo
    pub fn set_with_ttl(&self, key: &str, value: V, ttl: Duration) -> Option<V> {
        let entry = CacheEntry::new(value, ttl);
        self.data
            .insert(self.scoped_key(key), entry)
            .map(|old| old.value)
    }

    pub fn delete(&self, key: &str) -> Option<V> {
        self.data
            .remove(&self.scoped_key(key))
            .map(|(_, entry)| entry.value)
    }

    /// Elimina todas las entradas de este namespace
    pub fn clear(&self) {
        let prefix = self.scope_prefix();
        let keys: Vec<String> = self
            .data
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix))
            .map(|entry| entry.key().clone())
            .collect();

        for key in keys {
            self.data.remove(&key);
        }
    }

    /// Número de entradas de este namespace (incluye expiradas aún no barridas)
    pub fn len(&self) -> usize {
        let prefix = self.scope_prefix();
        self.data
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Barre las entradas expiradas de este namespace y devuelve cuántas
    /// se eliminaron. Pensado para invocarse de forma periódica u
    /// oportunista, no en cada lectura.
    pub fn cleanup_expired(&self) -> usize {
        let prefix = self.scope_prefix();
        let keys_to_remove: Vec<String> = self
            .data
            .iter()
            .filter_map(|entry| {
                if entry.key().starts_with(&prefix) && entry.value().is_expired() {
                    Some(entry.key().clone())
                } else {
                    None
                }
            })
            .collect();

        let mut removed = 0;
        for key in keys_to_remove {
            if self.data.remove(&key).is_some() {
                removed += 1;
            }
        }

        if removed > 0 {
            self.expired_removals
                .fetch_add(removed as u64, Ordering::Relaxed);
            debug!("🧹 Limpiadas {} entradas expiradas de '{}'", removed, self.namespace);
        }

        removed
    }

    pub fn metrics(&self) -> CacheMetrics {
        CacheMetrics {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            expired_removals: self.expired_removals.load(Ordering::Relaxed),
        }
    }
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            namespace: self.namespace.clone(),
            default_ttl: self.default_ttl,
            data: Arc::clone(&self.data),
            hits: Arc::clone(&self.hits),
            misses: Arc::clone(&self.misses),
            expired_removals: Arc::clone(&self.expired_removals),
        }
    }
}

/// Métricas básicas del cache
#[derive(Debug, Clone)]
pub struct CacheMetrics {
    pub hits: u64,
    pub misses: u64,
    pub expired_removals: u64,
}

impl CacheMetrics {
    pub fn hit_rate(&self) -> f64 {
        if self.hits + self.misses == 0 {
            0.0
        } else {
            self.hits as f64 / (self.hits + self.misses) as f64
        }
    }

    pub fn miss_rate(&self) -> f64 {
        1.0 - self.hit_rate()
    }
}
