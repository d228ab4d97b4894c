//! Two-level translation cache.
//!
//! L1 is a bounded in-process map with a fixed TTL, L2 is a shared
//! network-backed store. Reads go L1 then L2 (promoting L2 hits into L1),
//! writes go to both levels independently. L2 failures never fail a
//! resolution; they are logged and treated as a miss. Every L2 call is
//! bounded by `l2_timeout`, so a backend that stops answering only costs
//! that long.

use crate::error::CacheError;
use crate::normalize::CacheKey;
use async_trait::async_trait;
use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheLevel {
    L1,
    L2,
}

/// A cached translation. Writes replace the whole entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub translated_text: String,
    pub source_language: String,
    pub target_language: String,
    pub service: String,
    pub confidence: u8,
    pub original_text: String,
    /// Level the entry was read from; never stored.
    #[serde(skip)]
    pub cache_level: Option<CacheLevel>,
}

/// Shared key/value store with per-key expiry backing the L2 level.
#[async_trait]
pub trait DistributedCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError>;

    async fn ping(&self) -> Result<(), CacheError>;

    async fn stats(&self) -> Result<RemoteStats, CacheError>;
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RemoteStats {
    pub total_keys: u64,
    pub memory_used: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CacheSettings {
    pub l1_enabled: bool,
    pub l1_capacity: usize,
    pub l1_ttl: Duration,
    pub l2_enabled: bool,
    pub l2_ttl: Duration,
    /// Upper bound for a single L2 call
    pub l2_timeout: Duration,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            l1_enabled: true,
            l1_capacity: 1000,
            l1_ttl: Duration::from_secs(300),
            l2_enabled: true,
            l2_ttl: Duration::from_secs(3600),
            l2_timeout: Duration::from_secs(2),
        }
    }
}

struct Slot {
    entry: CacheEntry,
    expires_at: Instant,
}

/// Process-local level.
///
/// Every write refreshes recency and expiry alike, and reads use `peek`, so
/// the LRU tail is always the entry closest to expiry. Capacity eviction
/// therefore drops the soonest-expiring entry, and expired entries are
/// purged from the tail before each write.
pub struct LocalCache {
    inner: Mutex<LruCache<CacheKey, Slot>>,
    capacity: usize,
    ttl: Duration,
}

impl LocalCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
            capacity: capacity.get(),
            ttl,
        }
    }

    pub fn get(&self, key: &CacheKey) -> Option<CacheEntry> {
        let mut cache = self.inner.lock();
        let expired = match cache.peek(key) {
            Some(slot) if slot.expires_at > Instant::now() => return Some(slot.entry.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            cache.pop(key);
        }
        None
    }

    pub fn insert(&self, key: CacheKey, entry: CacheEntry) {
        let mut cache = self.inner.lock();
        Self::purge_expired(&mut cache);
        cache.put(
            key,
            Slot {
                entry,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        let mut cache = self.inner.lock();
        Self::purge_expired(&mut cache);
        cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn purge_expired(cache: &mut LruCache<CacheKey, Slot>) {
        let now = Instant::now();
        while matches!(cache.peek_lru(), Some((_, slot)) if slot.expires_at <= now) {
            cache.pop_lru();
        }
    }
}

/// Observability snapshot handed to the health check.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub l1_enabled: bool,
    pub l2_enabled: bool,
    pub l1_size: usize,
    pub l1_max_size: usize,
    pub l2_connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l2_total_keys: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l2_memory_used: Option<String>,
}

pub struct CacheStore {
    l1: Option<LocalCache>,
    l2: Option<Arc<dyn DistributedCache>>,
    l2_ttl: Duration,
    l2_timeout: Duration,
}

/// Run an L2 call, turning an elapsed deadline into a backend error.
async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, CacheError>
where
    F: std::future::Future<Output = Result<T, CacheError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(CacheError::Backend(format!("timed out after {:?}", limit))))
}

impl CacheStore {
    /// Build the store. `l2` is ignored when the L2 level is disabled.
    pub fn new(settings: &CacheSettings, l2: Option<Arc<dyn DistributedCache>>) -> Self {
        let l1 = settings
            .l1_enabled
            .then(|| LocalCache::new(settings.l1_capacity, settings.l1_ttl));
        let l2 = if settings.l2_enabled { l2 } else { None };

        Self {
            l1,
            l2,
            l2_ttl: settings.l2_ttl,
            l2_timeout: settings.l2_timeout,
        }
    }

    pub async fn get(&self, text: &str, target_language: &str) -> Option<CacheEntry> {
        let key = CacheKey::new(text, target_language);

        if let Some(l1) = &self.l1 {
            if let Some(mut entry) = l1.get(&key) {
                debug!("L1 cache hit for {}", key);
                entry.cache_level = Some(CacheLevel::L1);
                return Some(entry);
            }
        }

        let l2 = self.l2.as_ref()?;
        let bytes = match bounded(self.l2_timeout, l2.get(key.as_str())).await {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!("Cache miss for {}", key);
                return None;
            }
            Err(e) => {
                warn!("L2 cache read failed for {}: {}", key, e);
                return None;
            }
        };

        let mut entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Discarding unreadable L2 entry {}: {}", key, e);
                return None;
            }
        };

        if let Some(l1) = &self.l1 {
            l1.insert(key.clone(), entry.clone());
        }
        debug!("L2 cache hit for {}", key);
        entry.cache_level = Some(CacheLevel::L2);
        Some(entry)
    }

    pub async fn set(&self, text: &str, target_language: &str, entry: &CacheEntry) {
        let key = CacheKey::new(text, target_language);
        let mut entry = entry.clone();
        entry.cache_level = None;

        if let Some(l1) = &self.l1 {
            l1.insert(key.clone(), entry.clone());
        }

        if let Some(l2) = &self.l2 {
            let result = match serde_json::to_vec(&entry) {
                Ok(bytes) => {
                    bounded(self.l2_timeout, l2.set(key.as_str(), bytes, self.l2_ttl)).await
                }
                Err(e) => Err(e.into()),
            };
            if let Err(e) = result {
                warn!("L2 cache write failed for {}: {}", key, e);
            }
        }
    }

    /// Ping the L2 backend. `None` when L2 is not configured.
    pub async fn ping_l2(&self) -> Option<Result<(), CacheError>> {
        match &self.l2 {
            Some(l2) => Some(bounded(self.l2_timeout, l2.ping()).await),
            None => None,
        }
    }

    pub async fn stats(&self) -> CacheStats {
        let (l1_size, l1_max_size) = self
            .l1
            .as_ref()
            .map(|l1| (l1.len(), l1.capacity()))
            .unwrap_or((0, 0));

        let mut stats = CacheStats {
            l1_enabled: self.l1.is_some(),
            l2_enabled: self.l2.is_some(),
            l1_size,
            l1_max_size,
            l2_connected: false,
            l2_total_keys: None,
            l2_memory_used: None,
        };

        if let Some(l2) = &self.l2 {
            match bounded(self.l2_timeout, l2.stats()).await {
                Ok(remote) => {
                    stats.l2_connected = true;
                    stats.l2_total_keys = Some(remote.total_keys);
                    stats.l2_memory_used = remote.memory_used;
                }
                Err(e) => warn!("L2 cache stats unavailable: {}", e),
            }
        }

        stats
    }
}

/// In-memory [`DistributedCache`] for tests and single-node setups.
#[derive(Default)]
pub struct MemoryBackend {
    entries: Mutex<std::collections::HashMap<String, (Vec<u8>, Instant)>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DistributedCache for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut entries = self.entries.lock();
        match entries.get(key) {
            Some((value, expires_at)) if *expires_at > Instant::now() => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        self.entries
            .lock()
            .insert(key.to_string(), (value, Instant::now() + ttl));
        Ok(())
    }

    async fn ping(&self) -> Result<(), CacheError> {
        Ok(())
    }

    async fn stats(&self) -> Result<RemoteStats, CacheError> {
        Ok(RemoteStats {
            total_keys: self.entries.lock().len() as u64,
            memory_used: None,
        })
    }
}
