use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::layer_store::RasterLayer;

/// Cache key: source identifier plus a SHA-256 of its bytes, so a re-upload of
/// the same file hits and a changed file under the same name misses.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SourceKey {
    id: Arc<str>,
    digest: [u8; 32],
}

impl SourceKey {
    pub fn new(id: &str, bytes: &[u8]) -> Self {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&Sha256::digest(bytes));
        Self {
            id: Arc::from(id),
            digest,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

/// Bounded LRU of decoded layers, shareable across threads and sessions.
///
/// Entries are reference counted: evicting a slot drops only the cache's
/// handle, never a layer already returned to a caller.
#[derive(Clone)]
pub struct DecodeCache {
    // None when capacity is zero.
    entries: Arc<Mutex<Option<LruCache<SourceKey, Arc<RasterLayer>>>>>,
}

impl DecodeCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(NonZeroUsize::new(capacity).map(LruCache::new))),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<LruCache<SourceKey, Arc<RasterLayer>>>> {
        // A panic while holding the lock cannot leave the LRU half-updated.
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Look up a key and mark it most recently used.
    pub fn get(&self, key: &SourceKey) -> Option<Arc<RasterLayer>> {
        self.lock().as_mut()?.get(key).cloned()
    }

    pub fn contains(&self, key: &SourceKey) -> bool {
        self.lock().as_ref().is_some_and(|c| c.contains(key))
    }

    /// Insert a decoded layer. Write-once per key: if another caller already
    /// populated the key, that value wins and is returned.
    pub fn insert(&self, key: SourceKey, layer: Arc<RasterLayer>) -> Arc<RasterLayer> {
        let mut guard = self.lock();
        let Some(cache) = guard.as_mut() else {
            return layer;
        };
        if let Some(existing) = cache.get(&key) {
            return Arc::clone(existing);
        }
        if let Some((evicted, _)) = cache.push(key, Arc::clone(&layer)) {
            debug!(source = evicted.id(), "evicted decoded layer from cache");
        }
        layer
    }

    pub fn len(&self) -> usize {
        self.lock().as_ref().map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().as_ref().map_or(0, |c| c.cap().get())
    }

    pub fn clear(&self) {
        if let Some(cache) = self.lock().as_mut() {
            cache.clear();
        }
    }
}
