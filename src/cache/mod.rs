//! Two-tier cache for raw tide-source responses.
//!
//! The [`CacheTier`] trait is the whole storage contract: `get` and `put`
//! by normalised cache key. Two implementations exist:
//!
//! - [`MemoryCache`]: process-scoped map, never expires;
//! - [`DiskCache`]: one file per key, passively invalidated by TTL.
//!
//! [`TideCache`] consults memory first, then disk, promotes disk hits into
//! memory, and writes through to both tiers. Disk errors are logged and
//! treated as misses; they never fail a request.
//!
//! Implementations must be `Send + Sync`; one [`MemoryCache`] is shared by
//! every request of a process.

pub mod disk;
pub mod memory;

use std::io;
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, warn};

pub use disk::DiskCache;
pub use memory::MemoryCache;

/// A raw response payload and the moment it was written.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub payload: String,
    pub written_at: SystemTime,
}

impl CacheEntry {
    pub fn new(payload: String) -> Self {
        Self {
            payload,
            written_at: SystemTime::now(),
        }
    }
}

/// Abstract key/value storage for cached tide payloads.
pub trait CacheTier: Send + Sync {
    /// Short tier label for logs (`"memory"`, `"disk"`).
    fn name(&self) -> &str;

    /// Fetch a live entry. Expired entries are reported as `Ok(None)`.
    fn get(&self, key: &str) -> io::Result<Option<CacheEntry>>;

    /// Store an entry, replacing any previous one for `key`.
    fn put(&self, key: &str, entry: &CacheEntry) -> io::Result<()>;
}

/// Which tier satisfied a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheHit {
    Memory,
    Disk,
}

/// Memory-then-disk cache façade.
pub struct TideCache {
    memory: Arc<MemoryCache>,
    disk: Option<DiskCache>,
}

impl TideCache {
    /// Compose a cache from a shared memory tier and an optional disk tier.
    pub fn new(memory: Arc<MemoryCache>, disk: Option<DiskCache>) -> Self {
        Self { memory, disk }
    }

    pub fn memory_only() -> Self {
        Self::new(Arc::new(MemoryCache::new()), None)
    }

    pub fn memory(&self) -> &Arc<MemoryCache> {
        &self.memory
    }

    pub fn disk(&self) -> Option<&DiskCache> {
        self.disk.as_ref()
    }

    /// Look a key up in memory, then on disk.
    ///
    /// A disk hit is copied into the memory tier before returning.
    pub fn lookup(&self, key: &str) -> Option<(CacheEntry, CacheHit)> {
        let memory = self.memory.as_ref();
        match memory.get(key) {
            Ok(Some(entry)) => {
                debug!(key = short(key), tier = memory.name(), "Tide cache hit");
                return Some((entry, CacheHit::Memory));
            }
            Ok(None) => {}
            Err(e) => warn!(
                key = short(key),
                tier = memory.name(),
                error = %e,
                "Cache read failed"
            ),
        }

        let disk = self.disk.as_ref()?;
        match disk.get(key) {
            Ok(Some(entry)) => {
                debug!(key = short(key), tier = disk.name(), "Tide cache hit");
                if let Err(e) = memory.put(key, &entry) {
                    warn!(key = short(key), tier = memory.name(), error = %e, "Cache write failed");
                }
                Some((entry, CacheHit::Disk))
            }
            Ok(None) => None,
            Err(e) => {
                warn!(
                    key = short(key),
                    tier = disk.name(),
                    path = %disk.path_for(key).display(),
                    error = %e,
                    "Cache read failed, treating as miss"
                );
                None
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.lookup(key).map(|(entry, _)| entry)
    }

    /// Write an entry to every tier. Failures are logged, never returned.
    pub fn store(&self, key: &str, entry: &CacheEntry) {
        if let Err(e) = self.memory.put(key, entry) {
            warn!(key = short(key), tier = self.memory.name(), error = %e, "Cache write failed");
        }
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.put(key, entry) {
                warn!(
                    key = short(key),
                    tier = disk.name(),
                    path = %disk.path_for(key).display(),
                    error = %e,
                    "Cache write failed"
                );
            }
        }
    }
}

/// Key prefix used in log lines.
pub(crate) fn short(key: &str) -> &str {
    &key[..key.len().min(12)]
}
