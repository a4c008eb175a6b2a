//! In-memory [`CacheTier`] shared across requests.
//!
//! Uses a `HashMap` behind `std::sync::RwLock`. Entries live until the
//! process exits; there is no expiry.

use std::collections::HashMap;
use std::io;
use std::sync::{PoisonError, RwLock};

use super::{CacheEntry, CacheTier};

pub struct MemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheTier for MemoryCache {
    fn name(&self) -> &str {
        "memory"
    }

    fn get(&self, key: &str) -> io::Result<Option<CacheEntry>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, entry: &CacheEntry) -> io::Result<()> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(key.to_string(), entry.clone());
        Ok(())
    }
}
