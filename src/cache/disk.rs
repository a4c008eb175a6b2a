//! Filesystem-backed [`CacheTier`].
//!
//! One `<key>.json` file per cache key, holding the raw response body
//! exactly as received. The file's mtime is the write time used for TTL
//! checks. Stale files are reported as misses and left in place; only
//! [`DiskCache::purge_older_than`] deletes anything.
//!
//! Writes go through a temporary file and a rename, so concurrent writers
//! for the same key leave one complete payload (last write wins).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime};

use tracing::debug;
use walkdir::WalkDir;

use super::{short, CacheEntry, CacheTier};

const ENTRY_EXT: &str = "json";

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

pub struct DiskCache {
    dir: PathBuf,
    ttl: Option<Duration>,
}

/// Metadata about one file in the cache directory.
#[derive(Debug, Clone)]
pub struct DiskEntryInfo {
    pub key: String,
    pub path: PathBuf,
    pub size: u64,
    pub written_at: SystemTime,
}

impl DiskCache {
    /// Create a disk tier rooted at `dir`.
    ///
    /// A TTL of `None`, zero, a negative number of hours, or one too large
    /// to represent never expires.
    pub fn new(dir: impl AsRef<Path>, ttl_hours: Option<f64>) -> Self {
        let ttl = ttl_hours
            .filter(|h| *h > 0.0)
            .and_then(|h| Duration::try_from_secs_f64(h * 3600.0).ok());
        Self {
            dir: dir.as_ref().to_path_buf(),
            ttl,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, ENTRY_EXT))
    }

    /// Whether an entry written at `written_at` is past the TTL at `now`.
    pub fn is_stale(&self, written_at: SystemTime, now: SystemTime) -> bool {
        match self.ttl {
            Some(ttl) => now.duration_since(written_at).unwrap_or_default() > ttl,
            None => false,
        }
    }

    /// List cache files, sorted by key. A missing directory is empty.
    pub fn entries(&self) -> io::Result<Vec<DiskEntryInfo>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for entry in WalkDir::new(&self.dir).min_depth(1).max_depth(1) {
            let entry = entry.map_err(io::Error::other)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXT) {
                continue;
            }
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let metadata = entry.metadata().map_err(io::Error::other)?;
            entries.push(DiskEntryInfo {
                key: key.to_string(),
                path: path.to_path_buf(),
                size: metadata.len(),
                written_at: metadata.modified()?,
            });
        }
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(entries)
    }

    /// Delete entries older than `max_age`. Returns the removed entries.
    pub fn purge_older_than(&self, max_age: Duration) -> io::Result<Vec<DiskEntryInfo>> {
        let now = SystemTime::now();
        let mut removed = Vec::new();
        for entry in self.entries()? {
            let age = now.duration_since(entry.written_at).unwrap_or_default();
            if age > max_age {
                fs::remove_file(&entry.path)?;
                removed.push(entry);
            }
        }
        Ok(removed)
    }
}

impl CacheTier for DiskCache {
    fn name(&self) -> &str {
        "disk"
    }

    fn get(&self, key: &str) -> io::Result<Option<CacheEntry>> {
        let path = self.path_for(key);
        let metadata = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        let written_at = metadata.modified()?;
        if self.is_stale(written_at, SystemTime::now()) {
            debug!(key = short(key), "Disk cache entry expired");
            return Ok(None);
        }

        let payload = fs::read_to_string(&path)?;
        Ok(Some(CacheEntry {
            payload,
            written_at,
        }))
    }

    fn put(&self, key: &str, entry: &CacheEntry) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let tmp = self.dir.join(format!(
            ".{}.{}-{}.tmp",
            key,
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));
        if let Err(e) = fs::write(&tmp, entry.payload.as_bytes()) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }
        fs::rename(&tmp, self.path_for(key))
    }
}
