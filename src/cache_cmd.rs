//! Disk cache maintenance.
//!
//! `bathy cache stats` summarises the disk tier; `bathy cache purge`
//! deletes entries older than a cutoff. Nothing else ever removes cache
//! files: expired entries are only skipped on read.

use std::time::{Duration, SystemTime};

use anyhow::{Context, Result};

use crate::cache::disk::DiskEntryInfo;
use crate::cache::DiskCache;
use crate::config::Config;

/// Aggregate figures for one cache directory.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
    /// Entries past the TTL; always 0 when no TTL is configured.
    pub stale: usize,
    pub oldest: Option<SystemTime>,
    pub newest: Option<SystemTime>,
}

impl CacheStats {
    pub fn collect(disk: &DiskCache, now: SystemTime) -> std::io::Result<Self> {
        let entries = disk.entries()?;
        Ok(Self::from_entries(disk, &entries, now))
    }

    fn from_entries(disk: &DiskCache, entries: &[DiskEntryInfo], now: SystemTime) -> Self {
        Self {
            entries: entries.len(),
            total_bytes: entries.iter().map(|e| e.size).sum(),
            stale: entries
                .iter()
                .filter(|e| disk.is_stale(e.written_at, now))
                .count(),
            oldest: entries.iter().map(|e| e.written_at).min(),
            newest: entries.iter().map(|e| e.written_at).max(),
        }
    }
}

fn require_disk(config: &Config) -> Result<DiskCache> {
    config
        .disk_cache()
        .context("No disk cache configured (set [cache].dir in the config file)")
}

/// Run `bathy cache stats`.
pub fn run_stats(config: &Config) -> Result<()> {
    let disk = require_disk(config)?;
    let now = SystemTime::now();
    let stats = CacheStats::collect(&disk, now)
        .with_context(|| format!("Failed to read cache directory: {}", disk.dir().display()))?;

    println!("Tide Cache Stats");
    println!("================");
    println!();
    println!("  Directory:   {}", disk.dir().display());
    println!(
        "  TTL:         {}",
        match disk.ttl() {
            Some(ttl) => format!("{:.1} h", ttl.as_secs_f64() / 3600.0),
            None => "never expires".to_string(),
        }
    );
    println!();
    println!("  Entries:     {}", stats.entries);
    println!("  Size:        {}", format_bytes(stats.total_bytes));
    println!("  Stale:       {}", stats.stale);
    if let (Some(oldest), Some(newest)) = (stats.oldest, stats.newest) {
        println!("  Oldest:      {}", format_age(oldest, now));
        println!("  Newest:      {}", format_age(newest, now));
    }
    println!();
    Ok(())
}

/// Cutoff for a purge: the explicit argument, else the configured TTL.
pub fn purge_cutoff(older_than_hours: Option<f64>, ttl: Option<Duration>) -> Result<Duration> {
    match older_than_hours {
        Some(h) if h >= 0.0 => match Duration::try_from_secs_f64(h * 3600.0) {
            Ok(cutoff) => Ok(cutoff),
            Err(_) => anyhow::bail!("--older-than-hours is too large, got {}", h),
        },
        Some(h) => anyhow::bail!("--older-than-hours must be a non-negative number, got {}", h),
        None => ttl.context(
            "No cutoff given and no TTL configured; pass --older-than-hours or set tides.ttl_hours",
        ),
    }
}

/// Run `bathy cache purge`.
pub fn run_purge(config: &Config, older_than_hours: Option<f64>) -> Result<()> {
    let disk = require_disk(config)?;
    let cutoff = purge_cutoff(older_than_hours, disk.ttl())?;

    let removed = disk
        .purge_older_than(cutoff)
        .with_context(|| format!("Failed to purge cache directory: {}", disk.dir().display()))?;
    let freed: u64 = removed.iter().map(|e| e.size).sum();

    tracing::info!(
        removed = removed.len(),
        cutoff_hours = cutoff.as_secs_f64() / 3600.0,
        "Cache purge complete"
    );
    println!(
        "Removed {} entr{} ({}) from {}",
        removed.len(),
        if removed.len() == 1 { "y" } else { "ies" },
        format_bytes(freed),
        disk.dir().display()
    );
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a write time relative to `now` (e.g. "3 hours ago").
fn format_age(written_at: SystemTime, now: SystemTime) -> String {
    let delta = now.duration_since(written_at).unwrap_or_default().as_secs();

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheEntry, CacheTier};
    use tempfile::TempDir;

    #[test]
    fn test_stats_counts_stale_under_ttl() {
        let tmp = TempDir::new().unwrap();
        let disk = DiskCache::new(tmp.path(), Some(1.0));
        disk.put("a", &CacheEntry::new("1234".to_string())).unwrap();
        disk.put("b", &CacheEntry::new("56".to_string())).unwrap();

        let now = SystemTime::now();
        let stats = CacheStats::collect(&disk, now).unwrap();
        assert_eq!(stats.entries, 2);
        assert_eq!(stats.total_bytes, 6);
        assert_eq!(stats.stale, 0);

        let later = now + Duration::from_secs(2 * 3600);
        let stats = CacheStats::collect(&disk, later).unwrap();
        assert_eq!(stats.stale, 2);
    }

    #[test]
    fn test_stats_empty_dir() {
        let tmp = TempDir::new().unwrap();
        let disk = DiskCache::new(tmp.path().join("missing"), None);
        let stats = CacheStats::collect(&disk, SystemTime::now()).unwrap();
        assert_eq!(stats.entries, 0);
        assert!(stats.oldest.is_none());
    }

    #[test]
    fn test_purge_cutoff() {
        assert_eq!(
            purge_cutoff(Some(2.0), None).unwrap(),
            Duration::from_secs(7200)
        );
        assert_eq!(
            purge_cutoff(None, Some(Duration::from_secs(60))).unwrap(),
            Duration::from_secs(60)
        );
        assert!(purge_cutoff(None, None).is_err());
        assert!(purge_cutoff(Some(-1.0), None).is_err());
        assert!(purge_cutoff(Some(f64::NAN), None).is_err());
    }

    #[test]
    fn test_purge_cutoff_too_large() {
        let err = purge_cutoff(Some(1e20), None).unwrap_err();
        assert!(err.to_string().contains("too large"), "{}", err);
        assert!(purge_cutoff(Some(f64::INFINITY), None).is_err());
    }

    #[test]
    fn test_format_helpers() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        let now = SystemTime::now();
        assert_eq!(format_age(now, now), "just now");
        assert_eq!(format_age(now - Duration::from_secs(7200), now), "2 hours ago");
        assert_eq!(format_age(now - Duration::from_secs(86400), now), "1 day ago");
    }

    #[test]
    fn test_commands_require_cache_dir() {
        let config = Config::minimal();
        assert!(run_stats(&config).is_err());
        assert!(run_purge(&config, Some(1.0)).is_err());
    }
}
