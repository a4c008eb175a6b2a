//! # bathy CLI
//!
//! The `bathy` binary lists the segments of a GPX survey track, writes the
//! tide-corrected XYZ file for one segment, and maintains the disk cache of
//! tide-source responses.
//!
//! ## Usage
//!
//! ```bash
//! bathy --config ./config/bathy.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `bathy segments <file>` | List segments with point counts, time extent and median position |
//! | `bathy correct <file> --segment N` | Tide-correct a segment and write its XYZ file |
//! | `bathy cache stats` | Show disk cache entry count, size and stale entries |
//! | `bathy cache purge` | Delete disk cache entries older than a cutoff |
//!
//! Logging goes to stderr and is controlled by `RUST_LOG` (default `info`).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use bathy_tide::cache::MemoryCache;
use bathy_tide::cache_cmd;
use bathy_tide::config::{self, Config};
use bathy_tide::convert::Bathymetry;
use bathy_tide::error::BathyError;
use bathy_tide::models::SegmentSummary;

/// Tide-correct echo-sounder depths recorded in GPX tracks.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. When the default file does not exist, built-in defaults are used.
#[derive(Parser)]
#[command(
    name = "bathy",
    about = "Tide-correct echo-sounder depths recorded in GPX tracks",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

const DEFAULT_CONFIG: &str = "./config/bathy.toml";

#[derive(Subcommand)]
enum Commands {
    /// List the segments of a GPX track.
    ///
    /// Segments without a single complete point (position, time and depth)
    /// are skipped and do not consume a number.
    Segments {
        /// GPX file to read.
        file: PathBuf,

        /// Print summaries as JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// Tide-correct one segment and write its XYZ file.
    ///
    /// Prints the path of the written file.
    Correct {
        /// GPX file to read.
        file: PathBuf,

        /// Segment number, as shown by `bathy segments`.
        #[arg(long)]
        segment: u32,

        /// Output directory. Defaults to `[output].dir` from the config.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Inspect or clean the disk cache.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show entry count, total size and stale entries.
    Stats,

    /// Delete entries older than a cutoff.
    Purge {
        /// Age cutoff in hours. Defaults to `tides.ttl_hours`.
        #[arg(long)]
        older_than_hours: Option<f64>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let cfg = load(&cli.config)?;

    match cli.command {
        Commands::Segments { file, json } => run_segments(&cfg, &file, json),
        Commands::Correct { file, segment, out } => run_correct(&cfg, &file, segment, out),
        Commands::Cache { action } => match action {
            CacheAction::Stats => cache_cmd::run_stats(&cfg),
            CacheAction::Purge { older_than_hours } => {
                cache_cmd::run_purge(&cfg, older_than_hours)
            }
        },
    }
}

/// Load the config file. Only a missing default path falls back to defaults;
/// an explicit path must exist.
fn load(path: &Path) -> Result<Config> {
    if !path.exists() && path == Path::new(DEFAULT_CONFIG) {
        tracing::debug!(path = %path.display(), "No config file, using defaults");
        return Ok(Config::minimal());
    }
    config::load_config(path)
}

fn read_track(file: &Path) -> Result<Vec<u8>> {
    std::fs::read(file).with_context(|| format!("Failed to read track file: {}", file.display()))
}

fn service(cfg: &Config) -> Result<Bathymetry> {
    Bathymetry::from_config(cfg, Arc::new(MemoryCache::new())).map_err(with_hint)
}

/// Attach a "retry later" hint to transient tide-source failures.
fn with_hint(err: BathyError) -> anyhow::Error {
    if err.is_retryable() {
        anyhow::Error::new(err).context("Tide source unavailable, retry later")
    } else {
        anyhow::Error::new(err)
    }
}

fn run_segments(cfg: &Config, file: &Path, json: bool) -> Result<()> {
    let bytes = read_track(file)?;
    let summaries = service(cfg)?.summaries(&bytes).map_err(with_hint)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(());
    }

    print_table(&summaries);
    Ok(())
}

fn print_table(summaries: &[SegmentSummary]) {
    println!(
        "  {:>3}  {:>6}  {:>6}  {:<17}  {:<17}  {:>11}  {:>12}",
        "SEG", "POINTS", "VALID", "START", "END", "LAT", "LON"
    );
    println!("  {}", "-".repeat(84));
    for s in summaries {
        let fmt_time = |t: Option<chrono::DateTime<chrono::Utc>>| {
            t.map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "-".to_string())
        };
        let fmt_coord = |c: Option<f64>| {
            c.map(|c| format!("{:.5}", c))
                .unwrap_or_else(|| "-".to_string())
        };
        println!(
            "  {:>3}  {:>6}  {:>6}  {:<17}  {:<17}  {:>11}  {:>12}",
            s.segment_id,
            s.stats.total,
            s.stats.valid,
            fmt_time(s.stats.start),
            fmt_time(s.stats.end),
            fmt_coord(s.stats.median_lat),
            fmt_coord(s.stats.median_lon),
        );
    }
}

fn run_correct(cfg: &Config, file: &Path, segment: u32, out: Option<PathBuf>) -> Result<()> {
    let bytes = read_track(file)?;
    let service = service(cfg)?;

    let segments = service.segments(&bytes).map_err(with_hint)?;
    let selected = service.select(&segments, segment).map_err(with_hint)?;
    let artifact = service.correct(selected).map_err(with_hint)?;

    let dir = out.unwrap_or_else(|| cfg.output.dir.clone());
    let path = artifact
        .write_to(&dir)
        .with_context(|| format!("Failed to write output to {}", dir.display()))?;
    println!("{}", path.display());
    Ok(())
}
