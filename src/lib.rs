//! # bathy-tide
//!
//! Tide correction for echo-sounder tracks.
//!
//! A GPX track recorded by a survey boat carries positions, timestamps and
//! raw sounder depths. Those depths are measured from the instantaneous
//! water surface; this crate subtracts the tide height at each point's time
//! so the result is relative to a fixed chart datum, and writes one XYZ
//! file per track segment.
//!
//! ## Pipeline
//!
//! ```text
//! ┌───────────┐   ┌────────────┐   ┌──────────────┐   ┌──────────┐
//! │ GPX bytes │──▶│  Segments  │──▶│ Tide series  │──▶│   XYZ    │
//! │           │   │ + stats    │   │ (cached)     │   │ artifact │
//! └───────────┘   └────────────┘   └──────┬───────┘   └──────────┘
//!                                         │
//!                             ┌───────────┼───────────┐
//!                             ▼           ▼           ▼
//!                         ┌────────┐ ┌────────┐ ┌───────────┐
//!                         │ memory │ │  disk  │ │ WorldTides│
//!                         └────────┘ └────────┘ └───────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export WORLDTIDES_API_KEY=...
//! bathy segments survey.gpx                 # list segments
//! bathy correct survey.gpx --segment 2      # write the XYZ file
//! bathy cache stats                         # inspect the disk cache
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`error`] | Error taxonomy |
//! | [`models`] | Core data types |
//! | [`timestamp`] | Lenient ISO-8601 parsing |
//! | [`track`] | GPX parsing into segments |
//! | [`cache_key`] | Query normalisation and cache keys |
//! | [`cache`] | Memory and disk cache tiers |
//! | [`tides`] | Tide source client |
//! | [`interpolate`] | Tide height interpolation |
//! | [`sounding`] | Depth correction and XYZ output |
//! | [`convert`] | Caller-facing correction service |
//! | [`cache_cmd`] | Disk cache maintenance commands |

pub mod cache;
pub mod cache_cmd;
pub mod cache_key;
pub mod config;
pub mod convert;
pub mod error;
pub mod interpolate;
pub mod models;
pub mod sounding;
pub mod tides;
pub mod timestamp;
pub mod track;
