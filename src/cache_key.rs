//! Deterministic cache identities for tide queries.
//!
//! A [`TideQuery`] is normalised before hashing so that logically equal
//! requests share one cache entry:
//!
//! - position rounded to [`COORD_DECIMALS`] decimal places;
//! - window start floored and window end ceiled to multiples of the step,
//!   in UTC epoch seconds;
//! - datum upper-cased, endpoint stripped of trailing `?`, `&` and `/`.
//!
//! The normalised fields are serialised as compact JSON in a fixed field
//! order and hashed with SHA-256.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// Decimal places kept on latitude and longitude.
pub const COORD_DECIMALS: i32 = 5;

/// A tide-height request before normalisation.
#[derive(Debug, Clone, PartialEq)]
pub struct TideQuery {
    pub lat: f64,
    pub lon: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub step_minutes: u32,
    pub datum: String,
}

/// The canonical form of a [`TideQuery`] against one endpoint.
///
/// Field declaration order is the serialisation order and must stay
/// alphabetical.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedQuery {
    pub datum: String,
    pub end: i64,
    pub lat: f64,
    pub lon: f64,
    pub start: i64,
    pub step: i64,
    pub url: String,
}

impl TideQuery {
    pub fn normalize(&self, endpoint: &str) -> NormalizedQuery {
        let step = i64::from(self.step_minutes.max(1)) * 60;

        let start = align_down(self.start.timestamp(), step);
        // A fractional second still extends the window.
        let end_secs = self.end.timestamp() + i64::from(self.end.timestamp_subsec_nanos() > 0);
        let end = align_up(end_secs, step);

        NormalizedQuery {
            datum: self.datum.trim().to_uppercase(),
            end,
            lat: round_coord(self.lat),
            lon: round_coord(self.lon),
            start,
            step,
            url: normalize_endpoint(endpoint),
        }
    }
}

impl NormalizedQuery {
    /// SHA-256 hex digest of the compact JSON form.
    pub fn cache_key(&self) -> String {
        let blob = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(blob.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Window length in seconds, never negative.
    pub fn length(&self) -> i64 {
        (self.end - self.start).max(0)
    }
}

pub fn normalize_endpoint(endpoint: &str) -> String {
    endpoint
        .trim()
        .trim_end_matches(['?', '&', '/'])
        .to_string()
}

fn round_coord(v: f64) -> f64 {
    let factor = 10f64.powi(COORD_DECIMALS);
    let rounded = (v * factor).round() / factor;
    // -0.0 and 0.0 serialise differently.
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

fn align_down(ts: i64, step: i64) -> i64 {
    ts - ts.rem_euclid(step)
}

fn align_up(ts: i64, step: i64) -> i64 {
    let rem = ts.rem_euclid(step);
    if rem == 0 {
        ts
    } else {
        ts + (step - rem)
    }
}
