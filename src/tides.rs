//! Tide-height acquisition.
//!
//! [`TideClient`] resolves a [`TideQuery`] into a [`TideSeries`]:
//!
//! 1. check the access credential (before any cache or network work);
//! 2. normalise the query and derive its cache key;
//! 3. consult the [`TideCache`] (memory, then disk);
//! 4. on a miss, issue exactly one request through a [`TideSource`],
//!    validate the payload, and write it to both cache tiers.
//!
//! [`WorldTidesSource`] is the HTTP source for the WorldTides v3 API. The
//! client never retries; transport failures and non-success statuses come
//! back as retryable [`BathyError`]s for the caller to act on.
//!
//! # Payload format
//!
//! ```json
//! {"status": 200, "heights": [{"dt": 1717236000, "date": "2024-06-01T10:00+0000", "height": 1.02}]}
//! ```
//!
//! Each sample's timestamp is read from the first field that parses, in
//! order: `dt` (epoch seconds), `time` (epoch seconds, or milliseconds above
//! 10^12), `date` (ISO-8601-like string). Samples without a usable
//! timestamp or height are skipped.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::cache::{short, CacheEntry, TideCache};
use crate::cache_key::{NormalizedQuery, TideQuery};
use crate::error::{BathyError, Result};
use crate::models::{TideSample, TideSeries};
use crate::timestamp;

pub const DEFAULT_ENDPOINT: &str = "https://www.worldtides.info/api/v3";
pub const DEFAULT_STEP_MINUTES: u32 = 10;
pub const DEFAULT_DATUM: &str = "CD";
pub const DEFAULT_TIMEOUT_SECS: u64 = 20;

/// Epoch values above this are milliseconds.
const MILLIS_THRESHOLD: f64 = 1e12;
/// Longest upstream error body kept in an error message.
const MAX_ERROR_BODY: usize = 300;

/// Query parameters shared by every request of a client.
#[derive(Debug, Clone, PartialEq)]
pub struct TideSettings {
    pub endpoint: String,
    pub step_minutes: u32,
    pub datum: String,
    pub timeout: Duration,
}

impl Default for TideSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            step_minutes: DEFAULT_STEP_MINUTES,
            datum: DEFAULT_DATUM.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// One blocking request to an external tide source.
///
/// Returns the raw response body on success. Implementations must not
/// retry.
pub trait TideSource: Send + Sync {
    fn fetch(&self, query: &NormalizedQuery, credential: &str) -> Result<String>;
}

/// HTTP source for the WorldTides v3 `heights` endpoint.
pub struct WorldTidesSource {
    client: reqwest::blocking::Client,
}

impl WorldTidesSource {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("bathy-tide/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }
}

/// Build the request URL for a normalised query.
pub fn request_url(query: &NormalizedQuery, credential: &str) -> Result<reqwest::Url> {
    let params = [
        ("heights", String::new()),
        ("lat", format!("{:.6}", query.lat)),
        ("lon", format!("{:.6}", query.lon)),
        ("start", query.start.to_string()),
        ("length", query.length().to_string()),
        ("step", query.step.to_string()),
        ("datum", query.datum.clone()),
        ("key", credential.to_string()),
    ];
    reqwest::Url::parse_with_params(&query.url, &params)
        .map_err(|e| BathyError::Transport(format!("invalid endpoint '{}': {}", query.url, e)))
}

impl TideSource for WorldTidesSource {
    fn fetch(&self, query: &NormalizedQuery, credential: &str) -> Result<String> {
        let url = request_url(query, credential)?;
        debug!(
            url = %url.as_str().replace(credential, "***"),
            "Requesting tide heights"
        );

        let response = self.client.get(url).send()?;
        let status = response.status();
        let body = response.text()?;

        if !status.is_success() {
            warn!(status = status.as_u16(), "Tide source returned an error status");
            return Err(BathyError::Upstream {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }
        Ok(body)
    }
}

/// Parse a raw tide-source payload into a sorted series.
///
/// # Errors
///
/// - [`BathyError::InvalidResponse`] when the payload is not JSON, or
///   carries an `error` field and no `heights`.
/// - [`BathyError::InsufficientTideData`] when fewer than two samples parse.
pub fn parse_heights(payload: &str) -> Result<TideSeries> {
    let json: Value = serde_json::from_str(payload)
        .map_err(|e| BathyError::InvalidResponse(format!("payload is not JSON: {}", e)))?;

    let Some(items) = json.get("heights").and_then(Value::as_array) else {
        if let Some(err) = json.get("error").and_then(Value::as_str) {
            return Err(BathyError::InvalidResponse(err.to_string()));
        }
        return Err(BathyError::InsufficientTideData(0));
    };

    let samples: Vec<TideSample> = items.iter().filter_map(parse_sample).collect();
    if samples.len() < items.len() {
        debug!(
            skipped = items.len() - samples.len(),
            kept = samples.len(),
            "Skipped unparseable tide samples"
        );
    }
    TideSeries::from_samples(samples).map_err(BathyError::InsufficientTideData)
}

type TimeParser = fn(&Value) -> Option<DateTime<Utc>>;

/// Timestamp fields in priority order.
const TIME_FIELDS: &[(&str, TimeParser)] = &[
    ("dt", epoch_seconds),
    ("time", epoch_auto),
    ("date", iso_string),
];

fn parse_sample(item: &Value) -> Option<TideSample> {
    let time = TIME_FIELDS
        .iter()
        .find_map(|(field, parse)| item.get(*field).and_then(parse))?;
    let height = number(item.get("height")?)?;
    Some(TideSample { time, height })
}

fn number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

fn epoch_seconds(v: &Value) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp(number(v)?.trunc() as i64, 0)
}

fn epoch_auto(v: &Value) -> Option<DateTime<Utc>> {
    let n = number(v)?;
    if n.abs() > MILLIS_THRESHOLD {
        DateTime::from_timestamp_millis(n.trunc() as i64)
    } else {
        DateTime::from_timestamp(n.trunc() as i64, 0)
    }
}

fn iso_string(v: &Value) -> Option<DateTime<Utc>> {
    timestamp::parse_iso(v.as_str()?)
}

/// Cache-aware tide series provider.
pub struct TideClient {
    settings: TideSettings,
    credential: Option<String>,
    credential_hint: String,
    cache: TideCache,
    source: Box<dyn TideSource>,
}

impl TideClient {
    /// `credential_hint` names where the credential comes from and is
    /// shown when it is missing.
    pub fn new(
        settings: TideSettings,
        credential: Option<String>,
        credential_hint: impl Into<String>,
        cache: TideCache,
        source: Box<dyn TideSource>,
    ) -> Self {
        Self {
            settings,
            credential,
            credential_hint: credential_hint.into(),
            cache,
            source,
        }
    }

    pub fn settings(&self) -> &TideSettings {
        &self.settings
    }

    pub fn cache(&self) -> &TideCache {
        &self.cache
    }

    /// Build a query over `[start, end]` with this client's step and datum.
    pub fn query(
        &self,
        lat: f64,
        lon: f64,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> TideQuery {
        TideQuery {
            lat,
            lon,
            start,
            end,
            step_minutes: self.settings.step_minutes,
            datum: self.settings.datum.clone(),
        }
    }

    /// Resolve a query to a validated tide series.
    ///
    /// # Errors
    ///
    /// - [`BathyError::MissingCredential`] before any lookup when no
    ///   credential is configured.
    /// - Source errors from [`TideSource::fetch`] (retryable).
    /// - Payload errors from [`parse_heights`].
    pub fn fetch_series(&self, query: &TideQuery) -> Result<TideSeries> {
        let credential = self
            .credential
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| BathyError::MissingCredential(self.credential_hint.clone()))?;

        let normalized = query.normalize(&self.settings.endpoint);
        let key = normalized.cache_key();

        if let Some((entry, hit)) = self.cache.lookup(&key) {
            match parse_heights(&entry.payload) {
                Ok(series) => return Ok(series),
                Err(e) => warn!(
                    key = short(&key),
                    tier = ?hit,
                    error = %e,
                    "Cached tide payload unusable, fetching again"
                ),
            }
        }

        info!(
            key = short(&key),
            lat = normalized.lat,
            lon = normalized.lon,
            start = normalized.start,
            length = normalized.length(),
            "Tide cache miss, requesting tide source"
        );
        let payload = self.source.fetch(&normalized, credential)?;
        let series = parse_heights(&payload)?;
        self.cache.store(&key, &CacheEntry::new(payload));
        Ok(series)
    }
}
