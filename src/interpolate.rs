//! Linear interpolation of tide height.

use chrono::{DateTime, Utc};

use crate::models::TideSeries;

/// Tide height at `t`, or `None` when `t` lies outside the series.
///
/// Heights are never extrapolated. At a sample's exact timestamp the
/// sample's own height is returned, including for the last sample. When
/// two samples share a timestamp the bracketing interval has zero length
/// and the earlier sample's height is used.
pub fn interpolate_height(series: &TideSeries, t: DateTime<Utc>) -> Option<f64> {
    let samples = series.samples();
    if t < series.first_time() || t > series.last_time() {
        return None;
    }

    // First index whose time is strictly after `t`.
    let idx = samples.partition_point(|s| s.time <= t);
    if idx == samples.len() {
        // `t` equals the last timestamp.
        let last_time = series.last_time();
        let first_at_last = samples.partition_point(|s| s.time < last_time);
        return Some(samples[first_at_last].height);
    }

    let (a, b) = (&samples[idx - 1], &samples[idx]);
    let span = (b.time - a.time).num_milliseconds() as f64;
    if span <= 0.0 {
        return Some(a.height);
    }
    let ratio = (t - a.time).num_milliseconds() as f64 / span;
    Some(a.height + ratio * (b.height - a.height))
}
