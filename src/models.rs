//! Core data models used throughout the correction pipeline.
//!
//! These types represent the track points, segments, tide samples, and
//! corrected rows that flow from GPX parsing to XYZ output.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Position {
    pub lat: f64,
    pub lon: f64,
}

/// A single GPX track point.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackPoint {
    pub position: Option<Position>,
    pub time: Option<DateTime<Utc>>,
    /// Raw sounder depth in meters, from the `<extensions>` block.
    pub depth: Option<f64>,
}

impl TrackPoint {
    /// A point is valid when it can be tide-corrected.
    pub fn is_valid(&self) -> bool {
        self.position.is_some() && self.time.is_some() && self.depth.is_some()
    }
}

/// Statistics derived once from a segment's points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentStats {
    pub total: usize,
    pub valid: usize,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub median_lat: Option<f64>,
    pub median_lon: Option<f64>,
}

impl SegmentStats {
    pub fn compute(points: &[TrackPoint]) -> Self {
        let times: Vec<DateTime<Utc>> = points.iter().filter_map(|p| p.time).collect();
        let lats: Vec<f64> = points
            .iter()
            .filter_map(|p| p.position.map(|pos| pos.lat))
            .collect();
        let lons: Vec<f64> = points
            .iter()
            .filter_map(|p| p.position.map(|pos| pos.lon))
            .collect();

        Self {
            total: points.len(),
            valid: points.iter().filter(|p| p.is_valid()).count(),
            start: times.iter().min().copied(),
            end: times.iter().max().copied(),
            median_lat: median(lats),
            median_lon: median(lons),
        }
    }
}

fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// An ordered run of track points, numbered from 1 in document order.
#[derive(Debug, Clone)]
pub struct Segment {
    pub id: u32,
    pub points: Vec<TrackPoint>,
    pub stats: SegmentStats,
}

impl Segment {
    pub fn new(id: u32, points: Vec<TrackPoint>) -> Self {
        let stats = SegmentStats::compute(&points);
        Self { id, points, stats }
    }

    /// Median position, if the segment has any positioned points.
    pub fn median_position(&self) -> Option<Position> {
        match (self.stats.median_lat, self.stats.median_lon) {
            (Some(lat), Some(lon)) => Some(Position { lat, lon }),
            _ => None,
        }
    }

    pub fn summary(&self) -> SegmentSummary {
        SegmentSummary {
            segment_id: self.id,
            stats: self.stats.clone(),
        }
    }
}

/// Serializable segment description for a selection UI.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentSummary {
    pub segment_id: u32,
    #[serde(flatten)]
    pub stats: SegmentStats,
}

/// One tide height observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TideSample {
    pub time: DateTime<Utc>,
    /// Height above the query datum, in meters.
    pub height: f64,
}

/// A time-sorted tide series with at least two samples.
///
/// Built through [`crate::tides::parse_heights`] or [`TideSeries::from_samples`].
#[derive(Debug, Clone, PartialEq)]
pub struct TideSeries {
    samples: Vec<TideSample>,
}

impl TideSeries {
    /// Sort samples by time (stable, duplicates kept) and wrap them.
    ///
    /// Returns the sample count as the error when fewer than two remain.
    pub fn from_samples(mut samples: Vec<TideSample>) -> Result<Self, usize> {
        if samples.len() < 2 {
            return Err(samples.len());
        }
        samples.sort_by_key(|s| s.time);
        Ok(Self { samples })
    }

    pub fn samples(&self) -> &[TideSample] {
        &self.samples
    }

    pub fn first_time(&self) -> DateTime<Utc> {
        self.samples[0].time
    }

    pub fn last_time(&self) -> DateTime<Utc> {
        self.samples[self.samples.len() - 1].time
    }
}

/// A tide-corrected output row.
#[derive(Debug, Clone, PartialEq)]
pub struct SoundingRow {
    pub time: DateTime<Utc>,
    pub lat: f64,
    pub lon: f64,
    pub depth: f64,
    pub sounding: f64,
}
