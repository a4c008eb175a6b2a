//! Depth correction and XYZ output.
//!
//! A sounding is the raw sounder depth minus the interpolated tide height,
//! i.e. depth relative to the tide datum instead of the instantaneous
//! water surface. Output rows are written as `lat lon sounding`, one per
//! line, sorted by time.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::{BathyError, Result};
use crate::interpolate::interpolate_height;
use crate::models::{Segment, SoundingRow, TideSeries};

/// Source tag embedded in artifact names (WorldTides).
const SOURCE_TAG: &str = "WT";
/// Product tag embedded in artifact names.
const PRODUCT_TAG: &str = "sonde";

/// A generated output file, not yet written anywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct XyzArtifact {
    pub file_name: String,
    pub contents: String,
    pub rows: usize,
    /// Complete points left out because the tide series does not cover them.
    pub out_of_range: usize,
}

impl XyzArtifact {
    /// Write the artifact into `dir`, creating it if needed.
    pub fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(&self.file_name);
        std::fs::write(&path, &self.contents)?;
        Ok(path)
    }
}

/// Uncorrected rows: every point with position, time and depth, by time.
///
/// The `sounding` field carries the raw depth.
pub fn raw_rows(segment: &Segment) -> Vec<SoundingRow> {
    let mut rows: Vec<SoundingRow> = segment
        .points
        .iter()
        .filter_map(|p| {
            let pos = p.position?;
            let depth = p.depth?;
            Some(SoundingRow {
                time: p.time?,
                lat: pos.lat,
                lon: pos.lon,
                depth,
                sounding: depth,
            })
        })
        .collect();
    rows.sort_by_key(|r| r.time);
    rows
}

/// Tide-corrected rows for the points inside the series' range.
///
/// Points outside the interpolable window are left out silently.
pub fn correct_points(segment: &Segment, series: &TideSeries) -> Vec<SoundingRow> {
    raw_rows(segment)
        .into_iter()
        .filter_map(|row| {
            let tide = interpolate_height(series, row.time)?;
            Some(SoundingRow {
                sounding: round_decimeter(row.depth - tide),
                ..row
            })
        })
        .collect()
}

/// Build the XYZ artifact for a segment.
///
/// # Errors
///
/// [`BathyError::NoPointsInTideRange`] when no point can be corrected; an
/// empty file is never produced.
pub fn generate_xyz(segment: &Segment, series: &TideSeries) -> Result<XyzArtifact> {
    let candidates = raw_rows(segment).len();
    let rows = correct_points(segment, series);
    let first = rows
        .first()
        .ok_or(BathyError::NoPointsInTideRange(segment.id))?;

    let file_name = artifact_name(first.time, segment.id);
    let contents: String = rows
        .iter()
        .map(|r| format!("{:.8} {:.8} {:.2}\n", r.lat, r.lon, r.sounding))
        .collect();

    Ok(XyzArtifact {
        file_name,
        contents,
        rows: rows.len(),
        out_of_range: candidates - rows.len(),
    })
}

/// `YYYY-MM-DD_HHhMM_segNN_WT_sonde.xyz`, from the first row's UTC time.
pub fn artifact_name(first: DateTime<Utc>, segment_id: u32) -> String {
    format!(
        "{}_seg{:02}_{}_{}.xyz",
        first.format("%Y-%m-%d_%Hh%M"),
        segment_id,
        SOURCE_TAG,
        PRODUCT_TAG
    )
}

/// Round to one decimal place, halves away from zero.
///
/// Works on the exact binary value of `x`, so 1.45 (stored just below the
/// tie) rounds down to 1.4.
fn round_decimeter(x: f64) -> f64 {
    Decimal::from_f64_retain(x)
        .map(|d| d.round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|d| d.to_f64())
        .unwrap_or(x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Position, TideSample, TrackPoint};
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 42).unwrap()
    }

    fn point(min: i64, depth: f64) -> TrackPoint {
        TrackPoint {
            position: Some(Position {
                lat: 48.3 + min as f64 * 0.001,
                lon: -4.5,
            }),
            time: Some(t0() + Duration::minutes(min)),
            depth: Some(depth),
        }
    }

    fn tide(points: &[(i64, f64)]) -> TideSeries {
        TideSeries::from_samples(
            points
                .iter()
                .map(|&(min, height)| TideSample {
                    time: t0() + Duration::minutes(min),
                    height,
                })
                .collect(),
        )
        .unwrap()
    }

    #[test]
    fn test_two_point_correction() {
        let segment = Segment::new(3, vec![point(10, 15.0), point(0, 12.0)]);
        let series = tide(&[(0, 1.0), (10, 2.0)]);

        let rows = correct_points(&segment, &series);
        let soundings: Vec<f64> = rows.iter().map(|r| r.sounding).collect();
        assert_eq!(soundings, vec![11.0, 13.0]);
        assert!(rows[0].time < rows[1].time);

        let artifact = generate_xyz(&segment, &series).unwrap();
        assert_eq!(artifact.file_name, "2024-06-01_10h00_seg03_WT_sonde.xyz");
        assert_eq!(
            artifact.contents,
            "48.30000000 -4.50000000 11.00\n48.31000000 -4.50000000 13.00\n"
        );
        assert_eq!(artifact.rows, 2);
    }

    #[test]
    fn test_points_outside_range_dropped() {
        let segment = Segment::new(1, vec![point(-5, 10.0), point(5, 10.0), point(30, 10.0)]);
        let series = tide(&[(0, 1.0), (10, 2.0)]);
        let rows = correct_points(&segment, &series);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].sounding, 8.5);

        let artifact = generate_xyz(&segment, &series).unwrap();
        assert_eq!(artifact.rows, 1);
        assert_eq!(artifact.out_of_range, 2);
    }

    #[test]
    fn test_all_points_after_series_is_error() {
        let segment = Segment::new(4, vec![point(20, 10.0), point(25, 11.0)]);
        let series = tide(&[(0, 1.0), (10, 2.0)]);
        let err = generate_xyz(&segment, &series).unwrap_err();
        assert!(matches!(err, BathyError::NoPointsInTideRange(4)));
    }

    #[test]
    fn test_points_missing_fields_skipped() {
        let mut no_depth = point(2, 0.0);
        no_depth.depth = None;
        let mut no_pos = point(3, 5.0);
        no_pos.position = None;
        let segment = Segment::new(1, vec![no_depth, no_pos, point(4, 5.0)]);
        assert_eq!(raw_rows(&segment).len(), 1);
    }

    fn assert_rounds_to(x: f64, expected: f64) {
        let got = round_decimeter(x);
        assert!(
            (got - expected).abs() < 1e-9,
            "{} rounded to {}, expected {}",
            x,
            got,
            expected
        );
    }

    #[test]
    fn test_rounding_half_up() {
        assert_rounds_to(11.25, 11.3);
        assert_rounds_to(11.24, 11.2);
        assert_rounds_to(-0.25, -0.3);
        assert_eq!(round_decimeter(0.0), 0.0);
    }

    #[test]
    fn test_rounding_uses_exact_binary_value() {
        assert_rounds_to(12.35 - 1.0, 11.3);
        assert_rounds_to(1.45, 1.4);
        assert_rounds_to(2.65 - 0.5, 2.1);
        assert_rounds_to(-1.45, -1.4);
    }

    #[test]
    fn test_near_tie_sounding_in_output() {
        let segment = Segment::new(2, vec![point(0, 12.35), point(10, 12.35)]);
        let series = tide(&[(0, 1.0), (10, 1.0)]);
        let artifact = generate_xyz(&segment, &series).unwrap();
        assert!(artifact.contents.starts_with("48.30000000 -4.50000000 11.30\n"));
    }

    #[test]
    fn test_artifact_name_uses_utc_minutes() {
        let t = chrono::DateTime::parse_from_rfc3339("2024-01-02T01:05:59+02:00")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(artifact_name(t, 12), "2024-01-01_23h05_seg12_WT_sonde.xyz");
    }

    #[test]
    fn test_write_to_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let artifact = XyzArtifact {
            file_name: "a.xyz".to_string(),
            contents: "1 2 3\n".to_string(),
            rows: 1,
            out_of_range: 0,
        };
        let path = artifact.write_to(&tmp.path().join("out")).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap(), "1 2 3\n");
    }
}
