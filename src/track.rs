//! GPX track decomposition.
//!
//! Streams a GPX document with `quick-xml` and splits it into numbered
//! [`Segment`]s. Element matching uses local names, so any namespace
//! prefix (`gpx:trkpt`, `gpxtpx:depth`) is accepted.
//!
//! Grouping rules:
//!
//! - every `<trk>` in the document is visited, in order;
//! - each `<trkseg>` becomes one segment, made of its direct `<trkpt>`
//!   children, or of its nested ones when it has no direct children;
//! - a `<trk>` without any `<trkseg>` contributes a single segment holding
//!   all of its descendant `<trkpt>` elements.
//!
//! Segments with no valid point are dropped, and numbering only counts the
//! segments that are kept.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::debug;

use crate::error::{BathyError, Result};
use crate::models::{Position, Segment, TrackPoint};
use crate::timestamp;

/// Parse a GPX document into its valid segments.
///
/// # Errors
///
/// - [`BathyError::MalformedTrack`] for unparsable markup, unclosed
///   elements, or a document without a root element.
/// - [`BathyError::NoTrackData`] when the document has no `<trk>`.
/// - [`BathyError::NoValidSegment`] when every segment lacks valid points.
pub fn parse_track(bytes: &[u8]) -> Result<Vec<Segment>> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut state = ParseState::default();
    let mut buf = Vec::new();
    loop {
        let event = match reader.read_event_into(&mut buf) {
            Ok(event) => event,
            Err(e) => {
                return Err(BathyError::MalformedTrack(format!(
                    "{} (near byte {})",
                    e,
                    reader.buffer_position()
                )))
            }
        };
        match event {
            Event::Start(e) => state.open(&e)?,
            Event::Empty(e) => {
                state.open(&e)?;
                state.close();
            }
            Event::End(_) => state.close(),
            Event::Text(t) if state.capture.is_some() => {
                let text = t
                    .unescape()
                    .map_err(|e| BathyError::MalformedTrack(e.to_string()))?;
                state.push_text(&text);
            }
            Event::CData(c) if state.capture.is_some() => {
                state.push_text(&String::from_utf8_lossy(&c));
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    state.finish()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    DirectTime,
    NestedTime,
    Depth,
}

struct Capture {
    field: Field,
    level: usize,
    text: String,
}

struct PointBuilder {
    level: usize,
    position: Option<Position>,
    direct_time: Option<String>,
    nested_time: Option<String>,
    depth: Option<String>,
}

impl PointBuilder {
    fn build(self) -> TrackPoint {
        let time = self
            .direct_time
            .or(self.nested_time)
            .and_then(|t| timestamp::parse_iso(&t));
        let depth = self
            .depth
            .and_then(|d| d.trim().parse::<f64>().ok())
            .filter(|d| d.is_finite());
        TrackPoint {
            position: self.position,
            time,
            depth,
        }
    }
}

struct SegmentBuilder {
    level: usize,
    direct: Vec<TrackPoint>,
    nested: Vec<TrackPoint>,
}

struct TrackBuilder {
    level: usize,
    segments: Vec<Vec<TrackPoint>>,
    loose: Vec<TrackPoint>,
    has_segments: bool,
}

#[derive(Default)]
struct ParseState {
    stack: Vec<Vec<u8>>,
    saw_root: bool,
    tracks_seen: usize,
    track: Option<TrackBuilder>,
    segment: Option<SegmentBuilder>,
    point: Option<PointBuilder>,
    capture: Option<Capture>,
    candidates_seen: usize,
    segments: Vec<Segment>,
}

impl ParseState {
    fn open(&mut self, e: &BytesStart) -> Result<()> {
        let name = e.local_name().as_ref().to_vec();
        let level = self.stack.len();
        self.saw_root = true;

        match name.as_slice() {
            b"trk" if self.track.is_none() => {
                self.tracks_seen += 1;
                self.track = Some(TrackBuilder {
                    level,
                    segments: Vec::new(),
                    loose: Vec::new(),
                    has_segments: false,
                });
            }
            b"trkseg" if self.track.is_some() && self.segment.is_none() => {
                self.segment = Some(SegmentBuilder {
                    level,
                    direct: Vec::new(),
                    nested: Vec::new(),
                });
            }
            b"trkpt" if self.track.is_some() && self.point.is_none() => {
                self.point = Some(PointBuilder {
                    level,
                    position: read_position(e)?,
                    direct_time: None,
                    nested_time: None,
                    depth: None,
                });
            }
            b"time" if self.capture.is_none() => {
                if let Some(p) = &self.point {
                    let field = if level == p.level + 1 && p.direct_time.is_none() {
                        Some(Field::DirectTime)
                    } else if level > p.level + 1 && p.nested_time.is_none() {
                        Some(Field::NestedTime)
                    } else {
                        None
                    };
                    self.capture = field.map(|field| Capture {
                        field,
                        level,
                        text: String::new(),
                    });
                }
            }
            b"depth" if self.capture.is_none() => {
                if let Some(p) = &self.point {
                    let in_extensions = self.stack[p.level + 1..]
                        .iter()
                        .any(|n| n.as_slice() == b"extensions");
                    if in_extensions && p.depth.is_none() {
                        self.capture = Some(Capture {
                            field: Field::Depth,
                            level,
                            text: String::new(),
                        });
                    }
                }
            }
            _ => {}
        }

        self.stack.push(name);
        Ok(())
    }

    fn push_text(&mut self, text: &str) {
        if let Some(c) = &mut self.capture {
            c.text.push_str(text);
        }
    }

    fn close(&mut self) {
        if self.stack.pop().is_none() {
            return;
        }
        let level = self.stack.len();

        if self.capture.as_ref().is_some_and(|c| c.level == level) {
            if let (Some(c), Some(p)) = (self.capture.take(), self.point.as_mut()) {
                let text = c.text.trim().to_string();
                if !text.is_empty() {
                    match c.field {
                        Field::DirectTime => p.direct_time = Some(text),
                        Field::NestedTime => p.nested_time = Some(text),
                        Field::Depth => p.depth = Some(text),
                    }
                }
            }
            return;
        }

        if self.point.as_ref().is_some_and(|p| p.level == level) {
            if let Some(p) = self.point.take() {
                let direct_child = p.level > 0
                    && self.segment.as_ref().is_some_and(|s| s.level == p.level - 1);
                let point = p.build();
                if let Some(seg) = self.segment.as_mut() {
                    if direct_child {
                        seg.direct.push(point);
                    } else {
                        seg.nested.push(point);
                    }
                } else if let Some(trk) = self.track.as_mut() {
                    trk.loose.push(point);
                }
            }
            return;
        }

        if self.segment.as_ref().is_some_and(|s| s.level == level) {
            if let (Some(seg), Some(trk)) = (self.segment.take(), self.track.as_mut()) {
                let points = if seg.direct.is_empty() {
                    seg.nested
                } else {
                    seg.direct
                };
                trk.segments.push(points);
                trk.has_segments = true;
            }
            return;
        }

        if self.track.as_ref().is_some_and(|t| t.level == level) {
            if let Some(trk) = self.track.take() {
                let groups = if trk.has_segments {
                    trk.segments
                } else {
                    vec![trk.loose]
                };
                for points in groups {
                    self.emit(points);
                }
            }
        }
    }

    fn emit(&mut self, points: Vec<TrackPoint>) {
        self.candidates_seen += 1;
        let id = self.segments.len() as u32 + 1;
        let segment = Segment::new(id, points);
        if segment.stats.valid == 0 {
            debug!(
                track = self.tracks_seen,
                candidate = self.candidates_seen,
                total = segment.stats.total,
                "Segment has no valid points, skipped"
            );
            return;
        }
        self.segments.push(segment);
    }

    fn finish(self) -> Result<Vec<Segment>> {
        if let Some(open) = self.stack.last() {
            return Err(BathyError::MalformedTrack(format!(
                "unexpected end of document inside <{}>",
                String::from_utf8_lossy(open)
            )));
        }
        if !self.saw_root {
            return Err(BathyError::MalformedTrack(
                "document has no root element".to_string(),
            ));
        }
        if self.tracks_seen == 0 {
            return Err(BathyError::NoTrackData);
        }
        if self.segments.is_empty() {
            return Err(BathyError::NoValidSegment);
        }
        debug!(
            tracks = self.tracks_seen,
            candidates = self.candidates_seen,
            kept = self.segments.len(),
            "GPX decomposed"
        );
        Ok(self.segments)
    }
}

fn read_position(e: &BytesStart) -> Result<Option<Position>> {
    let mut lat = None;
    let mut lon = None;
    for attr in e.attributes() {
        let attr = attr.map_err(|e| BathyError::MalformedTrack(e.to_string()))?;
        let value = attr
            .unescape_value()
            .map_err(|e| BathyError::MalformedTrack(e.to_string()))?;
        let parsed = value.trim().parse::<f64>().ok().filter(|v| v.is_finite());
        match attr.key.local_name().as_ref() {
            b"lat" => lat = parsed,
            b"lon" => lon = parsed,
            _ => {}
        }
    }
    Ok(match (lat, lon) {
        (Some(lat), Some(lon)) => Some(Position { lat, lon }),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use chrono::{TimeZone, Utc};

    fn trkpt(lat: f64, lon: f64, time: &str, depth: Option<f64>) -> String {
        let ext = depth
            .map(|d| format!("<extensions><gpxtpx:depth>{}</gpxtpx:depth></extensions>", d))
            .unwrap_or_default();
        format!(
            r#"<trkpt lat="{}" lon="{}"><time>{}</time>{}</trkpt>"#,
            lat, lon, time, ext
        )
    }

    fn gpx(body: &str) -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="test" xmlns="http://www.topografix.com/GPX/1/1"
     xmlns:gpxtpx="http://www.garmin.com/xmlschemas/TrackPointExtension/v1">
{}
</gpx>"#,
            body
        )
    }

    #[test]
    fn test_segments_numbered_across_tracks() {
        let doc = gpx(&format!(
            "<trk><trkseg>{}</trkseg><trkseg>{}</trkseg></trk><trk><trkseg>{}</trkseg></trk>",
            trkpt(48.0, -4.0, "2024-06-01T10:00:00Z", Some(5.0)),
            trkpt(48.1, -4.1, "2024-06-01T11:00:00Z", Some(6.0)),
            trkpt(48.2, -4.2, "2024-06-01T12:00:00Z", Some(7.0)),
        ));
        let segments = parse_track(doc.as_bytes()).unwrap();
        let ids: Vec<u32> = segments.iter().map(|s| s.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(segments[2].points[0].depth, Some(7.0));
    }

    #[test]
    fn test_invalid_segments_skipped_without_gaps() {
        let doc = gpx(&format!(
            "<trk><trkseg>{}</trkseg><trkseg>{}</trkseg><trkseg>{}</trkseg></trk>",
            trkpt(48.0, -4.0, "2024-06-01T10:00:00Z", Some(5.0)),
            trkpt(48.1, -4.1, "2024-06-01T11:00:00Z", None),
            trkpt(48.2, -4.2, "2024-06-01T12:00:00Z", Some(7.0)),
        ));
        let segments = parse_track(doc.as_bytes()).unwrap();
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].id, 1);
        assert_eq!(segments[1].id, 2);
        assert_eq!(segments[1].points[0].depth, Some(7.0));
    }

    #[test]
    fn test_track_without_trkseg_is_one_segment() {
        let doc = gpx(&format!(
            "<trk><name>flat</name>{}{}</trk>",
            trkpt(48.0, -4.0, "2024-06-01T10:00:00Z", Some(5.0)),
            trkpt(48.1, -4.1, "2024-06-01T10:10:00Z", Some(5.5)),
        ));
        let segments = parse_track(doc.as_bytes()).unwrap();
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].stats.total, 2);
        assert_eq!(segments[0].stats.valid, 2);
    }

    #[test]
    fn test_stats_and_file_order() {
        let doc = gpx(&format!(
            "<trk><trkseg>{}{}{}</trkseg></trk>",
            trkpt(48.2, -4.2, "2024-06-01T10:20:00Z", Some(7.0)),
            trkpt(48.0, -4.0, "2024-06-01T10:00:00Z", Some(5.0)),
            r#"<trkpt lat="48.1" lon="-4.1"></trkpt>"#,
        ));
        let segments = parse_track(doc.as_bytes()).unwrap();
        let seg = &segments[0];
        assert_eq!(seg.stats.total, 3);
        assert_eq!(seg.stats.valid, 2);
        assert_eq!(seg.stats.median_lat, Some(48.1));
        assert_eq!(
            seg.stats.start,
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap())
        );
        assert_eq!(
            seg.stats.end,
            Some(Utc.with_ymd_and_hms(2024, 6, 1, 10, 20, 0).unwrap())
        );
        assert_eq!(seg.points[0].depth, Some(7.0));
        assert!(seg.points[2].time.is_none());
    }

    #[test]
    fn test_unprefixed_gpx_without_namespace() {
        let doc = r#"<gpx><trk><trkseg>
            <trkpt lat="1.5" lon="2.5"><time>2024-01-01T00:00:00</time>
              <extensions><depth>3.25</depth></extensions></trkpt>
            <trkpt lat="1.6" lon="2.6"/>
        </trkseg></trk></gpx>"#;
        let segments = parse_track(doc.as_bytes()).unwrap();
        assert_eq!(segments[0].stats.total, 2);
        assert_eq!(segments[0].points[0].depth, Some(3.25));
        assert!(segments[0].points[1].time.is_none());
    }

    #[test]
    fn test_depth_outside_extensions_ignored() {
        let doc = gpx(
            r#"<trk><trkseg><trkpt lat="1" lon="2"><time>2024-01-01T00:00:00Z</time><depth>3</depth></trkpt></trkseg></trk>"#,
        );
        let err = parse_track(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, BathyError::NoValidSegment));
    }

    #[test]
    fn test_malformed_document() {
        let err = parse_track(b"<gpx><trk><trkseg></trk></gpx>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedInput);

        let err = parse_track(b"<gpx><trk>").unwrap_err();
        assert!(matches!(err, BathyError::MalformedTrack(_)));

        let err = parse_track(b"").unwrap_err();
        assert!(matches!(err, BathyError::MalformedTrack(_)));
    }

    #[test]
    fn test_no_track_data() {
        let doc = gpx(r#"<wpt lat="1" lon="2"><name>buoy</name></wpt>"#);
        let err = parse_track(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, BathyError::NoTrackData));
    }

    #[test]
    fn test_no_valid_segment() {
        let doc = gpx(&format!(
            "<trk><trkseg>{}</trkseg><trkseg></trkseg></trk>",
            trkpt(48.0, -4.0, "2024-06-01T10:00:00Z", None),
        ));
        let err = parse_track(doc.as_bytes()).unwrap_err();
        assert!(matches!(err, BathyError::NoValidSegment));
        assert_eq!(err.kind(), ErrorKind::NoData);
    }
}
