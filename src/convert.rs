//! Correction façade over parsing, tide lookup, and output.
//!
//! [`Bathymetry`] is what callers (the CLI, or any host embedding the
//! library) talk to:
//!
//! | Operation | Result |
//! |-----------|--------|
//! | [`Bathymetry::segments`] | parsed segments, numbered from 1 |
//! | [`Bathymetry::summaries`] | serializable per-segment statistics |
//! | [`Bathymetry::select`] | one segment by number |
//! | [`Bathymetry::tide_series_for`] | tide heights over a segment's extent |
//! | [`Bathymetry::correct`] | the XYZ artifact for a segment |
//!
//! The tide series for a segment is requested at the segment's median
//! position over its `[start, end]` time extent.

use std::sync::Arc;

use tracing::info;

use crate::cache::{MemoryCache, TideCache};
use crate::config::Config;
use crate::error::{BathyError, Result};
use crate::models::{Segment, SegmentSummary, TideSeries};
use crate::sounding::{generate_xyz, XyzArtifact};
use crate::tides::{TideClient, WorldTidesSource};
use crate::track::parse_track;

pub struct Bathymetry {
    client: TideClient,
}

impl Bathymetry {
    pub fn new(client: TideClient) -> Self {
        Self { client }
    }

    /// Build a service from configuration, sharing `memory` as the
    /// process-wide memory cache tier.
    pub fn from_config(config: &Config, memory: Arc<MemoryCache>) -> Result<Self> {
        let settings = config.tides.settings();
        let source = WorldTidesSource::new(settings.timeout)?;
        let cache = TideCache::new(memory, config.disk_cache());
        let client = TideClient::new(
            settings,
            config.tides.credential(),
            config.tides.api_key_env.clone(),
            cache,
            Box::new(source),
        );
        Ok(Self::new(client))
    }

    pub fn client(&self) -> &TideClient {
        &self.client
    }

    pub fn segments(&self, bytes: &[u8]) -> Result<Vec<Segment>> {
        parse_track(bytes)
    }

    pub fn summaries(&self, bytes: &[u8]) -> Result<Vec<SegmentSummary>> {
        Ok(self.segments(bytes)?.iter().map(Segment::summary).collect())
    }

    /// # Errors
    ///
    /// [`BathyError::SegmentNotFound`] when no segment carries `id`.
    pub fn select<'a>(&self, segments: &'a [Segment], id: u32) -> Result<&'a Segment> {
        segments
            .iter()
            .find(|s| s.id == id)
            .ok_or(BathyError::SegmentNotFound(id))
    }

    /// Fetch tide heights covering a segment.
    ///
    /// # Errors
    ///
    /// [`BathyError::SegmentExtent`] when the segment has no timed points or
    /// no positioned points, otherwise whatever [`TideClient::fetch_series`]
    /// returns.
    pub fn tide_series_for(&self, segment: &Segment) -> Result<TideSeries> {
        let (Some(start), Some(end), Some(position)) = (
            segment.stats.start,
            segment.stats.end,
            segment.median_position(),
        ) else {
            return Err(BathyError::SegmentExtent(segment.id));
        };

        let query = self.client.query(position.lat, position.lon, start, end);
        self.client.fetch_series(&query)
    }

    /// Tide-correct a segment into an XYZ artifact.
    pub fn correct(&self, segment: &Segment) -> Result<XyzArtifact> {
        let series = self.tide_series_for(segment)?;
        let artifact = generate_xyz(segment, &series)?;
        info!(
            segment = segment.id,
            rows = artifact.rows,
            out_of_range = artifact.out_of_range,
            incomplete = segment.stats.total - segment.stats.valid,
            file = %artifact.file_name,
            "Segment corrected"
        );
        Ok(artifact)
    }
}
