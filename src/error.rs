//! Error taxonomy for the correction pipeline.
//!
//! Every failure is scoped to the request that produced it. Callers use
//! [`BathyError::kind`] to pick a user-facing category and
//! [`BathyError::is_retryable`] to decide whether trying again later can
//! help. Disk cache I/O problems never surface here; the cache logs them
//! and falls back to a miss.

use thiserror::Error;

/// Result alias for the correction pipeline.
pub type Result<T> = std::result::Result<T, BathyError>;

/// Broad failure categories, stable across error variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The track document could not be parsed.
    MalformedInput,
    /// Parsing succeeded but there is nothing to work with.
    NoData,
    /// Every candidate point lies outside the interpolable tide window.
    OutOfRange,
    /// The tide source failed, or could not be called at all.
    ExternalDependency,
}

#[derive(Debug, Error)]
pub enum BathyError {
    #[error("Malformed GPX document: {0}")]
    MalformedTrack(String),

    #[error("No track data found in GPX document")]
    NoTrackData,

    #[error("No valid segment found in GPX document")]
    NoValidSegment,

    #[error("Segment {0} not found")]
    SegmentNotFound(u32),

    #[error("Segment {0} has no usable time or position extent")]
    SegmentExtent(u32),

    #[error("Insufficient tide data: {0} usable sample(s), at least 2 required")]
    InsufficientTideData(usize),

    #[error("No points in tide range for segment {0}")]
    NoPointsInTideRange(u32),

    #[error("Tide source credential missing (set {0})")]
    MissingCredential(String),

    #[error("Tide source request failed: {0}")]
    Transport(String),

    #[error("Tide source returned HTTP {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("Invalid tide source response: {0}")]
    InvalidResponse(String),
}

impl BathyError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BathyError::MalformedTrack(_) => ErrorKind::MalformedInput,
            BathyError::NoTrackData
            | BathyError::NoValidSegment
            | BathyError::SegmentNotFound(_)
            | BathyError::SegmentExtent(_)
            | BathyError::InsufficientTideData(_) => ErrorKind::NoData,
            BathyError::NoPointsInTideRange(_) => ErrorKind::OutOfRange,
            BathyError::MissingCredential(_)
            | BathyError::Transport(_)
            | BathyError::Upstream { .. }
            | BathyError::InvalidResponse(_) => ErrorKind::ExternalDependency,
        }
    }

    /// Whether the same request may succeed if the caller tries again.
    ///
    /// The client never retries on its own.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BathyError::Transport(_) | BathyError::Upstream { .. } | BathyError::InvalidResponse(_)
        )
    }
}

impl From<reqwest::Error> for BathyError {
    fn from(e: reqwest::Error) -> Self {
        // The request URL carries the credential.
        BathyError::Transport(e.without_url().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(
            BathyError::MalformedTrack("x".into()).kind(),
            ErrorKind::MalformedInput
        );
        assert_eq!(BathyError::NoTrackData.kind(), ErrorKind::NoData);
        assert_eq!(BathyError::InsufficientTideData(1).kind(), ErrorKind::NoData);
        assert_eq!(BathyError::NoPointsInTideRange(2).kind(), ErrorKind::OutOfRange);
        assert_eq!(
            BathyError::MissingCredential("KEY".into()).kind(),
            ErrorKind::ExternalDependency
        );
    }

    #[test]
    fn test_retryable_only_for_source_failures() {
        assert!(BathyError::Transport("timeout".into()).is_retryable());
        assert!(BathyError::Upstream {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(!BathyError::MissingCredential("KEY".into()).is_retryable());
        assert!(!BathyError::NoValidSegment.is_retryable());
        assert!(!BathyError::NoPointsInTideRange(1).is_retryable());
    }

    #[test]
    fn test_messages_are_descriptive() {
        let msg = BathyError::NoPointsInTideRange(3).to_string();
        assert!(msg.contains("tide range"));
        assert!(msg.contains('3'));
        let msg = BathyError::InsufficientTideData(1).to_string();
        assert!(msg.contains("Insufficient tide data"));
    }
}
