//! Error types for building and decoding position maps.

use thiserror::Error;

/// Result type for position map operations.
pub type MapResult<T> = Result<T, MapError>;

/// An error raised while building, decoding or encoding a position map.
#[derive(Debug, Error)]
pub enum MapError {
    /// A segment was added to a generated line before a segment it should follow.
    #[error(
        "segment at {line}:{column} is out of order (previous segment on this line is at column {previous})"
    )]
    DisorderedSegment {
        /// 0-based generated line.
        line: u32,
        /// Generated column of the rejected segment.
        column: u32,
        /// Generated column of the last accepted segment on the line.
        previous: u32,
    },

    /// The interchange document declares a version other than 3.
    #[error("unsupported source map version {0}, expected 3")]
    UnsupportedVersion(u32),

    /// The `mappings` string could not be decoded or encoded.
    #[error("source map codec error: {0}")]
    Codec(#[from] sourcemap::Error),

    /// A segment references a source index the map does not declare.
    #[error("source index {index} out of range ({count} sources)")]
    SourceOutOfRange {
        /// Referenced index.
        index: u32,
        /// Number of declared sources.
        count: usize,
    },

    /// A segment references a name index the map does not declare.
    #[error("name index {index} out of range ({count} names)")]
    NameOutOfRange {
        /// Referenced index.
        index: u32,
        /// Number of declared names.
        count: usize,
    },

    /// A generated column went negative or past `u32::MAX`.
    #[error("{field} out of range on generated line {line}")]
    FieldOutOfRange {
        /// Field name.
        field: &'static str,
        /// 0-based generated line.
        line: u32,
    },

    /// The interchange document is not valid JSON for a v3 map.
    #[error("invalid source map JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl MapError {
    /// Get a short, stable identifier for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            MapError::DisorderedSegment { .. } => "disordered-segment",
            MapError::UnsupportedVersion(_) => "unsupported-version",
            MapError::Codec(_) => "codec",
            MapError::SourceOutOfRange { .. } => "source-out-of-range",
            MapError::NameOutOfRange { .. } => "name-out-of-range",
            MapError::FieldOutOfRange { .. } => "field-out-of-range",
            MapError::Json(_) => "invalid-json",
        }
    }
}
