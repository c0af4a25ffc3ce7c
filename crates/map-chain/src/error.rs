//! Error types for chain queries and pipeline runs.

use crate::DocumentVersion;
use position_map::{LineIndex, MapError, TextSize};
use smol_str::SmolStr;
use thiserror::Error;

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

/// An error from composing, querying or building a chain.
#[derive(Debug, Error)]
pub enum ChainError {
    /// The query was computed against a chain that has been replaced.
    #[error("document version {requested} is stale (current is {current})")]
    StaleVersion {
        /// Version the caller computed its position against.
        requested: DocumentVersion,
        /// Version of the current chain.
        current: DocumentVersion,
    },

    /// The query refers to a version whose chain has not been installed yet.
    #[error("document version {requested} is not available yet (current is {current})")]
    PendingVersion {
        /// Version the caller asked for.
        requested: DocumentVersion,
        /// Version of the current chain.
        current: DocumentVersion,
    },

    /// A stage failed to produce output.
    #[error(transparent)]
    Upstream(#[from] UpstreamTransformError),

    /// A stage produced an unusable position map.
    #[error(transparent)]
    Map(#[from] MapError),

    /// The chain has no final-stage map to compose from.
    #[error("chain cannot be composed: {0}")]
    NotComposable(&'static str),
}

/// A parse or compile failure reported by a transformation stage, located
/// in that stage's own input.
///
/// The position is never remapped through the chain: a failed stage has no
/// output and therefore no mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{stage}: {message} ({line}:{column})")]
pub struct UpstreamTransformError {
    /// Name of the failing stage.
    pub stage: SmolStr,
    /// Byte offset into the stage input.
    pub offset: u32,
    /// 0-indexed line in the stage input.
    pub line: u32,
    /// 0-indexed column in the stage input.
    pub column: u32,
    /// The error message.
    pub message: String,
}

impl UpstreamTransformError {
    /// Create an error located at a byte offset of the stage input.
    pub fn at_offset(
        stage: impl Into<SmolStr>,
        input: &str,
        offset: u32,
        message: impl Into<String>,
    ) -> Self {
        let position = LineIndex::new(input).position(TextSize::from(offset));
        Self {
            stage: stage.into(),
            offset,
            line: position.line,
            column: position.column,
            message: message.into(),
        }
    }
}
