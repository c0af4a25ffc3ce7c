//! Multi-stage position mapping.
//!
//! A document that passes through several transformations gets one
//! [`position_map::PositionMap`] per stage. This crate chains them so a
//! position in the final output can be traced back to the original
//! document and forward again, keeps the chain of the current document
//! version behind a [`DocumentMapper`], and runs [`Transformer`] stages to
//! build chains.

pub mod chain;
pub mod compose;
pub mod error;
pub mod mapper;
pub mod transform;

pub use chain::{ChainEntry, MappingChain, StageMap};
pub use compose::{compose, trace_backward, trace_backward_with, trace_forward, trace_forward_with};
pub use error::{ChainError, ChainResult, UpstreamTransformError};
pub use mapper::{DocumentMapper, DocumentVersion, VersionedChain};
pub use transform::{
    Compiled, Pipeline, PipelineOptions, PipelineOutput, PreambleStage, RegionStage, Transformer,
};
