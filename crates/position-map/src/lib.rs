//! Per-stage position mapping for stagemap.
//!
//! This crate provides the building blocks every transformation stage uses to
//! relate its generated text back to its input:
//! - [`PositionMap`], an immutable table of segments with a biased lookup
//! - [`MapBuilder`] and [`CodeBuilder`] for recording segments while emitting
//! - [`StageFrame`] for stages that run on an extracted or wrapped region
//! - [`LineIndex`] for converting between offsets and positions
//! - the v3 interchange format ([`RawSourceMap`]) for maps that cross process
//!   or tool boundaries

pub mod builder;
pub mod error;
pub mod frame;
pub mod interchange;
pub mod map;
pub mod position;

pub use builder::{CodeBuilder, MapBuilder};
pub use error::{MapError, MapResult};
pub use frame::{extract_region, StageFrame};
pub use interchange::RawSourceMap;
pub use map::{Bias, MappedPosition, OriginalLocation, PositionMap, Segment};
pub use position::{LineIndex, Position};
pub use text_size::TextSize;
