//! Chains of per-stage position maps.

use position_map::{Bias, Position, PositionMap, StageFrame};
use smol_str::SmolStr;
use std::sync::Arc;

/// The mapping one stage contributed to a chain.
#[derive(Debug, Clone)]
pub enum StageMap {
    /// A recorded position map.
    Mapped(Arc<PositionMap>),
    /// The stage copies its input unchanged; positions pass through.
    Identity,
    /// The stage produced no mapping; nothing passes through it.
    Missing,
}

impl StageMap {
    /// Get the position map, if the stage recorded one.
    pub fn as_map(&self) -> Option<&PositionMap> {
        match self {
            Self::Mapped(map) => Some(map),
            Self::Identity | Self::Missing => None,
        }
    }

    /// Get a short description of the variant.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Mapped(_) => "mapped",
            Self::Identity => "identity",
            Self::Missing => "missing",
        }
    }
}

impl From<PositionMap> for StageMap {
    fn from(map: PositionMap) -> Self {
        Self::Mapped(Arc::new(map))
    }
}

/// One stage of a [`MappingChain`].
#[derive(Debug, Clone)]
pub struct ChainEntry {
    /// The stage's generated → input mapping.
    pub map: StageMap,
    /// Where the stage's input sits in its host and how its output is wrapped.
    pub frame: StageFrame,
    /// The source of `map` that is the stage's input.
    pub source_index: u32,
    /// Whether characters inside a mapped token correspond one-to-one.
    pub one_to_one: bool,
    /// Stage name, for diagnostics.
    pub label: Option<SmolStr>,
}

impl ChainEntry {
    /// Create an entry from a stage map with an identity frame.
    pub fn new(map: impl Into<StageMap>) -> Self {
        Self {
            map: map.into(),
            frame: StageFrame::identity(),
            source_index: 0,
            one_to_one: false,
            label: None,
        }
    }

    /// Create an entry for a stage that recorded a position map.
    pub fn mapped(map: PositionMap) -> Self {
        Self::new(map)
    }

    /// Create an entry for a stage that copies its input unchanged.
    pub fn identity() -> Self {
        let mut entry = Self::new(StageMap::Identity);
        entry.one_to_one = true;
        entry
    }

    /// Create an entry for a stage that produced no mapping.
    pub fn missing() -> Self {
        Self::new(StageMap::Missing)
    }

    /// Set the frame.
    pub fn with_frame(mut self, frame: StageFrame) -> Self {
        self.frame = frame;
        self
    }

    /// Set the source index followed through the stage's map.
    pub fn with_source(mut self, source_index: u32) -> Self {
        self.source_index = source_index;
        self
    }

    /// Set whether mapped tokens correspond character by character.
    pub fn with_one_to_one(mut self, one_to_one: bool) -> Self {
        self.one_to_one = one_to_one;
        self
    }

    /// Set the stage name.
    pub fn with_label(mut self, label: impl Into<SmolStr>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Get the stage name, or a placeholder.
    pub fn name(&self) -> &str {
        self.label.as_deref().unwrap_or("<stage>")
    }

    /// Move a position in this stage's output to its host input space.
    ///
    /// Removes the output wrapper lines, queries the map, then places the
    /// stage-local result into the host document.
    pub fn to_original(&self, generated: Position, bias: Bias) -> Option<Position> {
        let local = self.frame.unwrap_generated(generated)?;
        let original = match &self.map {
            StageMap::Mapped(map) => {
                let mapped = map.lookup(local, bias)?;
                if mapped.source_index != self.source_index {
                    return None;
                }
                mapped.adjusted(self.one_to_one)
            }
            StageMap::Identity => local,
            StageMap::Missing => return None,
        };
        self.frame.to_host_space(original)
    }

    /// Move a position in this stage's host input space to its output.
    ///
    /// A one-to-one stage places a position that falls strictly inside a
    /// token at the same offset into the token's output. Any other position
    /// resolves to the token chosen by `bias`.
    pub fn to_generated(&self, original: Position, bias: Bias) -> Option<Position> {
        let local = self.frame.to_local_space(original)?;
        let generated = match &self.map {
            StageMap::Mapped(map) => {
                let inside = self
                    .one_to_one
                    .then(|| inside_token(map, self.source_index, local))
                    .flatten();
                match inside {
                    Some(generated) => generated,
                    None => {
                        map.lookup_generated(self.source_index, local, bias)?
                            .position
                    }
                }
            }
            StageMap::Identity => local,
            StageMap::Missing => return None,
        };
        self.frame.wrap_generated(generated)
    }
}

/// Offset into the one-to-one token that covers `local`.
///
/// `None` when `local` starts a token, precedes every token on its line, or
/// lies past the generated extent of the preceding token.
fn inside_token(map: &PositionMap, source: u32, local: Position) -> Option<Position> {
    let hit = map.lookup_generated(source, local, Bias::NearestPreceding)?;
    if hit.is_exact() {
        return None;
    }
    let column = hit.position.column.checked_add(hit.residual)?;
    match map.segment_end(hit.position) {
        Some(end) if column >= end => None,
        _ => Some(Position::new(hit.position.line, column)),
    }
}

/// The per-stage mappings of one document version, ordered from the final
/// generated artifact back to the original document.
///
/// Built once per compilation and never mutated; a new document version
/// gets a new chain.
#[derive(Debug, Clone, Default)]
pub struct MappingChain {
    entries: Vec<ChainEntry>,
}

impl MappingChain {
    /// Create a chain from entries ordered final stage first.
    pub fn new(entries: Vec<ChainEntry>) -> Self {
        Self { entries }
    }

    /// Create a chain from entries in pipeline order (original stage first).
    pub fn from_pipeline_order(mut entries: Vec<ChainEntry>) -> Self {
        entries.reverse();
        Self { entries }
    }

    /// Get the entries, final stage first.
    pub fn entries(&self) -> &[ChainEntry] {
        &self.entries
    }

    /// Get the number of stages.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the chain has no stages.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Trace a final-output position back to the original document.
    pub fn to_original(&self, position: Position) -> Option<Position> {
        crate::compose::trace_backward(position, self)
    }

    /// Trace an original-document position forward to the final output.
    pub fn to_generated(&self, position: Position) -> Option<Position> {
        crate::compose::trace_forward(position, self)
    }
}

impl FromIterator<ChainEntry> for MappingChain {
    fn from_iter<I: IntoIterator<Item = ChainEntry>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
