//! Builders that record segments while a stage emits text.

use crate::map::{OriginalLocation, Segment};
use crate::{MapError, MapResult, Position, PositionMap};
use indexmap::{IndexMap, IndexSet};
use rustc_hash::FxBuildHasher;
use smol_str::SmolStr;

/// Check that a segment at `column` may follow the segments already on
/// generated `line`.
pub(crate) fn ensure_ordered(segments: &[Segment], line: u32, column: u32) -> MapResult<()> {
    match segments.last() {
        Some(last) if last.generated_column > column => Err(MapError::DisorderedSegment {
            line,
            column,
            previous: last.generated_column,
        }),
        _ => Ok(()),
    }
}

/// Accumulates segments for one stage run and freezes them into a
/// [`PositionMap`].
///
/// Segments on a generated line must arrive in non-decreasing column order.
/// Lines themselves may be filled in any order. An out-of-order segment is
/// rejected, never reordered.
#[derive(Debug, Default)]
pub struct MapBuilder {
    lines: Vec<Vec<Segment>>,
    sources: IndexMap<SmolStr, Option<String>, FxBuildHasher>,
    names: IndexSet<SmolStr, FxBuildHasher>,
    current_source: Option<u32>,
    file: Option<SmolStr>,
}

impl MapBuilder {
    /// Create a new, empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the generated file name.
    pub fn with_file(mut self, file: impl Into<SmolStr>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Register a source and make it the current one.
    ///
    /// Registering the same name twice returns the existing index; content
    /// given later fills in content that was missing.
    pub fn add_source(&mut self, name: impl Into<SmolStr>, content: Option<&str>) -> u32 {
        let entry = self.sources.entry(name.into());
        let index = entry.index() as u32;
        let slot = entry.or_insert(None);
        if slot.is_none() {
            *slot = content.map(str::to_string);
        }
        self.current_source = Some(index);
        index
    }

    /// Make an already registered source the current one.
    pub fn set_source(&mut self, index: u32) -> MapResult<()> {
        self.check_source(index)?;
        self.current_source = Some(index);
        Ok(())
    }

    fn check_source(&self, index: u32) -> MapResult<()> {
        if (index as usize) < self.sources.len() {
            Ok(())
        } else {
            Err(MapError::SourceOutOfRange {
                index,
                count: self.sources.len(),
            })
        }
    }

    fn current_source(&mut self) -> u32 {
        match self.current_source {
            Some(index) => index,
            None => self.add_source("", None),
        }
    }

    /// Record that `generated` came from `original` in the current source.
    ///
    /// Without a registered source an unnamed one is created.
    pub fn add_mapping(
        &mut self,
        generated: Position,
        original: Position,
        name: Option<&str>,
    ) -> MapResult<()> {
        let source = self.current_source();
        self.add_mapping_in(source, generated, original, name)
    }

    /// Record that `generated` came from `original` in the given source.
    pub fn add_mapping_in(
        &mut self,
        source: u32,
        generated: Position,
        original: Position,
        name: Option<&str>,
    ) -> MapResult<()> {
        self.check_source(source)?;
        let name = name.map(|n| self.names.insert_full(SmolStr::new(n)).0 as u32);
        self.push(
            generated,
            Some(OriginalLocation {
                source,
                line: original.line,
                column: original.column,
                name,
            }),
        )
    }

    /// Mark `generated` as the start of text that maps to nothing.
    pub fn add_unmapped(&mut self, generated: Position) -> MapResult<()> {
        self.push(generated, None)
    }

    fn push(&mut self, generated: Position, original: Option<OriginalLocation>) -> MapResult<()> {
        let line = generated.line as usize;
        if self.lines.len() <= line {
            self.lines.resize_with(line + 1, Vec::new);
        }
        let segments = &mut self.lines[line];
        ensure_ordered(segments, generated.line, generated.column)?;
        segments.push(Segment {
            generated_column: generated.column,
            original,
        });
        Ok(())
    }

    /// Get the last recorded segment on a generated line.
    pub fn last_segment(&self, line: u32) -> Option<&Segment> {
        self.lines.get(line as usize)?.last()
    }

    /// Freeze the recorded segments into a map.
    pub fn build(self) -> PositionMap {
        let (sources, sources_content): (Vec<_>, Vec<_>) = self.sources.into_iter().unzip();
        let map = PositionMap::from_parts(
            self.lines,
            sources,
            sources_content,
            self.names.into_iter().collect(),
            self.file,
        );
        tracing::trace!(
            lines = map.line_count(),
            segments = map.len(),
            sources = map.sources().len(),
            "built position map"
        );
        map
    }
}

/// Builder for generating code with position mappings.
///
/// Tracks the generated line and column as text is appended and records
/// segments through a [`MapBuilder`]. Unmapped text that follows mapped text
/// on a line starts an unmapped segment, so synthesized code never borrows
/// the position of the token before it. Columns advance by UTF-8 bytes.
#[derive(Debug, Default)]
pub struct CodeBuilder {
    /// The generated code.
    code: String,
    /// Current generated position.
    position: Position,
    /// The segments.
    map: MapBuilder,
}

impl CodeBuilder {
    /// Create a new code builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a code builder whose mappings point into `source`.
    pub fn with_source(name: impl Into<SmolStr>, content: Option<&str>) -> Self {
        let mut builder = Self::default();
        builder.map.add_source(name, content);
        builder
    }

    /// Get the current position in the generated code.
    pub fn position(&self) -> Position {
        self.position
    }

    fn advance(&mut self, code: &str) {
        self.code.push_str(code);
        match code.rfind('\n') {
            Some(idx) => {
                self.position.line += code.matches('\n').count() as u32;
                self.position.column = (code.len() - idx - 1) as u32;
            }
            None => self.position.column += code.len() as u32,
        }
    }

    fn record(&mut self, original: Option<Position>, name: Option<&str>) {
        let result = match original {
            Some(original) => self.map.add_mapping(self.position, original, name),
            None => self.map.add_unmapped(self.position),
        };
        // The cursor only moves forward, so segments are always in order.
        debug_assert!(result.is_ok(), "code builder emitted a disordered segment");
    }

    /// Append code without mapping.
    pub fn push_str(&mut self, code: &str) {
        if code.is_empty() {
            return;
        }
        let follows_mapped = self
            .map
            .last_segment(self.position.line)
            .is_some_and(|s| s.original.is_some());
        if follows_mapped && !code.starts_with('\n') {
            self.record(None, None);
        }
        self.advance(code);
    }

    /// Append a character without mapping.
    pub fn push(&mut self, c: char) {
        let mut buf = [0; 4];
        self.push_str(c.encode_utf8(&mut buf));
    }

    /// Append code that came from `original`.
    pub fn push_mapped(&mut self, code: &str, original: Position) {
        self.push_named(code, original, None);
    }

    /// Append code that came from `original`, attaching a symbol name.
    pub fn push_named(&mut self, code: &str, original: Position, name: Option<&str>) {
        if code.is_empty() {
            return;
        }
        self.record(Some(original), name);
        self.advance(code);
    }

    /// Append text copied unchanged from `original`, mapping the start of
    /// every copied line.
    pub fn push_verbatim(&mut self, code: &str, original: Position) {
        for (i, line) in code.split('\n').enumerate() {
            if i > 0 {
                self.advance("\n");
            }
            if line.is_empty() {
                continue;
            }
            let start = if i == 0 {
                original
            } else {
                Position::new(original.line + i as u32, 0)
            };
            self.record(Some(start), None);
            self.advance(line);
        }
    }

    /// Append a newline.
    pub fn newline(&mut self) {
        self.advance("\n");
    }

    /// Get the generated code.
    pub fn code(&self) -> &str {
        &self.code
    }

    /// Consume the builder and return the code and position map.
    pub fn finish(self) -> (String, PositionMap) {
        (self.code, self.map.build())
    }
}
