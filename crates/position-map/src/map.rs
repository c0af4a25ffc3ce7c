//! The immutable per-stage position map and its query.

use crate::Position;
use smol_str::SmolStr;

/// Tie-breaking rule for a lookup that has no exact segment match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Bias {
    /// The last segment at or before the queried column.
    #[default]
    NearestPreceding,
    /// The first segment at or after the queried column.
    NearestFollowing,
}

impl Bias {
    /// Get the bias as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NearestPreceding => "preceding",
            Self::NearestFollowing => "following",
        }
    }
}

/// The original side of a segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OriginalLocation {
    /// Index into the map's sources.
    pub source: u32,
    /// 0-indexed original line.
    pub line: u32,
    /// 0-indexed original column.
    pub column: u32,
    /// Index into the map's names.
    pub name: Option<u32>,
}

impl OriginalLocation {
    /// Get the original line and column.
    pub fn position(&self) -> Position {
        Position::new(self.line, self.column)
    }
}

/// One recorded correspondence on a generated line.
///
/// A segment without an original marks its generated column as explicitly
/// unmapped (synthesized code); lookups that land on it report nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Segment {
    /// Generated column the segment starts at.
    pub generated_column: u32,
    /// Where the generated text came from.
    pub original: Option<OriginalLocation>,
}

/// The result of a lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MappedPosition<'a> {
    /// Source index of the matched segment.
    pub source_index: u32,
    /// Position on the other side of the matched segment.
    pub position: Position,
    /// Name attached to the matched segment.
    pub name: Option<&'a str>,
    /// Column distance between the query and the matched segment.
    pub residual: u32,
    /// The bias used for the lookup.
    pub bias: Bias,
}

impl MappedPosition<'_> {
    /// Get the matched position, moved by the residual when the matched
    /// token is known to map one-to-one and the query lies inside it.
    pub fn adjusted(&self, one_to_one: bool) -> Position {
        if one_to_one && self.bias == Bias::NearestPreceding {
            self.position.shift_column(i64::from(self.residual))
        } else {
            self.position
        }
    }

    /// Check if the query hit the segment exactly.
    pub fn is_exact(&self) -> bool {
        self.residual == 0
    }
}

/// Reverse index entry, ordered by original location.
#[derive(Debug, Clone, Copy)]
struct ReverseEntry {
    source: u32,
    line: u32,
    column: u32,
    name: Option<u32>,
    generated: Position,
}

impl ReverseEntry {
    fn key(&self) -> (u32, u32, u32) {
        (self.source, self.line, self.column)
    }
}

/// One stage's generated → original position correspondence.
///
/// Built once by a [`MapBuilder`](crate::MapBuilder) or decoded from the v3
/// interchange format, never mutated afterwards. Columns on both sides are
/// taken as they were recorded; maps decoded from JavaScript tooling count
/// UTF-16 code units, which [`LineIndex::from_utf16`](crate::LineIndex::from_utf16)
/// converts for text that is not ASCII.
#[derive(Debug, Clone, Default)]
pub struct PositionMap {
    lines: Vec<Vec<Segment>>,
    sources: Vec<SmolStr>,
    sources_content: Vec<Option<String>>,
    names: Vec<SmolStr>,
    file: Option<SmolStr>,
    reverse: Vec<ReverseEntry>,
}

impl PositionMap {
    /// Assemble a map from already-ordered parts.
    pub(crate) fn from_parts(
        lines: Vec<Vec<Segment>>,
        sources: Vec<SmolStr>,
        sources_content: Vec<Option<String>>,
        names: Vec<SmolStr>,
        file: Option<SmolStr>,
    ) -> Self {
        let mut reverse: Vec<ReverseEntry> = lines
            .iter()
            .enumerate()
            .flat_map(|(line, segments)| {
                segments.iter().filter_map(move |segment| {
                    let original = segment.original?;
                    Some(ReverseEntry {
                        source: original.source,
                        line: original.line,
                        column: original.column,
                        name: original.name,
                        generated: Position::new(line as u32, segment.generated_column),
                    })
                })
            })
            .collect();
        // Stable, so ties keep generated order.
        reverse.sort_by_key(ReverseEntry::key);

        Self {
            lines,
            sources,
            sources_content,
            names,
            file,
            reverse,
        }
    }

    /// Find the original position of a generated position.
    ///
    /// Returns `None` if the line is out of range, has no segment on the
    /// requested side of the column, or the chosen segment is unmapped.
    /// Adjacent lines are never consulted.
    pub fn lookup(&self, position: Position, bias: Bias) -> Option<MappedPosition<'_>> {
        let segments = self.lines.get(position.line as usize)?;
        let segment = match bias {
            Bias::NearestPreceding => {
                let idx = segments.partition_point(|s| s.generated_column <= position.column);
                segments.get(idx.checked_sub(1)?)?
            }
            Bias::NearestFollowing => {
                let idx = segments.partition_point(|s| s.generated_column < position.column);
                segments.get(idx)?
            }
        };
        let original = segment.original?;

        Some(MappedPosition {
            source_index: original.source,
            position: original.position(),
            name: self.name_of(original.name),
            residual: position.column.abs_diff(segment.generated_column),
            bias,
        })
    }

    /// Find the generated position of an original position in `source`.
    ///
    /// The mirror of [`lookup`](Self::lookup): segments are searched on the
    /// queried original line by original column, with the same bias and tie
    /// rules.
    pub fn lookup_generated(
        &self,
        source: u32,
        original: Position,
        bias: Bias,
    ) -> Option<MappedPosition<'_>> {
        let key = (source, original.line, original.column);
        let entry = match bias {
            Bias::NearestPreceding => {
                let idx = self.reverse.partition_point(|e| e.key() <= key);
                self.reverse.get(idx.checked_sub(1)?)?
            }
            Bias::NearestFollowing => {
                let idx = self.reverse.partition_point(|e| e.key() < key);
                self.reverse.get(idx)?
            }
        };
        if entry.source != source || entry.line != original.line {
            return None;
        }

        Some(MappedPosition {
            source_index: source,
            position: entry.generated,
            name: self.name_of(entry.name),
            residual: original.column.abs_diff(entry.column),
            bias,
        })
    }

    /// Get the generated column where the token starting at `generated`
    /// ends: the next segment on its line that starts after it.
    ///
    /// Returns `None` if the token runs to the end of the line.
    pub fn segment_end(&self, generated: Position) -> Option<u32> {
        let segments = self.segments(generated.line);
        let idx = segments.partition_point(|s| s.generated_column <= generated.column);
        segments.get(idx).map(|s| s.generated_column)
    }

    fn name_of(&self, index: Option<u32>) -> Option<&str> {
        index
            .and_then(|i| self.names.get(i as usize))
            .map(SmolStr::as_str)
    }

    /// Get the number of generated lines the map covers.
    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Get the segments recorded for a generated line.
    pub fn segments(&self, line: u32) -> &[Segment] {
        self.lines
            .get(line as usize)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Get all generated lines.
    pub fn lines(&self) -> &[Vec<Segment>] {
        &self.lines
    }

    /// Iterate over every segment with its generated position.
    pub fn iter(&self) -> impl Iterator<Item = (Position, &Segment)> + '_ {
        self.lines.iter().enumerate().flat_map(|(line, segments)| {
            segments
                .iter()
                .map(move |s| (Position::new(line as u32, s.generated_column), s))
        })
    }

    /// Get the source file names.
    pub fn sources(&self) -> &[SmolStr] {
        &self.sources
    }

    /// Get the index of a source by name.
    pub fn source_index(&self, name: &str) -> Option<u32> {
        self.sources.iter().position(|s| s == name).map(|i| i as u32)
    }

    /// Get the embedded content of a source, if recorded.
    pub fn source_content(&self, index: u32) -> Option<&str> {
        self.sources_content.get(index as usize)?.as_deref()
    }

    /// Get the symbol names.
    pub fn names(&self) -> &[SmolStr] {
        &self.names
    }

    /// Get a name by index.
    pub fn name(&self, index: u32) -> Option<&str> {
        self.name_of(Some(index))
    }

    /// Get the generated file name, if recorded.
    pub fn file(&self) -> Option<&str> {
        self.file.as_deref()
    }

    /// Get the total number of segments.
    pub fn len(&self) -> usize {
        self.lines.iter().map(Vec::len).sum()
    }

    /// Check if the map records no segments.
    pub fn is_empty(&self) -> bool {
        self.lines.iter().all(Vec::is_empty)
    }
}
