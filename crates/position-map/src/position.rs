//! Line/column positions and offset conversion.

use serde::{Deserialize, Serialize};
use text_size::TextSize;

/// A 0-based line and column position.
///
/// Columns count UTF-8 bytes within the line, the same unit the offsets of a
/// [`LineIndex`] use. Positions in UTF-16 code units (editor protocols, maps
/// written by JavaScript tools) go through [`LineIndex::from_utf16`] and
/// [`LineIndex::to_utf16`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
pub struct Position {
    /// 0-indexed line number.
    pub line: u32,
    /// 0-indexed column.
    pub column: u32,
}

impl Position {
    /// Create a new position.
    #[inline]
    pub const fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }

    /// Create a position from a 1-based line and 1-based column.
    ///
    /// This and [`to_one_based`](Self::to_one_based) are the only 1-based
    /// conversions; everything past the boundary is 0-based. Returns `None`
    /// if either component is zero.
    pub fn from_one_based(line: u32, column: u32) -> Option<Self> {
        Some(Self {
            line: line.checked_sub(1)?,
            column: column.checked_sub(1)?,
        })
    }

    /// Convert to 1-indexed (line, column) for display.
    #[inline]
    pub const fn to_one_based(self) -> (u32, u32) {
        (self.line.saturating_add(1), self.column.saturating_add(1))
    }

    /// Move the position by a column delta, saturating at column 0.
    #[inline]
    pub fn shift_column(self, delta: i64) -> Self {
        let column = (i64::from(self.column) + delta).clamp(0, i64::from(u32::MAX)) as u32;
        Self { column, ..self }
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

impl From<(u32, u32)> for Position {
    fn from((line, column): (u32, u32)) -> Self {
        Self { line, column }
    }
}

/// A line index for converting between byte offsets and positions.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offsets of the start of each line.
    line_starts: Vec<TextSize>,
    /// Total length of the text.
    len: TextSize,
}

impl LineIndex {
    /// Create a new line index from text.
    pub fn new(text: &str) -> Self {
        let mut line_starts = vec![TextSize::from(0)];
        for (i, b) in text.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(TextSize::from((i + 1) as u32));
            }
        }
        Self {
            line_starts,
            len: TextSize::of(text),
        }
    }

    /// Get the position of a byte offset.
    ///
    /// Offsets past the end of the text are clamped to the end.
    pub fn position(&self, offset: TextSize) -> Position {
        let offset = offset.min(self.len);
        let line = self
            .line_starts
            .partition_point(|&start| start <= offset)
            .saturating_sub(1);
        let column = offset - self.line_starts[line];
        Position::new(line as u32, column.into())
    }

    /// Get the byte offset of a position.
    ///
    /// Returns `None` if the line does not exist or the column runs past the
    /// end of the line.
    pub fn offset(&self, position: Position) -> Option<TextSize> {
        let start = self.line_start(position.line)?;
        let end = self.line_end(position.line)?;
        let offset = start + TextSize::from(position.column);
        (offset <= end).then_some(offset)
    }

    /// Get the number of lines.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Get the start offset of a line.
    pub fn line_start(&self, line: u32) -> Option<TextSize> {
        self.line_starts.get(line as usize).copied()
    }

    /// Get the end offset of a line (inclusive of the newline, if any).
    pub fn line_end(&self, line: u32) -> Option<TextSize> {
        let line_idx = line as usize;
        if line_idx + 1 < self.line_starts.len() {
            Some(self.line_starts[line_idx + 1])
        } else if line_idx < self.line_starts.len() {
            Some(self.len)
        } else {
            None
        }
    }

    /// Convert a byte-column position in `text` to a UTF-16 column position.
    ///
    /// `text` must be the text the index was built from. A column inside a
    /// multi-byte character clamps to the character start; one past the end
    /// of the line clamps to the line end. Returns `None` for a missing line.
    pub fn to_utf16(&self, text: &str, position: Position) -> Option<Position> {
        let line = self.line_text(text, position.line)?;
        let mut end = (position.column as usize).min(line.len());
        while !line.is_char_boundary(end) {
            end -= 1;
        }
        let column = line[..end].encode_utf16().count() as u32;
        Some(Position::new(position.line, column))
    }

    /// Convert a UTF-16 column position in `text` to a byte-column position.
    ///
    /// `text` must be the text the index was built from. A column inside a
    /// surrogate pair clamps to the start of the character; one past the
    /// end of the line clamps to the line end. Returns `None` for a missing
    /// line.
    pub fn from_utf16(&self, text: &str, position: Position) -> Option<Position> {
        let line = self.line_text(text, position.line)?;
        let mut units = 0u32;
        let mut column = line.len();
        for (byte, ch) in line.char_indices() {
            let next = units + ch.len_utf16() as u32;
            if next > position.column {
                column = byte;
                break;
            }
            units = next;
        }
        Some(Position::new(position.line, column as u32))
    }

    /// The text of a line without its terminator.
    fn line_text<'a>(&self, text: &'a str, line: u32) -> Option<&'a str> {
        let start = usize::from(self.line_start(line)?);
        let end = usize::from(self.line_end(line)?);
        let line = text.get(start..end)?;
        let line = line.strip_suffix('\n').unwrap_or(line);
        Some(line.strip_suffix('\r').unwrap_or(line))
    }

    /// Get the total length of the indexed text.
    pub fn len(&self) -> TextSize {
        self.len
    }

    /// Check if the indexed text is empty.
    pub fn is_empty(&self) -> bool {
        self.len == TextSize::from(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ts(n: u32) -> TextSize {
        TextSize::from(n)
    }

    #[test]
    fn test_line_index() {
        let text = "hello\nworld\nfoo";
        let index = LineIndex::new(text);

        assert_eq!(index.line_count(), 3);

        assert_eq!(index.position(ts(0)), Position::new(0, 0));
        assert_eq!(index.position(ts(5)), Position::new(0, 5));
        assert_eq!(index.position(ts(6)), Position::new(1, 0));
        assert_eq!(index.position(ts(11)), Position::new(1, 5));
        assert_eq!(index.position(ts(12)), Position::new(2, 0));

        assert_eq!(index.offset(Position::new(0, 0)), Some(ts(0)));
        assert_eq!(index.offset(Position::new(1, 0)), Some(ts(6)));
        assert_eq!(index.offset(Position::new(2, 3)), Some(ts(15)));
    }

    #[test]
    fn test_offset_out_of_bounds() {
        let index = LineIndex::new("ab\ncd");
        assert_eq!(index.offset(Position::new(2, 0)), None);
        assert_eq!(index.offset(Position::new(1, 3)), None);
        assert_eq!(index.position(ts(100)), Position::new(1, 2));
    }

    #[test]
    fn test_trailing_newline_opens_empty_line() {
        let index = LineIndex::new("a\n");
        assert_eq!(index.line_count(), 2);
        assert_eq!(index.position(ts(2)), Position::new(1, 0));
        assert_eq!(index.offset(Position::new(1, 0)), Some(ts(2)));
    }

    #[test]
    fn test_one_based_conversion() {
        assert_eq!(Position::from_one_based(1, 1), Some(Position::new(0, 0)));
        assert_eq!(Position::from_one_based(0, 4), None);
        assert_eq!(Position::new(2, 7).to_one_based(), (3, 8));
        assert_eq!(Position::new(u32::MAX, 0).to_one_based(), (u32::MAX, 1));
    }

    #[test]
    fn test_utf16_columns() {
        // `é` is 2 bytes and 1 unit, `😀` is 4 bytes and 2 units
        let text = "let é = 1;\r\nx = \"😀\" + y\n";
        let index = LineIndex::new(text);

        assert_eq!(index.to_utf16(text, Position::new(0, 4)), Some(Position::new(0, 4)));
        assert_eq!(index.to_utf16(text, Position::new(0, 7)), Some(Position::new(0, 6)));
        assert_eq!(index.to_utf16(text, Position::new(1, 10)), Some(Position::new(1, 8)));
        assert_eq!(index.from_utf16(text, Position::new(1, 8)), Some(Position::new(1, 10)));
        assert_eq!(index.from_utf16(text, Position::new(0, 6)), Some(Position::new(0, 7)));

        // inside a character clamps to its start
        assert_eq!(index.to_utf16(text, Position::new(0, 5)), Some(Position::new(0, 4)));
        assert_eq!(index.from_utf16(text, Position::new(1, 6)), Some(Position::new(1, 5)));

        // past the line end clamps, the terminator is not part of the line
        assert_eq!(index.to_utf16(text, Position::new(0, 40)), Some(Position::new(0, 10)));
        assert_eq!(index.from_utf16(text, Position::new(0, 40)), Some(Position::new(0, 11)));
        assert_eq!(index.to_utf16(text, Position::new(5, 0)), None);
    }

    #[test]
    fn test_shift_column_saturates() {
        assert_eq!(Position::new(0, 3).shift_column(-5), Position::new(0, 0));
        assert_eq!(Position::new(0, 3).shift_column(2), Position::new(0, 5));
    }
}
