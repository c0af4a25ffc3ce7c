//! Coordinate adaptation for stages that run on part of a larger document.
//!
//! A stage may compile an extracted, dedented sub-region of its host text
//! (an embedded script block, an interpolation, a fenced snippet), and it may
//! wrap its own output in boilerplate lines. A [`StageFrame`] records both so
//! positions can be moved between the stage's local coordinates and the
//! coordinates of the surrounding document.

use crate::Position;
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Offsets that place a stage's local text inside its host document.
///
/// `start_column` and the stripped indentation are byte counts.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StageFrame {
    /// Host line of the first local line.
    pub start_line: u32,
    /// Host column of the first local character on the first line.
    pub start_column: u32,
    /// Boilerplate lines prepended to the stage's output.
    pub prepended_line_count: u32,
    /// Indentation removed from every line before the stage ran.
    pub stripped_indent: SmolStr,
    /// Number of host lines covered by the region; `None` means unbounded.
    pub line_count: Option<u32>,
}

impl StageFrame {
    /// The frame of a stage that compiles the whole document unwrapped.
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a frame for a region starting at the given host position.
    pub fn region(start_line: u32, start_column: u32) -> Self {
        Self {
            start_line,
            start_column,
            ..Self::default()
        }
    }

    /// Set the stripped indentation.
    pub fn with_indent(mut self, indent: impl Into<SmolStr>) -> Self {
        self.stripped_indent = indent.into();
        self
    }

    /// Set the number of host lines the region covers.
    pub fn with_line_count(mut self, line_count: u32) -> Self {
        self.line_count = Some(line_count);
        self
    }

    /// Set the number of boilerplate lines prepended to the output.
    pub fn with_prepended_lines(mut self, count: u32) -> Self {
        self.prepended_line_count = count;
        self
    }

    /// Check if the frame leaves positions unchanged.
    pub fn is_identity(&self) -> bool {
        self.start_line == 0
            && self.start_column == 0
            && self.prepended_line_count == 0
            && self.stripped_indent.is_empty()
    }

    fn indent_len(&self) -> u32 {
        self.stripped_indent.len() as u32
    }

    fn contains_line(&self, host_line: u32) -> bool {
        if host_line < self.start_line {
            return false;
        }
        match self.line_count {
            Some(count) => host_line - self.start_line < count,
            None => true,
        }
    }

    /// Move a position in the stage's local input into host coordinates.
    ///
    /// Returns `None` if the host position does not fit in `u32`.
    pub fn to_host_space(&self, local: Position) -> Option<Position> {
        let mut column = local.column.checked_add(self.indent_len())?;
        if local.line == 0 {
            column = column.checked_add(self.start_column)?;
        }
        let line = local.line.checked_add(self.start_line)?;
        Some(Position::new(line, column))
    }

    /// Move a host position into the stage's local input coordinates.
    ///
    /// Returns `None` for host lines outside the region and for columns that
    /// fall before the region start or inside the stripped indentation.
    pub fn to_local_space(&self, host: Position) -> Option<Position> {
        if !self.contains_line(host.line) {
            return None;
        }
        let line = host.line - self.start_line;
        let mut column = host.column.checked_sub(self.indent_len())?;
        if line == 0 {
            column = column.checked_sub(self.start_column)?;
        }
        Some(Position::new(line, column))
    }

    /// Remove the prepended boilerplate lines from a position in the stage's
    /// output. Positions inside the boilerplate are unmapped.
    pub fn unwrap_generated(&self, generated: Position) -> Option<Position> {
        let line = generated.line.checked_sub(self.prepended_line_count)?;
        Some(Position::new(line, generated.column))
    }

    /// Add the prepended boilerplate lines to a position in the stage's
    /// unwrapped output.
    pub fn wrap_generated(&self, generated: Position) -> Option<Position> {
        let line = generated.line.checked_add(self.prepended_line_count)?;
        Some(Position::new(line, generated.column))
    }
}

/// Cut whole lines `[start_line, end_line)` out of `host`, strip their
/// common indentation and return the snippet with the frame that maps it
/// back into `host`.
///
/// Blank lines do not take part in computing the common indentation and are
/// emitted empty.
pub fn extract_region(host: &str, start_line: u32, end_line: u32) -> (String, StageFrame) {
    let lines: Vec<&str> = host
        .split('\n')
        .skip(start_line as usize)
        .take(end_line.saturating_sub(start_line) as usize)
        .collect();

    let indent = common_indent(&lines);
    let mut snippet = String::new();
    for (i, line) in lines.iter().enumerate() {
        if i > 0 {
            snippet.push('\n');
        }
        let line = line.strip_suffix('\r').unwrap_or(line);
        snippet.push_str(line.strip_prefix(indent).unwrap_or(""));
    }

    let frame = StageFrame::region(start_line, 0)
        .with_indent(indent)
        .with_line_count(lines.len() as u32);
    (snippet, frame)
}

fn common_indent<'a>(lines: &[&'a str]) -> &'a str {
    let mut common: Option<&'a str> = None;
    for line in lines.iter().filter(|l| !l.trim().is_empty()) {
        let indent_len = line.len() - line.trim_start_matches([' ', '\t']).len();
        let indent = &line[..indent_len];
        common = Some(match common {
            None => indent,
            Some(prev) => {
                let shared = prev
                    .bytes()
                    .zip(indent.bytes())
                    .take_while(|(a, b)| a == b)
                    .count();
                &prev[..shared]
            }
        });
    }
    common.unwrap_or("")
}
