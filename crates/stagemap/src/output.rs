//! Output formatting for traces and maps.

use crate::cli::OutputFormat;
use position_map::{Position, PositionMap, Segment};
use std::fmt::Write as _;

/// Direction of a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Final output to original document.
    Backward,
    /// Original document to final output.
    Forward,
}

impl Direction {
    /// Get the direction as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backward => "backward",
            Self::Forward => "forward",
        }
    }
}

/// The outcome of tracing one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceResult {
    /// The queried position.
    pub from: Position,
    /// The mapped position, or `None` if unmapped.
    pub to: Option<Position>,
}

/// Counts reported after a trace run.
#[derive(Debug, Default)]
pub struct TraceSummary {
    /// Number of positions traced.
    pub traced: usize,
    /// Number of positions that did not map.
    pub unmapped: usize,
    /// Time taken.
    pub duration_ms: u64,
}

/// Formatter for command output.
pub struct OutputFormatter {
    format: OutputFormat,
    one_based: bool,
}

impl OutputFormatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            one_based: false,
        }
    }

    /// Print positions 1-based.
    pub fn with_one_based(mut self, one_based: bool) -> Self {
        self.one_based = one_based;
        self
    }

    /// Print one trace result.
    pub fn print_trace(&self, direction: Direction, result: &TraceResult) {
        println!("{}", self.format_trace(direction, result));
    }

    /// Print the summary of a trace run.
    pub fn print_trace_summary(&self, summary: &TraceSummary) {
        match self.format {
            OutputFormat::Human => {
                println!();
                if summary.unmapped == 0 {
                    println!(
                        "\x1b[32m✓\x1b[0m Traced {} position{} ({}ms)",
                        summary.traced,
                        plural(summary.traced),
                        summary.duration_ms
                    );
                } else {
                    println!(
                        "\x1b[33m⚠\x1b[0m {} of {} position{} unmapped ({}ms)",
                        summary.unmapped,
                        summary.traced,
                        plural(summary.traced),
                        summary.duration_ms
                    );
                }
            }
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "type": "summary",
                    "traced": summary.traced,
                    "unmapped": summary.unmapped,
                    "duration_ms": summary.duration_ms
                });
                println!("{}", json);
            }
        }
    }

    /// Print one segment of a map.
    pub fn print_segment(&self, map: &PositionMap, generated: Position, segment: &Segment) {
        println!("{}", self.format_segment(map, generated, segment));
    }

    /// Print the header of `inspect`.
    pub fn print_map_summary(&self, map: &PositionMap) {
        match self.format {
            OutputFormat::Human => {
                let mut header = format!(
                    "{} line{}, {} segment{}",
                    map.line_count(),
                    plural(map.line_count()),
                    map.len(),
                    plural(map.len())
                );
                if let Some(file) = map.file() {
                    let _ = write!(header, " in {file}");
                }
                println!("{header}");
                for (idx, source) in map.sources().iter().enumerate() {
                    println!("  source {idx}: {source}");
                }
            }
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "type": "map",
                    "file": map.file(),
                    "lines": map.line_count(),
                    "segments": map.len(),
                    "sources": map.sources(),
                    "names": map.names()
                });
                println!("{}", json);
            }
        }
    }

    /// Print the result of `compose`.
    pub fn print_composed(&self, map: &PositionMap, stages: usize, out: Option<&str>) {
        let unmapped = map.iter().filter(|(_, s)| s.original.is_none()).count();
        match self.format {
            OutputFormat::Human => {
                let target = out.map(|o| format!(" into {o}")).unwrap_or_default();
                eprintln!(
                    "Composed {} stage{}{}: {} segment{}, {} unmapped",
                    stages,
                    plural(stages),
                    target,
                    map.len(),
                    plural(map.len()),
                    unmapped
                );
            }
            OutputFormat::Json => {
                let json = serde_json::json!({
                    "type": "composed",
                    "stages": stages,
                    "segments": map.len(),
                    "unmapped": unmapped,
                    "out": out
                });
                eprintln!("{}", json);
            }
        }
    }

    fn position(&self, position: Position) -> (u32, u32) {
        if self.one_based {
            position.to_one_based()
        } else {
            (position.line, position.column)
        }
    }

    fn format_trace(&self, direction: Direction, result: &TraceResult) -> String {
        let (from_line, from_column) = self.position(result.from);
        let to = result.to.map(|p| self.position(p));
        match self.format {
            OutputFormat::Human => match to {
                Some((line, column)) => format!("{from_line}:{from_column} -> {line}:{column}"),
                None => format!("{from_line}:{from_column} -> \x1b[33munmapped\x1b[0m"),
            },
            OutputFormat::Json => serde_json::json!({
                "type": "trace",
                "direction": direction.as_str(),
                "from": { "line": from_line, "column": from_column },
                "to": to.map(|(line, column)| serde_json::json!({ "line": line, "column": column }))
            })
            .to_string(),
        }
    }

    fn format_segment(&self, map: &PositionMap, generated: Position, segment: &Segment) -> String {
        let Some(original) = segment.original else {
            return match self.format {
                OutputFormat::Human => format!("{generated} -> unmapped"),
                OutputFormat::Json => serde_json::json!({
                    "type": "segment",
                    "generated": generated,
                    "original": null
                })
                .to_string(),
            };
        };
        let source = map
            .sources()
            .get(original.source as usize)
            .map(|s| s.as_str())
            .unwrap_or("?");
        let name = original.name.and_then(|n| map.name(n));
        match self.format {
            OutputFormat::Human => {
                let mut line = format!("{generated} -> {source} {}", original.position());
                if let Some(name) = name {
                    let _ = write!(line, " ({name})");
                }
                line
            }
            OutputFormat::Json => serde_json::json!({
                "type": "segment",
                "generated": generated,
                "original": {
                    "source": source,
                    "line": original.line,
                    "column": original.column,
                    "name": name
                }
            })
            .to_string(),
        }
    }
}

fn plural(count: usize) -> &'static str {
    if count == 1 {
        ""
    } else {
        "s"
    }
}
