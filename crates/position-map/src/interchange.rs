//! The version 3 source map interchange format.
//!
//! Every map handed over by an external transformer is normalized here into
//! a [`PositionMap`]; composed maps leave through [`PositionMap::to_raw`].
//! The base64 VLQ codec itself is the `sourcemap` crate's.

use crate::map::{OriginalLocation, Segment};
use crate::{MapError, MapResult, PositionMap};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;
use sourcemap::{SourceMap, SourceMapBuilder};

/// A version 3 source map document as it appears on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawSourceMap {
    /// Format version, always 3.
    pub version: u32,
    /// Generated file name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// Prefix for every entry of `sources`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_root: Option<String>,
    /// Original file names.
    #[serde(default)]
    pub sources: Vec<Option<String>>,
    /// Original file contents, parallel to `sources`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<Option<String>>>,
    /// Symbol names referenced by segments.
    #[serde(default)]
    pub names: Vec<String>,
    /// Base64 VLQ, delta-encoded segments.
    pub mappings: String,
}

fn resolve_source(root: Option<&str>, source: Option<String>) -> SmolStr {
    let source = source.unwrap_or_default();
    match root {
        Some(root) if !root.is_empty() => {
            if root.ends_with('/') {
                SmolStr::from(format!("{}{}", root, source))
            } else {
                SmolStr::from(format!("{}/{}", root, source))
            }
        }
        _ => SmolStr::from(source),
    }
}

/// Token field value that marks an absent source or name.
const UNSET: u32 = !0;

/// Reject lines whose generated columns step backwards.
///
/// Checked on the raw `mappings` string before decoding so that disorder is
/// reported instead of normalized.
fn check_line_order(mappings: &str) -> MapResult<()> {
    for (line_idx, text) in mappings.split(';').enumerate() {
        let line = line_idx as u32;
        let mut column: i64 = 0;
        for segment in text.split(',').filter(|s| !s.is_empty()) {
            let fields = sourcemap::vlq::parse_vlq_segment(segment)?;
            let Some(&delta) = fields.first() else {
                continue;
            };
            let next = column + delta;
            if next < 0 || next > i64::from(u32::MAX) {
                return Err(MapError::FieldOutOfRange {
                    field: "generated column",
                    line,
                });
            }
            if delta < 0 {
                return Err(MapError::DisorderedSegment {
                    line,
                    column: next as u32,
                    previous: column as u32,
                });
            }
            column = next;
        }
    }
    Ok(())
}

fn decode_lines(raw: &RawSourceMap) -> MapResult<Vec<Vec<Segment>>> {
    if raw.mappings.is_empty() {
        return Ok(Vec::new());
    }
    check_line_order(&raw.mappings)?;

    // sources are resolved here, not by the decoder
    let bare = RawSourceMap {
        source_root: None,
        sources_content: None,
        ..raw.clone()
    };
    let decoded = SourceMap::from_slice(&serde_json::to_vec(&bare)?)?;

    let mut lines: Vec<Vec<Segment>> = vec![Vec::new(); raw.mappings.split(';').count()];
    for token in decoded.tokens() {
        let line = token.get_dst_line();
        let original = match token.get_src_id() {
            UNSET => None,
            source if source as usize >= raw.sources.len() => {
                return Err(MapError::SourceOutOfRange {
                    index: source,
                    count: raw.sources.len(),
                })
            }
            source => {
                let name = match token.get_name_id() {
                    UNSET => None,
                    name if name as usize >= raw.names.len() => {
                        return Err(MapError::NameOutOfRange {
                            index: name,
                            count: raw.names.len(),
                        })
                    }
                    name => Some(name),
                };
                Some(OriginalLocation {
                    source,
                    line: token.get_src_line(),
                    column: token.get_src_col(),
                    name,
                })
            }
        };

        let idx = line as usize;
        if idx >= lines.len() {
            lines.resize_with(idx + 1, Vec::new);
        }
        lines[idx].push(Segment {
            generated_column: token.get_dst_col(),
            original,
        });
    }
    Ok(lines)
}

fn encode(map: &PositionMap) -> MapResult<RawSourceMap> {
    let mut builder = SourceMapBuilder::new(map.file());
    for (idx, source) in map.sources().iter().enumerate() {
        let id = builder.add_source(source.as_str());
        if let Some(content) = map.source_content(idx as u32) {
            builder.set_source_contents(id, Some(content));
        }
    }
    // keep declared name order even for names no segment uses
    for name in map.names() {
        builder.add_name(name.as_str());
    }

    for (generated, segment) in map.iter() {
        match segment.original {
            Some(original) => {
                let source = map
                    .sources()
                    .get(original.source as usize)
                    .map(SmolStr::as_str);
                let name = original.name.and_then(|n| map.name(n));
                builder.add(
                    generated.line,
                    generated.column,
                    original.line,
                    original.column,
                    source,
                    name,
                    false,
                );
            }
            None => {
                builder.add(
                    generated.line,
                    generated.column,
                    UNSET,
                    UNSET,
                    None,
                    None,
                    false,
                );
            }
        }
    }

    let mut json = Vec::new();
    builder.into_sourcemap().to_writer(&mut json)?;
    let mut raw: RawSourceMap = serde_json::from_slice(&json)?;

    // Trailing empty lines carry no token.
    let separators = map
        .line_count()
        .saturating_sub(1)
        .saturating_sub(raw.mappings.matches(';').count());
    raw.mappings.extend(std::iter::repeat(';').take(separators));

    if raw
        .sources_content
        .as_ref()
        .is_some_and(|contents| contents.iter().all(Option::is_none))
    {
        raw.sources_content = None;
    }
    Ok(raw)
}

impl PositionMap {
    /// Decode a v3 document into a map.
    ///
    /// `sourceRoot` is folded into the source names. Segments that are out
    /// of order on their line are rejected like they are by the builder.
    pub fn from_raw(raw: RawSourceMap) -> MapResult<Self> {
        if raw.version != 3 {
            return Err(MapError::UnsupportedVersion(raw.version));
        }

        let lines = decode_lines(&raw)?;

        let root = raw.source_root.as_deref();
        let mut contents = raw.sources_content.unwrap_or_default();
        contents.resize(raw.sources.len(), None);
        let sources: Vec<SmolStr> = raw
            .sources
            .into_iter()
            .map(|s| resolve_source(root, s))
            .collect();
        let names = raw.names.into_iter().map(SmolStr::from).collect();

        let map = PositionMap::from_parts(lines, sources, contents, names, raw.file.map(Into::into));
        tracing::debug!(
            lines = map.line_count(),
            segments = map.len(),
            "decoded source map"
        );
        Ok(map)
    }

    /// Parse and decode a v3 JSON document.
    pub fn from_json(json: &str) -> MapResult<Self> {
        let raw: RawSourceMap = serde_json::from_str(json)?;
        Self::from_raw(raw)
    }

    /// Encode the map as a v3 document.
    ///
    /// Segments that share a generated column are not guaranteed to keep
    /// their relative order.
    pub fn to_raw(&self) -> MapResult<RawSourceMap> {
        encode(self)
    }

    /// Encode the map as a v3 JSON document.
    pub fn to_json(&self) -> MapResult<String> {
        Ok(serde_json::to_string(&self.to_raw()?)?)
    }
}
