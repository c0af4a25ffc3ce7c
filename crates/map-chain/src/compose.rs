//! End-to-end position tracing across a chain.
//!
//! Backward and forward traces are independent walks that share only the
//! per-stage hop logic of [`ChainEntry`]. Mapping is lossy, so they are not
//! exact inverses of each other.

use crate::{ChainEntry, ChainError, ChainResult, MappingChain, StageMap};
use position_map::{Bias, MapBuilder, Position, PositionMap};

/// Trace a position in the final generated text back to the original
/// document, resolving inexact hits to the nearest preceding token.
pub fn trace_backward(position: Position, chain: &MappingChain) -> Option<Position> {
    trace_backward_with(position, chain, Bias::NearestPreceding)
}

/// Trace a position in the final generated text back to the original
/// document with an explicit bias.
///
/// Stops at the first stage that cannot map the position; no stage is
/// skipped.
pub fn trace_backward_with(
    position: Position,
    chain: &MappingChain,
    bias: Bias,
) -> Option<Position> {
    walk_backward(chain.entries(), position, bias)
}

fn walk_backward(entries: &[ChainEntry], position: Position, bias: Bias) -> Option<Position> {
    let mut current = position;
    for (hop, entry) in entries.iter().enumerate() {
        match entry.to_original(current, bias) {
            Some(next) => current = next,
            None => {
                tracing::trace!(
                    hop,
                    stage = entry.name(),
                    map = entry.map.kind(),
                    %current,
                    "backward trace unmapped"
                );
                return None;
            }
        }
    }
    Some(current)
}

/// Trace a position in the original document forward to the final
/// generated text, resolving inexact hits to the nearest following token.
pub fn trace_forward(position: Position, chain: &MappingChain) -> Option<Position> {
    trace_forward_with(position, chain, Bias::NearestFollowing)
}

/// Trace a position in the original document forward to the final
/// generated text with an explicit bias.
pub fn trace_forward_with(position: Position, chain: &MappingChain, bias: Bias) -> Option<Position> {
    let mut current = position;
    for (hop, entry) in chain.entries().iter().enumerate().rev() {
        match entry.to_generated(current, bias) {
            Some(next) => current = next,
            None => {
                tracing::trace!(
                    hop,
                    stage = entry.name(),
                    map = entry.map.kind(),
                    %current,
                    "forward trace unmapped"
                );
                return None;
            }
        }
    }
    Some(current)
}

/// Flatten a chain into a single final → original position map.
///
/// Every segment of the final stage's map is traced through the rest of the
/// chain; segments that do not resolve become unmapped segments. The source
/// name and content come from the deepest stage that recorded a map.
pub fn compose(chain: &MappingChain) -> ChainResult<PositionMap> {
    let (first, rest) = chain
        .entries()
        .split_first()
        .ok_or(ChainError::NotComposable("the chain has no stages"))?;
    let StageMap::Mapped(final_map) = &first.map else {
        return Err(ChainError::NotComposable(
            "the final stage did not record a position map",
        ));
    };

    let (source_name, source_content) = chain
        .entries()
        .iter()
        .rev()
        .find_map(|entry| {
            let map = entry.map.as_map()?;
            let name = map.sources().get(entry.source_index as usize)?;
            Some((name.clone(), map.source_content(entry.source_index)))
        })
        .unwrap_or_default();

    let mut builder = MapBuilder::new();
    if let Some(file) = final_map.file() {
        builder = builder.with_file(file);
    }
    builder.add_source(source_name, source_content);

    let mut resolved_count = 0usize;
    for (local, segment) in final_map.iter() {
        let Some(generated) = first.frame.wrap_generated(local) else {
            continue;
        };
        let resolved = segment
            .original
            .filter(|original| original.source == first.source_index)
            .and_then(|original| {
                let host = first.frame.to_host_space(original.position())?;
                walk_backward(rest, host, Bias::NearestPreceding)
                    .map(|position| (position, original.name))
            });

        match resolved {
            Some((position, name)) => {
                let name = name.and_then(|n| final_map.name(n));
                builder.add_mapping(generated, position, name)?;
                resolved_count += 1;
            }
            None => builder.add_unmapped(generated)?,
        }
    }

    tracing::debug!(
        stages = chain.len(),
        segments = final_map.len(),
        resolved = resolved_count,
        "composed chain"
    );
    Ok(builder.build())
}

#[cfg(test)]
mod tests {
    use super::*;
    use position_map::StageFrame;
    use pretty_assertions::assert_eq;

    fn map_of(pairs: &[((u32, u32), (u32, u32))]) -> PositionMap {
        let mut builder = MapBuilder::new();
        builder.add_source("stage-input", None);
        for &(generated, original) in pairs {
            builder
                .add_mapping(generated.into(), original.into(), None)
                .unwrap();
        }
        builder.build()
    }

    #[test]
    fn test_embedded_snippet_scenario() {
        let stage1 = map_of(&[((1, 10), (0, 5))]);
        let chain = MappingChain::new(vec![
            ChainEntry::mapped(stage1),
            ChainEntry::identity().with_frame(StageFrame::region(3, 0).with_indent("  ")),
        ]);
        assert_eq!(
            trace_backward(Position::new(1, 10), &chain),
            Some(Position::new(3, 7))
        );
        assert_eq!(
            trace_forward(Position::new(3, 7), &chain),
            Some(Position::new(1, 10))
        );
    }

    #[test]
    fn test_missing_middle_stage_is_unmapped() {
        let chain = MappingChain::new(vec![
            ChainEntry::mapped(map_of(&[((0, 0), (0, 0))])),
            ChainEntry::missing(),
            ChainEntry::identity(),
        ]);
        assert_eq!(trace_backward(Position::new(0, 0), &chain), None);
        assert_eq!(trace_forward(Position::new(0, 0), &chain), None);
    }

    #[test]
    fn test_line_unmapped_in_middle_stage() {
        let chain = MappingChain::new(vec![
            ChainEntry::mapped(map_of(&[((0, 0), (2, 0)), ((1, 0), (0, 0))])),
            ChainEntry::mapped(map_of(&[((0, 0), (5, 5))])),
        ]);
        assert_eq!(trace_backward(Position::new(1, 3), &chain), Some(Position::new(5, 5)));
        // stage two has nothing recorded on its line 2
        assert_eq!(trace_backward(Position::new(0, 3), &chain), None);
    }

    #[test]
    fn test_empty_chain_is_identity() {
        let chain = MappingChain::default();
        let pos = Position::new(1, 1);
        assert_eq!(trace_backward(pos, &chain), Some(pos));
        assert!(matches!(compose(&chain), Err(ChainError::NotComposable(_))));
    }

    #[test]
    fn test_compose_matches_trace() {
        let chain = MappingChain::new(vec![
            ChainEntry::mapped(map_of(&[((0, 0), (0, 0)), ((0, 8), (1, 2)), ((2, 4), (7, 0))])),
            ChainEntry::mapped(map_of(&[((0, 0), (10, 0)), ((1, 0), (11, 4))])),
        ]);
        let composed = compose(&chain).unwrap();
        for (generated, segment) in composed.iter() {
            let via_chain = trace_backward(generated, &chain);
            let via_composed = segment.original.map(|o| o.position());
            assert_eq!(via_chain, via_composed, "at {generated}");
        }
        assert_eq!(composed.len(), 3);
        assert_eq!(composed.sources()[0].as_str(), "stage-input");
        // (2, 4) -> stage-one line 7, which stage two never recorded
        assert!(composed
            .lookup(Position::new(2, 4), Bias::NearestPreceding)
            .is_none());
    }

    #[test]
    fn test_forward_through_one_to_one_stage_honors_bias() {
        let mut builder = MapBuilder::new();
        builder.add_source("stage-input", None);
        builder
            .add_mapping(Position::new(0, 4), Position::new(0, 4), None)
            .unwrap();
        builder.add_unmapped(Position::new(0, 5)).unwrap();
        builder
            .add_mapping(Position::new(0, 13), Position::new(0, 8), None)
            .unwrap();
        builder.add_unmapped(Position::new(0, 14)).unwrap();
        let chain = MappingChain::new(vec![
            ChainEntry::mapped(builder.build()).with_one_to_one(true),
            ChainEntry::identity().with_frame(StageFrame::region(2, 0).with_indent("  ")),
        ]);

        assert_eq!(
            trace_forward(Position::new(2, 8), &chain),
            Some(Position::new(0, 13))
        );
        assert_eq!(
            trace_forward_with(Position::new(2, 8), &chain, Bias::NearestPreceding),
            Some(Position::new(0, 4))
        );
        assert_eq!(
            trace_backward(Position::new(0, 13), &chain),
            Some(Position::new(2, 10))
        );
    }

    #[test]
    fn test_column_overflow_is_unmapped() {
        let chain = MappingChain::new(vec![
            ChainEntry::mapped(map_of(&[((0, 0), (0, u32::MAX - 1))])),
            ChainEntry::identity().with_frame(StageFrame::region(3, 0).with_indent("  ")),
        ]);
        assert_eq!(trace_backward(Position::new(0, 0), &chain), None);
        let composed = compose(&chain).unwrap();
        assert!(composed
            .lookup(Position::new(0, 0), Bias::NearestPreceding)
            .is_none());
    }

    #[test]
    fn test_compose_requires_final_map() {
        let chain = MappingChain::new(vec![ChainEntry::identity()]);
        assert!(matches!(compose(&chain), Err(ChainError::NotComposable(_))));
    }
}
