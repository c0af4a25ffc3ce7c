//! End-to-end behaviour of chains built by running real stages.

use map_chain::{
    compose, trace_backward, ChainError, Compiled, DocumentMapper, DocumentVersion, MappingChain,
    Pipeline, PreambleStage, RegionStage, Transformer, UpstreamTransformError,
};
use position_map::{CodeBuilder, Position};
use pretty_assertions::assert_eq;
use std::sync::Arc;

/// Rewrites `let name = expr` into `var name = expr;`.
struct LetToVar;

impl Transformer for LetToVar {
    fn name(&self) -> &str {
        "let-to-var"
    }

    fn compile(&self, source: &str) -> Result<Compiled, UpstreamTransformError> {
        let mut builder = CodeBuilder::with_source("snippet", Some(source));
        let mut offset = 0usize;
        for (idx, line) in source.split('\n').enumerate() {
            let line_no = idx as u32;
            if idx > 0 {
                builder.newline();
            }
            if let Some(rest) = line.strip_prefix("let ") {
                let Some((name, expr)) = rest.split_once(" = ") else {
                    return Err(UpstreamTransformError::at_offset(
                        self.name(),
                        source,
                        (offset + line.len()) as u32,
                        "expected `=`",
                    ));
                };
                builder.push_str("var ");
                builder.push_named(name, Position::new(line_no, 4), Some(name));
                builder.push_str(" = ");
                builder.push_mapped(expr, Position::new(line_no, 4 + name.len() as u32 + 3));
                builder.push_str(";");
            } else if !line.is_empty() {
                builder.push_verbatim(line, Position::new(line_no, 0));
            }
            offset += line.len() + 1;
        }
        let (text, map) = builder.finish();
        Ok(Compiled::mapped(text, map).with_one_to_one(true))
    }
}

const HOST: &str = "title\n<script>\n  let count = 1\n  let next = count + 1\n</script>\n";

fn full_pipeline() -> Pipeline {
    Pipeline::new()
        .stage(RegionStage::new(2, 4))
        .stage(LetToVar)
        .stage(PreambleStage::new("\"use strict\";"))
}

#[test]
fn embedded_script_round_trip() {
    let output = full_pipeline().run(HOST).unwrap();
    assert_eq!(
        output.text,
        "\"use strict\";\nvar count = 1;\nvar next = count + 1;"
    );

    // `count` inside the second initializer
    assert_eq!(
        output.chain.to_original(Position::new(2, 11)),
        Some(Position::new(3, 13))
    );
    // `+` reached through the residual of a one-to-one token
    assert_eq!(
        output.chain.to_original(Position::new(2, 17)),
        Some(Position::new(3, 19))
    );
    assert_eq!(
        output.chain.to_generated(Position::new(3, 13)),
        Some(Position::new(2, 11))
    );

    // synthesized text is unmapped
    assert_eq!(output.chain.to_original(Position::new(0, 4)), None);
    assert_eq!(output.chain.to_original(Position::new(2, 1)), None);
    assert_eq!(output.chain.to_original(Position::new(2, 20)), None);
}

#[test]
fn composition_is_monotonic_for_single_pass_stages() {
    let output = full_pipeline().run(HOST).unwrap();
    for line in 0..3 {
        let mut previous: Option<Position> = None;
        for column in 0..24 {
            if let Some(original) = output.chain.to_original(Position::new(line, column)) {
                if let Some(prev) = previous {
                    assert!(prev <= original, "{prev} > {original} at {line}:{column}");
                }
                previous = Some(original);
            }
        }
    }
}

#[test]
fn composed_map_agrees_with_chain() {
    let output = Pipeline::new()
        .stage(RegionStage::new(2, 4))
        .stage(LetToVar)
        .run(HOST)
        .unwrap();
    let composed = compose(&output.chain).unwrap();
    assert!(!composed.is_empty());
    for (generated, segment) in composed.iter() {
        assert_eq!(
            trace_backward(generated, &output.chain),
            segment.original.map(|o| o.position()),
            "at {generated}"
        );
    }
    let names: Vec<&str> = composed.names().iter().map(|n| n.as_str()).collect();
    assert_eq!(names, ["count", "next"]);

    let json = composed.to_json().unwrap();
    let decoded = position_map::PositionMap::from_json(&json).unwrap();
    assert_eq!(decoded.lines(), composed.lines());
}

#[test]
fn upstream_error_is_reported_in_stage_coordinates() {
    let host = "title\n<script>\n  let ok = 1\n  let broken\n</script>\n";
    let err = full_pipeline().run(host).unwrap_err();
    match err {
        ChainError::Upstream(err) => {
            assert_eq!(err.stage.as_str(), "let-to-var");
            // line 1 of the dedented snippet, not line 3 of the host
            assert_eq!((err.line, err.column), (1, 10));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn queries_race_with_replacement() {
    fn shifted(lines: u32) -> MappingChain {
        Pipeline::new()
            .stage(PreambleStage::new(&"//\n".repeat(lines as usize)))
            .run("x")
            .unwrap()
            .chain
    }

    let mapper = Arc::new(DocumentMapper::new(DocumentVersion(1), shifted(1)));
    std::thread::scope(|scope| {
        for _ in 0..4 {
            let mapper = Arc::clone(&mapper);
            scope.spawn(move || {
                for _ in 0..500 {
                    let version = mapper.version();
                    let generated = Position::new(version.0 as u32, 0);
                    match mapper.to_original(version, generated) {
                        Ok(original) => assert_eq!(original, Some(Position::new(0, 0))),
                        Err(ChainError::StaleVersion { .. }) => {}
                        Err(other) => panic!("unexpected error: {other}"),
                    }
                }
            });
        }
        for version in 2..=50u64 {
            mapper.replace(DocumentVersion(version), shifted(version as u32)).unwrap();
        }
    });
    assert_eq!(mapper.version(), DocumentVersion(50));
    assert!(matches!(
        mapper.to_original(DocumentVersion(49), Position::new(0, 0)),
        Err(ChainError::StaleVersion { .. })
    ));
}
