//! Orchestrator for running commands.

use crate::cli::{parse_position, Args, BiasArg, Command};
use crate::config::{load_map_file, Config};
use crate::output::{Direction, OutputFormatter, TraceResult, TraceSummary};
use map_chain::{compose, DocumentMapper};
use miette::{IntoDiagnostic, Result, WrapErr};
use position_map::{Bias, Position};
use rayon::prelude::*;
use std::path::Path;
use std::process::ExitCode;
use std::time::Instant;

/// Orchestrator for running stagemap.
pub struct Orchestrator {
    /// CLI arguments.
    args: Args,
}

impl Orchestrator {
    /// Create a new orchestrator.
    pub fn new(args: Args) -> Self {
        Self { args }
    }

    /// Run the selected command.
    pub fn run(&self) -> Result<ExitCode> {
        let start = Instant::now();
        match &self.args.command {
            Command::Trace {
                manifest,
                at,
                forward,
                one_based,
                bias,
            } => {
                let direction = if *forward {
                    Direction::Forward
                } else {
                    Direction::Backward
                };
                let positions = at
                    .iter()
                    .map(|text| parse_position(text, *one_based))
                    .collect::<std::result::Result<Vec<_>, _>>()
                    .map_err(|message| miette::miette!("{message}"))?;

                let formatter = OutputFormatter::new(self.args.output).with_one_based(*one_based);
                let results = self.trace(manifest, &positions, direction, *bias)?;
                for result in &results {
                    formatter.print_trace(direction, result);
                }
                formatter.print_trace_summary(&TraceSummary {
                    traced: results.len(),
                    unmapped: results.iter().filter(|r| r.to.is_none()).count(),
                    duration_ms: start.elapsed().as_millis() as u64,
                });
            }
            Command::Compose { manifest, out } => self.compose(manifest, out.as_deref())?,
            Command::Inspect { map, line } => self.inspect(map, *line)?,
        }

        if self.args.timings {
            eprintln!("\nTiming: {}ms", start.elapsed().as_millis());
        }
        Ok(ExitCode::SUCCESS)
    }

    /// Trace every position through the manifest's chain.
    fn trace(
        &self,
        manifest: &Path,
        positions: &[Position],
        direction: Direction,
        bias: Option<BiasArg>,
    ) -> Result<Vec<TraceResult>> {
        let config = Config::load(manifest)?;
        let chain = config.build_chain()?;
        if self.args.verbose > 0 {
            eprintln!("Loaded {} stages from {}", chain.len(), config.path);
        }

        let version = config.version();
        let mapper = DocumentMapper::new(version, chain);

        positions
            .par_iter()
            .map(|&position| -> Result<TraceResult> {
                let to = match direction {
                    Direction::Backward => mapper.to_original_with(
                        version,
                        position,
                        bias.map_or(Bias::NearestPreceding, Bias::from),
                    ),
                    Direction::Forward => mapper.to_generated_with(
                        version,
                        position,
                        bias.map_or(Bias::NearestFollowing, Bias::from),
                    ),
                }
                .into_diagnostic()?;
                Ok(TraceResult { from: position, to })
            })
            .collect()
    }

    /// Flatten the manifest's chain and write the result.
    fn compose(&self, manifest: &Path, out: Option<&Path>) -> Result<()> {
        let config = Config::load(manifest)?;
        let chain = config.build_chain()?;
        let composed = compose(&chain)
            .into_diagnostic()
            .wrap_err_with(|| format!("Failed to compose {}", config.path))?;
        let json = composed.to_json().into_diagnostic()?;

        let formatter = OutputFormatter::new(self.args.output);
        match out {
            Some(out) => {
                std::fs::write(out, &json)
                    .into_diagnostic()
                    .wrap_err_with(|| format!("Failed to write {}", out.display()))?;
                let target = out.display().to_string();
                formatter.print_composed(&composed, chain.len(), Some(&target));
            }
            None => {
                println!("{json}");
                formatter.print_composed(&composed, chain.len(), None);
            }
        }
        Ok(())
    }

    /// Print the segments of a map file.
    fn inspect(&self, path: &Path, line: Option<u32>) -> Result<()> {
        let map = load_map_file(path)?;
        let formatter = OutputFormatter::new(self.args.output);
        formatter.print_map_summary(&map);
        for (generated, segment) in map.iter() {
            if line.is_some_and(|l| l != generated.line) {
                continue;
            }
            formatter.print_segment(&map, generated, segment);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::OutputFormat;
    use pretty_assertions::assert_eq;
    use std::fs;

    fn orchestrator(command: Command) -> Orchestrator {
        Orchestrator::new(Args {
            command,
            output: OutputFormat::Json,
            verbose: 0,
            timings: false,
        })
    }

    fn write_fixture(dir: &Path) -> std::path::PathBuf {
        fs::write(
            dir.join("stage1.map"),
            r#"{"version":3,"sources":["snippet.js"],"names":["x"],"mappings":";UAAKA,G"}"#,
        )
        .unwrap();
        let manifest = dir.join("stagemap.json");
        fs::write(
            &manifest,
            r#"{
                "stages": [
                    { "map": "stage1.map" },
                    { "identity": true, "frame": { "startLine": 3, "strippedIndent": "  " } }
                ]
            }"#,
        )
        .unwrap();
        manifest
    }

    #[test]
    fn test_trace_both_directions() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_fixture(dir.path());
        let cmd = orchestrator(Command::Compose {
            manifest: manifest.clone(),
            out: None,
        });

        let backward = cmd
            .trace(
                &manifest,
                &[Position::new(1, 10), Position::new(1, 13), Position::new(0, 0)],
                Direction::Backward,
                None,
            )
            .unwrap();
        let to: Vec<_> = backward.iter().map(|r| r.to).collect();
        assert_eq!(to, vec![Some(Position::new(3, 7)), None, None]);

        let forward = cmd
            .trace(&manifest, &[Position::new(3, 7)], Direction::Forward, None)
            .unwrap();
        assert_eq!(forward[0].to, Some(Position::new(1, 10)));
    }

    #[test]
    fn test_trace_with_explicit_bias() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_fixture(dir.path());
        let cmd = orchestrator(Command::Compose {
            manifest: manifest.clone(),
            out: None,
        });
        let results = cmd
            .trace(
                &manifest,
                &[Position::new(1, 4)],
                Direction::Backward,
                Some(BiasArg::Following),
            )
            .unwrap();
        assert_eq!(results[0].to, Some(Position::new(3, 7)));
    }

    #[test]
    fn test_compose_writes_map() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = write_fixture(dir.path());
        let out = dir.path().join("composed.map");
        let cmd = orchestrator(Command::Compose {
            manifest: manifest.clone(),
            out: Some(out.clone()),
        });
        cmd.run().unwrap();

        let composed = load_map_file(&out).unwrap();
        assert_eq!(composed.sources()[0].as_str(), "snippet.js");
        let raw = composed.to_raw().unwrap();
        assert_eq!(raw.mappings, ";UAGOA,G");
    }

    #[test]
    fn test_inspect_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let cmd = orchestrator(Command::Inspect {
            map: dir.path().join("missing.map"),
            line: None,
        });
        assert!(cmd.run().is_err());
    }
}
