//! Transformation stages and the pipeline that chains their maps.

use crate::{
    ChainEntry, ChainError, ChainResult, DocumentMapper, DocumentVersion, MappingChain, StageMap,
    UpstreamTransformError,
};
use position_map::{extract_region, PositionMap, StageFrame};

/// The output of one stage.
#[derive(Debug, Clone)]
pub struct Compiled {
    /// Generated text, the input of the next stage.
    pub text: String,
    /// Generated → input mapping.
    pub mapping: StageMap,
    /// Placement of the stage's input and output.
    pub frame: StageFrame,
    /// Whether mapped tokens correspond character by character.
    pub one_to_one: bool,
}

impl Compiled {
    /// Output with a recorded position map.
    pub fn mapped(text: impl Into<String>, map: PositionMap) -> Self {
        Self {
            text: text.into(),
            mapping: StageMap::from(map),
            frame: StageFrame::identity(),
            one_to_one: false,
        }
    }

    /// Output that copies its input character for character.
    pub fn identity(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mapping: StageMap::Identity,
            frame: StageFrame::identity(),
            one_to_one: true,
        }
    }

    /// Output for which the stage recorded no mapping.
    pub fn unmapped(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            mapping: StageMap::Missing,
            frame: StageFrame::identity(),
            one_to_one: false,
        }
    }

    /// Set the frame.
    pub fn with_frame(mut self, frame: StageFrame) -> Self {
        self.frame = frame;
        self
    }

    /// Set whether mapped tokens correspond character by character.
    pub fn with_one_to_one(mut self, one_to_one: bool) -> Self {
        self.one_to_one = one_to_one;
        self
    }
}

/// A single transformation step.
///
/// Implementations parse their input and either produce output together
/// with a mapping, or fail with an error located in their own input.
pub trait Transformer: Send + Sync {
    /// Stage name used in errors and logs.
    fn name(&self) -> &str;

    /// Transform `source`.
    fn compile(&self, source: &str) -> Result<Compiled, UpstreamTransformError>;
}

/// Options for [`Pipeline`].
#[derive(Debug, Clone, Copy, Default)]
pub struct PipelineOptions {
    /// Treat stages that recorded no mapping as identity stages.
    pub missing_as_identity: bool,
}

/// The result of running a pipeline.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Text produced by the last stage.
    pub text: String,
    /// The chain from that text back to the pipeline input.
    pub chain: MappingChain,
}

/// Runs stages in order and assembles their mapping chain.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Transformer>>,
    options: PipelineOptions,
}

impl Pipeline {
    /// Create an empty pipeline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the options.
    pub fn with_options(mut self, options: PipelineOptions) -> Self {
        self.options = options;
        self
    }

    /// Append a stage.
    pub fn stage(mut self, stage: impl Transformer + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Get the number of stages.
    pub fn len(&self) -> usize {
        self.stages.len()
    }

    /// Check if the pipeline has no stages.
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage over `source`.
    ///
    /// The first failing stage aborts the run; its error is returned as
    /// reported, in that stage's own coordinates.
    pub fn run(&self, source: &str) -> ChainResult<PipelineOutput> {
        let mut text = source.to_string();
        let mut entries = Vec::with_capacity(self.stages.len());

        for stage in &self.stages {
            let compiled = stage.compile(&text).map_err(|err| {
                tracing::warn!(stage = stage.name(), error = %err, "stage failed");
                ChainError::Upstream(err)
            })?;

            let mapping = match compiled.mapping {
                StageMap::Missing if self.options.missing_as_identity => StageMap::Identity,
                mapping => mapping,
            };
            tracing::debug!(
                stage = stage.name(),
                map = mapping.kind(),
                output_len = compiled.text.len(),
                "stage compiled"
            );

            entries.push(
                ChainEntry::new(mapping)
                    .with_frame(compiled.frame)
                    .with_one_to_one(compiled.one_to_one)
                    .with_label(stage.name()),
            );
            text = compiled.text;
        }

        Ok(PipelineOutput {
            text,
            chain: MappingChain::from_pipeline_order(entries),
        })
    }

    /// Rerun the pipeline for a new document version and install the
    /// resulting chain in `mapper`.
    ///
    /// On failure the mapper keeps its previous chain.
    pub fn refresh(
        &self,
        mapper: &DocumentMapper,
        version: DocumentVersion,
        source: &str,
    ) -> ChainResult<String> {
        let output = self.run(source)?;
        mapper.replace(version, output.chain)?;
        Ok(output.text)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field(
                "stages",
                &self.stages.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .field("options", &self.options)
            .finish()
    }
}

/// Extracts whole lines `[start_line, end_line)` of its input and strips
/// their common indentation.
#[derive(Debug, Clone, Copy)]
pub struct RegionStage {
    /// First extracted line.
    pub start_line: u32,
    /// Line after the last extracted line.
    pub end_line: u32,
}

impl RegionStage {
    /// Create a region stage.
    pub fn new(start_line: u32, end_line: u32) -> Self {
        Self {
            start_line,
            end_line,
        }
    }
}

impl Transformer for RegionStage {
    fn name(&self) -> &str {
        "region"
    }

    fn compile(&self, source: &str) -> Result<Compiled, UpstreamTransformError> {
        let line_count = source.split('\n').count() as u32;
        if self.start_line > self.end_line || self.end_line > line_count {
            return Err(UpstreamTransformError::at_offset(
                self.name(),
                source,
                source.len() as u32,
                format!(
                    "region {}..{} is outside the input ({line_count} lines)",
                    self.start_line, self.end_line
                ),
            ));
        }
        let (snippet, frame) = extract_region(source, self.start_line, self.end_line);
        Ok(Compiled::identity(snippet).with_frame(frame))
    }
}

/// Prepends fixed boilerplate lines to its input.
#[derive(Debug, Clone)]
pub struct PreambleStage {
    lines: Vec<String>,
}

impl PreambleStage {
    /// Create a preamble stage; `preamble` is split into lines.
    pub fn new(preamble: &str) -> Self {
        Self {
            lines: preamble.lines().map(str::to_string).collect(),
        }
    }
}

impl Transformer for PreambleStage {
    fn name(&self) -> &str {
        "preamble"
    }

    fn compile(&self, source: &str) -> Result<Compiled, UpstreamTransformError> {
        let mut text = String::new();
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text.push_str(source);
        let frame = StageFrame::identity().with_prepended_lines(self.lines.len() as u32);
        Ok(Compiled::identity(text).with_frame(frame))
    }
}
