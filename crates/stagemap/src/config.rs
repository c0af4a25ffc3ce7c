//! Chain manifest loading.
//!
//! A manifest lists the stages of one document's chain, final stage first:
//!
//! ```json
//! {
//!   "version": 7,
//!   "missingAsIdentity": false,
//!   "stages": [
//!     { "map": "out/app.js.map", "label": "bundle" },
//!     { "identity": true, "frame": { "startLine": 12, "strippedIndent": "  " } }
//!   ]
//! }
//! ```
//!
//! Map paths are resolved relative to the manifest.

use camino::{Utf8Path, Utf8PathBuf};
use map_chain::{ChainEntry, DocumentVersion, MappingChain, StageMap};
use miette::Diagnostic;
use position_map::{PositionMap, StageFrame};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading a manifest or the maps it names.
#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("failed to read {path}")]
    #[diagnostic(code(stagemap::config::read))]
    Read {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest {path}")]
    #[diagnostic(code(stagemap::config::parse))]
    Parse {
        path: Utf8PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid source map {path}")]
    #[diagnostic(code(stagemap::config::map))]
    Map {
        path: Utf8PathBuf,
        #[source]
        source: position_map::MapError,
    },

    #[error("stage {index}: {reason}")]
    #[diagnostic(
        code(stagemap::config::stage),
        help("each stage needs either a `map` path or `\"identity\": true`")
    )]
    InvalidStage { index: usize, reason: &'static str },

    #[error("path is not valid UTF-8: {0}")]
    #[diagnostic(code(stagemap::config::path))]
    NonUtf8Path(String),
}

/// One stage in a manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSpec {
    /// Path to the stage's v3 map, relative to the manifest.
    #[serde(default)]
    pub map: Option<Utf8PathBuf>,
    /// The stage copies its input unchanged.
    #[serde(default)]
    pub identity: bool,
    /// Placement of the stage's input and output.
    #[serde(default)]
    pub frame: StageFrame,
    /// Mapped tokens correspond character by character.
    #[serde(default)]
    pub one_to_one: bool,
    /// Index of the map source that is the stage's input.
    #[serde(default)]
    pub source: u32,
    /// Stage name used in logs.
    #[serde(default)]
    pub label: Option<String>,
}

/// A chain manifest (`stagemap.json`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    /// Document version the maps were built for.
    #[serde(default)]
    pub version: u64,
    /// Treat stages without a map as identity stages.
    #[serde(default)]
    pub missing_as_identity: bool,
    /// Stages, final stage first.
    #[serde(default)]
    pub stages: Vec<StageSpec>,
}

/// A manifest together with the directory its paths are relative to.
#[derive(Debug, Clone)]
pub struct Config {
    /// Path of the manifest file.
    pub path: Utf8PathBuf,
    /// Directory map paths resolve against.
    pub base_dir: Utf8PathBuf,
    /// The parsed manifest.
    pub manifest: Manifest,
}

impl Config {
    /// Load a manifest from a path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let path = utf8(path)?;
        let content = read(&path)?;
        let manifest: Manifest =
            serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
                path: path.clone(),
                source,
            })?;

        let base_dir = path
            .parent()
            .map(Utf8Path::to_path_buf)
            .unwrap_or_else(|| Utf8PathBuf::from("."));
        tracing::debug!(%path, stages = manifest.stages.len(), "loaded manifest");

        Ok(Self {
            path,
            base_dir,
            manifest,
        })
    }

    /// Get the document version.
    pub fn version(&self) -> DocumentVersion {
        DocumentVersion(self.manifest.version)
    }

    /// Resolve a path from the manifest.
    pub fn resolve(&self, path: &Utf8Path) -> Utf8PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Load every stage map and build the chain.
    pub fn build_chain(&self) -> Result<MappingChain, ConfigError> {
        let mut entries = Vec::with_capacity(self.manifest.stages.len());
        for (index, stage) in self.manifest.stages.iter().enumerate() {
            let map = match (&stage.map, stage.identity) {
                (Some(_), true) => {
                    return Err(ConfigError::InvalidStage {
                        index,
                        reason: "a stage cannot have both a map and `identity`",
                    })
                }
                (Some(map), false) => StageMap::from(self.load_map(map)?),
                (None, true) => StageMap::Identity,
                (None, false) if self.manifest.missing_as_identity => StageMap::Identity,
                (None, false) => StageMap::Missing,
            };

            let mut entry = ChainEntry::new(map)
                .with_frame(stage.frame.clone())
                .with_source(stage.source)
                .with_one_to_one(stage.one_to_one || stage.identity);
            if let Some(label) = &stage.label {
                entry = entry.with_label(label.as_str());
            }
            entries.push(entry);
        }
        Ok(MappingChain::new(entries))
    }

    fn load_map(&self, path: &Utf8Path) -> Result<PositionMap, ConfigError> {
        let path = self.resolve(path);
        let content = read(&path)?;
        PositionMap::from_json(&content).map_err(|source| ConfigError::Map { path, source })
    }
}

/// Load a v3 map file.
pub fn load_map_file(path: &Path) -> Result<PositionMap, ConfigError> {
    let path = utf8(path)?;
    let content = read(&path)?;
    PositionMap::from_json(&content).map_err(|source| ConfigError::Map { path, source })
}

fn utf8(path: &Path) -> Result<Utf8PathBuf, ConfigError> {
    Utf8PathBuf::from_path_buf(path.to_path_buf())
        .map_err(|path| ConfigError::NonUtf8Path(path.display().to_string()))
}

fn read(path: &Utf8Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use position_map::Position;
    use pretty_assertions::assert_eq;
    use std::fs;

    #[test]
    fn test_manifest_defaults() {
        let manifest: Manifest = serde_json::from_str(r#"{ "stages": [{}] }"#).unwrap();
        assert_eq!(manifest.version, 0);
        assert!(!manifest.missing_as_identity);
        assert_eq!(manifest.stages, vec![StageSpec::default()]);
    }

    #[test]
    fn test_build_chain_from_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("maps")).unwrap();
        fs::write(
            dir.path().join("maps/stage1.map"),
            r#"{"version":3,"sources":["snippet.js"],"names":[],"mappings":";UAAK"}"#,
        )
        .unwrap();
        let manifest = dir.path().join("stagemap.json");
        fs::write(
            &manifest,
            r#"{
                "version": 4,
                "stages": [
                    { "map": "maps/stage1.map", "label": "compile" },
                    { "identity": true, "frame": { "startLine": 3, "strippedIndent": "  " } }
                ]
            }"#,
        )
        .unwrap();

        let config = Config::load(&manifest).unwrap();
        assert_eq!(config.version(), DocumentVersion(4));
        let chain = config.build_chain().unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain.entries()[0].name(), "compile");
        assert_eq!(
            chain.to_original(Position::new(1, 10)),
            Some(Position::new(3, 7))
        );
    }

    #[test]
    fn test_stage_without_map() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("stagemap.json");

        fs::write(&manifest, r#"{ "stages": [{}] }"#).unwrap();
        let chain = Config::load(&manifest).unwrap().build_chain().unwrap();
        assert_eq!(chain.entries()[0].map.kind(), "missing");

        fs::write(&manifest, r#"{ "missingAsIdentity": true, "stages": [{}] }"#).unwrap();
        let chain = Config::load(&manifest).unwrap().build_chain().unwrap();
        assert_eq!(chain.entries()[0].map.kind(), "identity");
    }

    #[test]
    fn test_conflicting_stage_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("stagemap.json");
        fs::write(&manifest, r#"{ "stages": [{ "map": "a.map", "identity": true }] }"#).unwrap();
        let err = Config::load(&manifest).unwrap().build_chain().unwrap_err();
        assert!(matches!(err, ConfigError::InvalidStage { index: 0, .. }));
    }

    #[test]
    fn test_missing_map_file() {
        let dir = tempfile::tempdir().unwrap();
        let manifest = dir.path().join("stagemap.json");
        fs::write(&manifest, r#"{ "stages": [{ "map": "nope.map" }] }"#).unwrap();
        let err = Config::load(&manifest).unwrap().build_chain().unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
