//! The per-document mapping facade.

use crate::{compose, ChainError, ChainResult, MappingChain};
use parking_lot::RwLock;
use position_map::{Bias, Position};
use std::fmt;
use std::sync::Arc;

/// The version of a document's content, as reported by the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct DocumentVersion(pub u64);

impl fmt::Display for DocumentVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for DocumentVersion {
    fn from(version: u64) -> Self {
        Self(version)
    }
}

/// A chain together with the document version it was built for.
#[derive(Debug, Clone)]
pub struct VersionedChain {
    /// The document version.
    pub version: DocumentVersion,
    /// The chain built from that version.
    pub chain: MappingChain,
}

/// Answers position queries for one open document.
///
/// Holds exactly one current chain. [`replace`](Self::replace) swaps in the
/// chain of a newer version in one step; readers that already hold a
/// snapshot keep using the old chain, new readers see the new one, and no
/// reader ever sees a partially built chain.
#[derive(Debug)]
pub struct DocumentMapper {
    current: RwLock<Arc<VersionedChain>>,
}

impl DocumentMapper {
    /// Create a mapper for the given version and chain.
    pub fn new(version: DocumentVersion, chain: MappingChain) -> Self {
        Self {
            current: RwLock::new(Arc::new(VersionedChain {
                version,
                chain,
            })),
        }
    }

    /// Get the current version.
    pub fn version(&self) -> DocumentVersion {
        self.current.read().version
    }

    /// Get the current chain and its version.
    pub fn snapshot(&self) -> Arc<VersionedChain> {
        Arc::clone(&self.current.read())
    }

    /// Install the chain built for a newer document version.
    ///
    /// A version that is not newer than the current one is rejected as
    /// stale and the current chain stays in place.
    pub fn replace(
        &self,
        version: DocumentVersion,
        chain: MappingChain,
    ) -> ChainResult<()> {
        let next = Arc::new(VersionedChain { version, chain });
        let mut current = self.current.write();
        if version <= current.version {
            return Err(ChainError::StaleVersion {
                requested: version,
                current: current.version,
            });
        }
        tracing::debug!(from = %current.version, to = %version, "replacing mapping chain");
        *current = next;
        Ok(())
    }

    fn checked(&self, version: DocumentVersion) -> ChainResult<Arc<VersionedChain>> {
        let snapshot = self.snapshot();
        if version < snapshot.version {
            tracing::debug!(requested = %version, current = %snapshot.version, "rejecting stale query");
            return Err(ChainError::StaleVersion {
                requested: version,
                current: snapshot.version,
            });
        }
        if version > snapshot.version {
            return Err(ChainError::PendingVersion {
                requested: version,
                current: snapshot.version,
            });
        }
        Ok(snapshot)
    }

    /// Map a position in the final generated text of `version` back to the
    /// original document.
    pub fn to_original(
        &self,
        version: DocumentVersion,
        position: Position,
    ) -> ChainResult<Option<Position>> {
        self.to_original_with(version, position, Bias::NearestPreceding)
    }

    /// Map a position in the final generated text of `version` back to the
    /// original document with an explicit bias.
    pub fn to_original_with(
        &self,
        version: DocumentVersion,
        position: Position,
        bias: Bias,
    ) -> ChainResult<Option<Position>> {
        let snapshot = self.checked(version)?;
        Ok(compose::trace_backward_with(position, &snapshot.chain, bias))
    }

    /// Map a position in the original document of `version` forward to the
    /// final generated text.
    pub fn to_generated(
        &self,
        version: DocumentVersion,
        position: Position,
    ) -> ChainResult<Option<Position>> {
        self.to_generated_with(version, position, Bias::NearestFollowing)
    }

    /// Map a position in the original document of `version` forward to the
    /// final generated text with an explicit bias.
    pub fn to_generated_with(
        &self,
        version: DocumentVersion,
        position: Position,
        bias: Bias,
    ) -> ChainResult<Option<Position>> {
        let snapshot = self.checked(version)?;
        Ok(compose::trace_forward_with(position, &snapshot.chain, bias))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChainEntry;
    use position_map::StageFrame;
    use pretty_assertions::assert_eq;

    fn shifted(lines: u32) -> MappingChain {
        MappingChain::new(vec![
            ChainEntry::identity().with_frame(StageFrame::identity().with_prepended_lines(lines))
        ])
    }

    #[test]
    fn test_query_current_version() {
        let mapper = DocumentMapper::new(DocumentVersion(1), shifted(2));
        assert_eq!(
            mapper.to_original(DocumentVersion(1), Position::new(5, 1)).unwrap(),
            Some(Position::new(3, 1))
        );
        assert_eq!(
            mapper.to_generated(DocumentVersion(1), Position::new(3, 1)).unwrap(),
            Some(Position::new(5, 1))
        );
        assert_eq!(mapper.to_original(DocumentVersion(1), Position::new(0, 1)).unwrap(), None);
    }

    #[test]
    fn test_stale_version_rejected_after_replace() {
        let mapper = DocumentMapper::new(DocumentVersion(1), shifted(2));
        mapper.replace(DocumentVersion(2), shifted(4)).unwrap();
        assert_eq!(mapper.version(), DocumentVersion(2));

        let err = mapper.to_original(DocumentVersion(1), Position::new(5, 1)).unwrap_err();
        assert!(matches!(
            err,
            ChainError::StaleVersion {
                requested: DocumentVersion(1),
                current: DocumentVersion(2)
            }
        ));
        assert_eq!(
            mapper.to_original(DocumentVersion(2), Position::new(5, 1)).unwrap(),
            Some(Position::new(1, 1))
        );
    }

    #[test]
    fn test_future_version_is_pending() {
        let mapper = DocumentMapper::new(DocumentVersion(3), shifted(0));
        assert!(matches!(
            mapper.to_generated(DocumentVersion(4), Position::new(0, 0)),
            Err(ChainError::PendingVersion { .. })
        ));
    }

    #[test]
    fn test_replace_with_older_version_keeps_current() {
        let mapper = DocumentMapper::new(DocumentVersion(5), shifted(1));
        assert!(mapper.replace(DocumentVersion(5), shifted(2)).is_err());
        assert!(mapper.replace(DocumentVersion(4), shifted(2)).is_err());
        assert_eq!(
            mapper.to_original(DocumentVersion(5), Position::new(1, 0)).unwrap(),
            Some(Position::new(0, 0))
        );
    }

    #[test]
    fn test_biased_queries_check_version() {
        let mut builder = position_map::MapBuilder::new();
        builder.add_source("in", None);
        builder
            .add_mapping(Position::new(0, 2), Position::new(0, 0), None)
            .unwrap();
        builder
            .add_mapping(Position::new(0, 8), Position::new(0, 6), None)
            .unwrap();
        let chain = MappingChain::new(vec![ChainEntry::mapped(builder.build())]);
        let mapper = DocumentMapper::new(DocumentVersion(2), chain);

        assert_eq!(
            mapper
                .to_original_with(DocumentVersion(2), Position::new(0, 5), Bias::NearestFollowing)
                .unwrap(),
            Some(Position::new(0, 6))
        );
        assert_eq!(
            mapper
                .to_generated_with(DocumentVersion(2), Position::new(0, 3), Bias::NearestPreceding)
                .unwrap(),
            Some(Position::new(0, 2))
        );
        assert!(matches!(
            mapper.to_original_with(DocumentVersion(1), Position::new(0, 5), Bias::NearestFollowing),
            Err(ChainError::StaleVersion { .. })
        ));
        assert!(matches!(
            mapper.to_generated_with(DocumentVersion(3), Position::new(0, 3), Bias::NearestPreceding),
            Err(ChainError::PendingVersion { .. })
        ));
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let mapper = DocumentMapper::new(DocumentVersion(1), shifted(2));
        let old = mapper.snapshot();
        mapper.replace(DocumentVersion(2), shifted(0)).unwrap();
        assert_eq!(old.version, DocumentVersion(1));
        assert_eq!(old.chain.to_original(Position::new(2, 0)), Some(Position::new(0, 0)));
    }
}
