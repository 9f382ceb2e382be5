//! Enrichment stages and the per-item state machine.
//!
//! Collaborators sit behind small traits so the orchestrator owns explicit
//! handles and tests can swap in doubles. An item advances one stage per
//! transition:
//!
//! ```text
//! Pending -> AttributesExtracted -> MetadataGenerated -> Committed
//! ```
mod embedding;
mod generator;
mod search;

pub use embedding::{ClipExtractor, EmbeddingClient};
pub use generator::LmGenerator;
pub use search::{build_index, IndexedSearch, SearchHit, VisualIndex};

use crate::error::{Stage, StageError};
use crate::record::{AttributeSet, MetadataRecord, ResultRecord, WorkItem};
use std::path::Path;

/// Maps an image to one label per attribute vocabulary.
pub trait AttributeExtractor {
    fn extract(&self, source: &Path) -> Result<AttributeSet, StageError>;
}

/// Turns an attribute set into schema-conforming product copy.
pub trait MetadataGenerator {
    fn generate(&self, attributes: &AttributeSet) -> Result<MetadataRecord, StageError>;
}

impl<T: AttributeExtractor + ?Sized> AttributeExtractor for &T {
    fn extract(&self, source: &Path) -> Result<AttributeSet, StageError> {
        (**self).extract(source)
    }
}

impl<T: MetadataGenerator + ?Sized> MetadataGenerator for &T {
    fn generate(&self, attributes: &AttributeSet) -> Result<MetadataRecord, StageError> {
        (**self).generate(attributes)
    }
}

/// Nearest-neighbor lookup over previously indexed images.
pub trait VisualSearch {
    fn search(&self, source: &Path, top_k: usize) -> anyhow::Result<Vec<SearchHit>>;
}

/// Where an item is in the two-stage pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemState {
    Pending(WorkItem),
    AttributesExtracted {
        item: WorkItem,
        attributes: AttributeSet,
    },
    MetadataGenerated {
        item: WorkItem,
        attributes: AttributeSet,
        metadata: MetadataRecord,
    },
    Committed(ResultRecord),
}

impl ItemState {
    pub fn item_id(&self) -> &str {
        match self {
            Self::Pending(item)
            | Self::AttributesExtracted { item, .. }
            | Self::MetadataGenerated { item, .. } => &item.id,
            Self::Committed(record) => &record.id,
        }
    }

    /// Stage the next transition will run, if any.
    pub fn next_stage(&self) -> Option<Stage> {
        match self {
            Self::Pending(_) => Some(Stage::Extraction),
            Self::AttributesExtracted { .. } => Some(Stage::Generation),
            Self::MetadataGenerated { .. } | Self::Committed(_) => None,
        }
    }

    /// Perform the next transition. `Committed` is terminal and returns itself.
    pub fn advance<E, G>(self, extractor: &E, generator: &G) -> Result<Self, StageError>
    where
        E: AttributeExtractor + ?Sized,
        G: MetadataGenerator + ?Sized,
    {
        match self {
            Self::Pending(item) => {
                let attributes = extractor.extract(&item.source)?;
                Ok(Self::AttributesExtracted { item, attributes })
            }
            Self::AttributesExtracted { item, attributes } => {
                // Rows that would fail validation on reload are never committed.
                let metadata = generator.generate(&attributes)?.normalized();
                metadata.validate().map_err(StageError::generation)?;
                Ok(Self::MetadataGenerated {
                    item,
                    attributes,
                    metadata,
                })
            }
            Self::MetadataGenerated {
                item,
                attributes,
                metadata,
            } => Ok(Self::Committed(ResultRecord {
                id: item.id,
                attributes,
                metadata,
            })),
            committed @ Self::Committed(_) => Ok(committed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{attributes, metadata, work_item};
    use std::cell::Cell;

    struct CountingExtractor {
        calls: Cell<usize>,
    }

    impl AttributeExtractor for CountingExtractor {
        fn extract(&self, _source: &Path) -> Result<AttributeSet, StageError> {
            self.calls.set(self.calls.get() + 1);
            Ok(attributes("black"))
        }
    }

    struct FailingGenerator;

    impl MetadataGenerator for FailingGenerator {
        fn generate(&self, _attributes: &AttributeSet) -> Result<MetadataRecord, StageError> {
            Err(StageError::Generation("no choices returned".to_string()))
        }
    }

    struct FixedGenerator;

    impl MetadataGenerator for FixedGenerator {
        fn generate(&self, _attributes: &AttributeSet) -> Result<MetadataRecord, StageError> {
            Ok(metadata("Black top"))
        }
    }

    #[test]
    fn advance_walks_every_state_in_order() {
        let extractor = CountingExtractor {
            calls: Cell::new(0),
        };
        let state = ItemState::Pending(work_item(Path::new("/img"), "a.jpg"));
        assert_eq!(state.next_stage(), Some(Stage::Extraction));

        let state = state.advance(&extractor, &FixedGenerator).expect("extract");
        assert_eq!(state.next_stage(), Some(Stage::Generation));
        assert!(matches!(state, ItemState::AttributesExtracted { .. }));
        let state = state.advance(&extractor, &FixedGenerator).expect("generate");
        assert!(matches!(state, ItemState::MetadataGenerated { .. }));
        let state = state.advance(&extractor, &FixedGenerator).expect("commit");
        assert!(matches!(state, ItemState::Committed(_)));
        assert_eq!(state.item_id(), "a.jpg");

        let state = state.advance(&extractor, &FixedGenerator).expect("terminal");
        assert!(matches!(state, ItemState::Committed(_)));
        assert_eq!(extractor.calls.get(), 1);
    }

    #[test]
    fn generation_failure_surfaces_stage() {
        let extractor = CountingExtractor {
            calls: Cell::new(0),
        };
        let state = ItemState::Pending(work_item(Path::new("/img"), "b.jpg"))
            .advance(&extractor, &FailingGenerator)
            .expect("extract");
        let err = state
            .advance(&extractor, &FailingGenerator)
            .expect_err("generation fails");
        assert_eq!(err.stage(), Stage::Generation);
    }

    struct PaddedGenerator;

    impl MetadataGenerator for PaddedGenerator {
        fn generate(&self, _attributes: &AttributeSet) -> Result<MetadataRecord, StageError> {
            let mut record = metadata("  Navy top ");
            record.seo_tags.push("   ".to_string());
            Ok(record)
        }
    }

    #[test]
    fn generated_metadata_is_normalized_before_commit() {
        let extractor = CountingExtractor {
            calls: Cell::new(0),
        };
        let state = ItemState::Pending(work_item(Path::new("/img"), "c.jpg"))
            .advance(&extractor, &PaddedGenerator)
            .expect("extract")
            .advance(&extractor, &PaddedGenerator)
            .expect("generate");
        let ItemState::MetadataGenerated {
            metadata: generated,
            ..
        } = &state
        else {
            panic!("expected generated metadata");
        };
        assert_eq!(generated.title, "Navy top");
        assert_eq!(generated.seo_tags.len(), 3);
    }
}
