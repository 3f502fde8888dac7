//! Corpus access
//!
//! The bootstrap loop only ever reads documents, so the [`Corpus`] trait is
//! read-only. [`InMemoryCorpus`] is the bundled implementation; it is loaded
//! from a JSON array of [`DocumentRecord`]s, each converted through the
//! validating model constructors.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::model::{
    Entity, EntityInSegment, IEDocument, PreProcessResult, PreProcessStep, TextSegment,
};
use crate::{CoreError, Result};

/// Read-only access to preprocessed documents
pub trait Corpus {
    /// All documents, in a stable order
    fn documents(&self) -> Box<dyn Iterator<Item = &IEDocument> + '_>;

    /// Look up a document by its human identifier
    fn document(&self, human_identifier: &str) -> Option<&IEDocument>;

    /// Look up an entity by key
    fn entity(&self, key: &str) -> Option<Arc<Entity>>;

    /// Segment of a document starting at a character offset
    fn segment(&self, document_id: &str, offset: usize) -> Option<Arc<TextSegment>> {
        self.document(document_id)
            .and_then(|doc| doc.segment_at(offset))
            .cloned()
    }

    /// Every segment of every document, in document order
    fn segments(&self) -> Box<dyn Iterator<Item = &Arc<TextSegment>> + '_> {
        Box::new(self.documents().flat_map(|doc| doc.segments().iter()))
    }
}

impl<T: Corpus + ?Sized> Corpus for &T {
    fn documents(&self) -> Box<dyn Iterator<Item = &IEDocument> + '_> {
        (**self).documents()
    }

    fn document(&self, human_identifier: &str) -> Option<&IEDocument> {
        (**self).document(human_identifier)
    }

    fn entity(&self, key: &str) -> Option<Arc<Entity>> {
        (**self).entity(key)
    }
}

// ============================================================================
// JSON records
// ============================================================================

/// Serialized form of a document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub human_identifier: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub text: String,
    /// Explicit preprocessing results; steps left out are derived from
    /// the segments
    #[serde(default)]
    pub preprocess: BTreeMap<PreProcessStep, PreProcessResult>,
    #[serde(default)]
    pub segments: Vec<SegmentRecord>,
}

/// Serialized form of a text segment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmentRecord {
    pub offset: usize,
    pub offset_end: usize,
    pub tokens: Vec<String>,
    pub postags: Vec<String>,
    #[serde(default)]
    pub entities: Vec<OccurrenceRecord>,
}

/// Serialized form of an entity occurrence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OccurrenceRecord {
    pub key: String,
    /// Defaults to the key
    #[serde(default)]
    pub canonical_form: Option<String>,
    pub kind: String,
    pub offset: usize,
    pub offset_end: usize,
}

// ============================================================================
// In-memory corpus
// ============================================================================

/// Corpus held entirely in memory
#[derive(Debug, Default)]
pub struct InMemoryCorpus {
    documents: Vec<IEDocument>,
    index: HashMap<String, usize>,
    entities: HashMap<String, Arc<Entity>>,
}

impl InMemoryCorpus {
    /// Create an empty corpus
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a document, registering the entities its segments mention
    pub fn add_document(&mut self, document: IEDocument) -> Result<()> {
        if self.index.contains_key(document.human_identifier()) {
            return Err(CoreError::DuplicateDocument(
                document.human_identifier().to_string(),
            ));
        }
        for occurrence in document.segments().iter().flat_map(|s| s.entities()) {
            self.register_entity(occurrence.entity())?;
        }

        self.index
            .insert(document.human_identifier().to_string(), self.documents.len());
        self.documents.push(document);
        Ok(())
    }

    /// Return the shared entity for a key, registering it if unseen
    pub fn intern_entity(&mut self, entity: Entity) -> Result<Arc<Entity>> {
        let entity = Arc::new(entity);
        self.register_entity(&entity)
    }

    fn register_entity(&mut self, entity: &Arc<Entity>) -> Result<Arc<Entity>> {
        match self.entities.get(&entity.key) {
            Some(existing) if existing.as_ref() != entity.as_ref() => {
                Err(CoreError::DuplicateEntity(entity.key.clone()))
            }
            Some(existing) => Ok(Arc::clone(existing)),
            None => {
                self.entities.insert(entity.key.clone(), Arc::clone(entity));
                Ok(Arc::clone(entity))
            }
        }
    }

    /// Build a corpus from serialized records
    pub fn from_records(records: Vec<DocumentRecord>) -> Result<Self> {
        let mut corpus = Self::new();
        for record in records {
            let mut document =
                IEDocument::new(&record.human_identifier, record.title, record.text);
            // steps are applied in pipeline order so prerequisites come first
            for (step, result) in record.preprocess {
                document.set_preprocess_result(step, result)?;
            }

            let mut segments = Vec::with_capacity(record.segments.len());
            for segment in record.segments {
                let mut occurrences = Vec::with_capacity(segment.entities.len());
                for occ in segment.entities {
                    let canonical_form = occ.canonical_form.unwrap_or_else(|| occ.key.clone());
                    let entity = corpus.intern_entity(Entity::new(occ.key, canonical_form, occ.kind))?;
                    occurrences.push(EntityInSegment::new(entity, occ.offset, occ.offset_end)?);
                }
                segments.push(TextSegment::new(
                    &record.human_identifier,
                    segment.offset,
                    segment.offset_end,
                    segment.tokens,
                    segment.postags,
                    occurrences,
                )?);
            }

            document.record_segment_preprocessing(&segments)?;
            for segment in segments {
                document.add_segment(segment)?;
            }
            corpus.add_document(document)?;
        }

        debug!(
            documents = corpus.len(),
            entities = corpus.entities.len(),
            "Corpus loaded"
        );
        Ok(corpus)
    }

    /// Parse a JSON array of document records
    pub fn from_json_str(json: &str) -> Result<Self> {
        let records: Vec<DocumentRecord> = serde_json::from_str(json)?;
        Self::from_records(records)
    }

    /// Load a JSON array of document records from disk
    pub fn from_json_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| CoreError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_json_str(&content)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl Corpus for InMemoryCorpus {
    fn documents(&self) -> Box<dyn Iterator<Item = &IEDocument> + '_> {
        Box::new(self.documents.iter())
    }

    fn document(&self, human_identifier: &str) -> Option<&IEDocument> {
        self.index
            .get(human_identifier)
            .map(|&idx| &self.documents[idx])
    }

    fn entity(&self, key: &str) -> Option<Arc<Entity>> {
        self.entities.get(key).cloned()
    }
}

// ============================================================================
// Tests
// ============================================================================
