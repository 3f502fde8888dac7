//! Document and relation models
//!
//! Documents carry the output of the (external) preprocessing steps and own
//! the text segments that candidate generation scans. Facts and evidence tie
//! pairs of entities to the segments that express them.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{CoreError, Result};

// ============================================================================
// Entities
// ============================================================================

/// A named thing that relations are stated about
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Entity {
    /// Canonical identifier, unique across the corpus
    pub key: String,

    /// Display form
    pub canonical_form: String,

    /// Category tag (person, location, ...)
    pub kind: String,
}

impl Entity {
    /// Create a new entity
    pub fn new(
        key: impl Into<String>,
        canonical_form: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            canonical_form: canonical_form.into(),
            kind: kind.into(),
        }
    }
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.canonical_form, self.kind)
    }
}

/// An occurrence of an entity inside a text segment.
///
/// Offsets are token indices local to the owning segment, `offset_end`
/// exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityInSegment {
    entity: Arc<Entity>,
    offset: usize,
    offset_end: usize,
}

impl EntityInSegment {
    /// Create an occurrence spanning `offset..offset_end`
    pub fn new(entity: Arc<Entity>, offset: usize, offset_end: usize) -> Result<Self> {
        if offset >= offset_end {
            return Err(CoreError::InvalidSegment(format!(
                "occurrence of {} has empty span {}..{}",
                entity.key, offset, offset_end
            )));
        }
        Ok(Self {
            entity,
            offset,
            offset_end,
        })
    }

    pub fn entity(&self) -> &Arc<Entity> {
        &self.entity
    }

    pub fn key(&self) -> &str {
        &self.entity.key
    }

    pub fn kind(&self) -> &str {
        &self.entity.kind
    }

    pub fn canonical_form(&self) -> &str {
        &self.entity.canonical_form
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn offset_end(&self) -> usize {
        self.offset_end
    }
}

// ============================================================================
// Preprocessing
// ============================================================================

/// Preprocessing steps a document may carry results for
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreProcessStep {
    Tokenization,
    /// Sentence boundaries
    Segmentation,
    /// Part-of-speech tagging
    Tagging,
    Ner,
}

impl PreProcessStep {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tokenization => "tokenization",
            Self::Segmentation => "segmentation",
            Self::Tagging => "tagging",
            Self::Ner => "ner",
        }
    }

    /// Step that must be present before this one can be set
    pub fn prerequisite(&self) -> Option<PreProcessStep> {
        match self {
            Self::Tokenization => None,
            Self::Segmentation | Self::Tagging | Self::Ner => Some(Self::Tokenization),
        }
    }
}

impl std::fmt::Display for PreProcessStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Output of one preprocessing step, indexed over the document's tokens
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreProcessResult {
    /// `(character offset, token)` pairs
    Tokens(Vec<(usize, String)>),
    /// Token indices where sentences start
    Sentences(Vec<usize>),
    /// One tag per token
    Tags(Vec<String>),
    /// `(token offset, token offset end, kind)` spans of recognized entities
    Entities(Vec<(usize, usize, String)>),
}

impl PreProcessResult {
    fn expected_step(&self) -> PreProcessStep {
        match self {
            Self::Tokens(_) => PreProcessStep::Tokenization,
            Self::Sentences(_) => PreProcessStep::Segmentation,
            Self::Tags(_) => PreProcessStep::Tagging,
            Self::Entities(_) => PreProcessStep::Ner,
        }
    }
}

// ============================================================================
// Documents and Segments
// ============================================================================

/// A source document and its preprocessing results
#[derive(Debug, Clone)]
pub struct IEDocument {
    human_identifier: String,
    title: String,
    text: String,
    preprocess: BTreeMap<PreProcessStep, PreProcessResult>,
    segments: Vec<Arc<TextSegment>>,
}

impl IEDocument {
    /// Create a new document with no preprocessing done
    pub fn new(
        human_identifier: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            human_identifier: human_identifier.into(),
            title: title.into(),
            text: text.into(),
            preprocess: BTreeMap::new(),
            segments: Vec::new(),
        }
    }

    pub fn human_identifier(&self) -> &str {
        &self.human_identifier
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Store the result of a preprocessing step.
    ///
    /// Results are write-once and require the step's prerequisite to be
    /// present already.
    pub fn set_preprocess_result(
        &mut self,
        step: PreProcessStep,
        result: PreProcessResult,
    ) -> Result<()> {
        if result.expected_step() != step {
            return Err(CoreError::InvalidPreprocessResult {
                step,
                reason: format!("got a {} result", result.expected_step()),
            });
        }
        if self.preprocess.contains_key(&step) {
            return Err(CoreError::AlreadyComputed {
                document: self.human_identifier.clone(),
                step,
            });
        }
        if let Some(requires) = step.prerequisite() {
            if !self.preprocess.contains_key(&requires) {
                return Err(CoreError::MissingPrerequisite {
                    document: self.human_identifier.clone(),
                    step,
                    requires,
                });
            }
        }
        if let PreProcessResult::Tags(tags) = &result {
            let tokens = self.token_count();
            if tags.len() != tokens {
                return Err(CoreError::InvalidPreprocessResult {
                    step,
                    reason: format!("{} tags for {} tokens", tags.len(), tokens),
                });
            }
        }

        self.preprocess.insert(step, result);
        Ok(())
    }

    pub fn was_preprocess_done(&self, step: PreProcessStep) -> bool {
        self.preprocess.contains_key(&step)
    }

    pub fn preprocess_result(&self, step: PreProcessStep) -> Option<&PreProcessResult> {
        self.preprocess.get(&step)
    }

    fn token_count(&self) -> usize {
        match self.preprocess.get(&PreProcessStep::Tokenization) {
            Some(PreProcessResult::Tokens(tokens)) => tokens.len(),
            _ => 0,
        }
    }

    /// Fill in every preprocessing step not yet recorded from the given
    /// segments, in document order.
    ///
    /// Token offsets are located in the document text; a token that cannot
    /// be found there keeps the offset of the previous match.
    pub fn record_segment_preprocessing(&mut self, segments: &[TextSegment]) -> Result<()> {
        let mut tokens = Vec::new();
        let mut sentences = Vec::with_capacity(segments.len());
        let mut tags = Vec::new();
        let mut entities = Vec::new();

        for segment in segments {
            let base = tokens.len();
            sentences.push(base);
            tokens.extend(locate_tokens(&self.text, segment));
            tags.extend(segment.postags.iter().cloned());
            entities.extend(segment.entities.iter().map(|occurrence| {
                (
                    base + occurrence.offset,
                    base + occurrence.offset_end,
                    occurrence.kind().to_string(),
                )
            }));
        }

        let derived = [
            (PreProcessStep::Tokenization, PreProcessResult::Tokens(tokens)),
            (PreProcessStep::Segmentation, PreProcessResult::Sentences(sentences)),
            (PreProcessStep::Tagging, PreProcessResult::Tags(tags)),
            (PreProcessStep::Ner, PreProcessResult::Entities(entities)),
        ];
        for (step, result) in derived {
            if !self.was_preprocess_done(step) {
                self.set_preprocess_result(step, result)?;
            }
        }
        Ok(())
    }

    /// Attach a segment to this document.
    ///
    /// Tokenization must be recorded first. The segment must name this
    /// document, fit inside its text and not start where another segment
    /// already starts.
    pub fn add_segment(&mut self, segment: TextSegment) -> Result<Arc<TextSegment>> {
        if !self.was_preprocess_done(PreProcessStep::Tokenization) {
            return Err(CoreError::MissingPrerequisite {
                document: self.human_identifier.clone(),
                step: PreProcessStep::Segmentation,
                requires: PreProcessStep::Tokenization,
            });
        }
        if segment.document_id != self.human_identifier {
            return Err(CoreError::InvalidSegment(format!(
                "segment belongs to {}, not {}",
                segment.document_id, self.human_identifier
            )));
        }
        let length = self.text.chars().count();
        if segment.offset_end > length {
            return Err(CoreError::InvalidSegment(format!(
                "segment {}..{} exceeds document {} of {} characters",
                segment.offset, segment.offset_end, self.human_identifier, length
            )));
        }
        if self.segment_at(segment.offset).is_some() {
            return Err(CoreError::InvalidSegment(format!(
                "document {} already has a segment at offset {}",
                self.human_identifier, segment.offset
            )));
        }

        let segment = Arc::new(segment);
        self.segments.push(Arc::clone(&segment));
        Ok(segment)
    }

    pub fn segments(&self) -> &[Arc<TextSegment>] {
        &self.segments
    }

    /// Segment starting at the given character offset
    pub fn segment_at(&self, offset: usize) -> Option<&Arc<TextSegment>> {
        self.segments.iter().find(|s| s.offset == offset)
    }
}

/// `(character offset, token)` pairs of a segment's tokens within `text`
fn locate_tokens(text: &str, segment: &TextSegment) -> Vec<(usize, String)> {
    let mut cursor = text
        .char_indices()
        .nth(segment.offset)
        .map_or(text.len(), |(byte, _)| byte);
    let mut located = Vec::with_capacity(segment.tokens.len());

    for token in &segment.tokens {
        let start = match text[cursor..].find(token.as_str()) {
            Some(found) => {
                let start = cursor + found;
                cursor = start + token.len();
                start
            }
            None => cursor,
        };
        located.push((text[..start].chars().count(), token.clone()));
    }
    located
}

/// Identity of a segment: its document and character span
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SegmentKey {
    pub document_id: String,
    pub offset: usize,
    pub offset_end: usize,
}

impl std::fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}..{}", self.document_id, self.offset, self.offset_end)
    }
}

/// A contiguous, tokenized and tagged span of one document.
///
/// Equality, hashing and ordering go by [`SegmentKey`].
#[derive(Debug, Clone)]
pub struct TextSegment {
    document_id: String,
    offset: usize,
    offset_end: usize,
    tokens: Vec<String>,
    postags: Vec<String>,
    entities: Vec<EntityInSegment>,
}

impl TextSegment {
    /// Create a segment, validating spans and parallel sequences
    pub fn new(
        document_id: impl Into<String>,
        offset: usize,
        offset_end: usize,
        tokens: Vec<String>,
        postags: Vec<String>,
        entities: Vec<EntityInSegment>,
    ) -> Result<Self> {
        let document_id = document_id.into();
        if offset >= offset_end {
            return Err(CoreError::InvalidSegment(format!(
                "{}: empty span {}..{}",
                document_id, offset, offset_end
            )));
        }
        if postags.len() != tokens.len() {
            return Err(CoreError::InvalidSegment(format!(
                "{}@{}: {} postags for {} tokens",
                document_id,
                offset,
                postags.len(),
                tokens.len()
            )));
        }
        if let Some(bad) = entities.iter().find(|e| e.offset_end > tokens.len()) {
            return Err(CoreError::InvalidSegment(format!(
                "{}@{}: occurrence of {} at {}..{} exceeds {} tokens",
                document_id,
                offset,
                bad.key(),
                bad.offset,
                bad.offset_end,
                tokens.len()
            )));
        }

        Ok(Self {
            document_id,
            offset,
            offset_end,
            tokens,
            postags,
            entities,
        })
    }

    pub fn key(&self) -> SegmentKey {
        SegmentKey {
            document_id: self.document_id.clone(),
            offset: self.offset,
            offset_end: self.offset_end,
        }
    }

    pub fn document_id(&self) -> &str {
        &self.document_id
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn offset_end(&self) -> usize {
        self.offset_end
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn postags(&self) -> &[String] {
        &self.postags
    }

    pub fn entities(&self) -> &[EntityInSegment] {
        &self.entities
    }

    /// Tokens joined by single spaces
    pub fn text(&self) -> String {
        self.tokens.join(" ")
    }

    /// Tokens strictly between two occurrences, whichever comes first
    pub fn tokens_between(&self, o1: usize, o2: usize) -> &[String] {
        let (Some(a), Some(b)) = (self.entities.get(o1), self.entities.get(o2)) else {
            return &[];
        };
        let (first, second) = if a.offset <= b.offset { (a, b) } else { (b, a) };
        if first.offset_end >= second.offset {
            return &[];
        }
        &self.tokens[first.offset_end..second.offset]
    }

    /// Render the segment with occurrence `o1` wrapped in `{...}` and `o2`
    /// wrapped in `[...]`
    pub fn highlighted(&self, o1: usize, o2: usize) -> String {
        let mut out = Vec::with_capacity(self.tokens.len());
        for (i, token) in self.tokens.iter().enumerate() {
            let mut rendered = token.clone();
            for (index, open, close) in [(o1, '{', '}'), (o2, '[', ']')] {
                if let Some(occurrence) = self.entities.get(index) {
                    if occurrence.offset == i {
                        rendered.insert(0, open);
                    }
                    if occurrence.offset_end == i + 1 {
                        rendered.push(close);
                    }
                }
            }
            out.push(rendered);
        }
        out.join(" ")
    }
}

impl PartialEq for TextSegment {
    fn eq(&self, other: &Self) -> bool {
        self.document_id == other.document_id
            && self.offset == other.offset
            && self.offset_end == other.offset_end
    }
}

impl Eq for TextSegment {}

impl Hash for TextSegment {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.document_id.hash(state);
        self.offset.hash(state);
        self.offset_end.hash(state);
    }
}

impl PartialOrd for TextSegment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TextSegment {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.document_id, self.offset, self.offset_end).cmp(&(
            &other.document_id,
            other.offset,
            other.offset_end,
        ))
    }
}

// ============================================================================
// Facts and Evidence
// ============================================================================

/// One instance of a relation between two entities.
///
/// Ordered: `(a, b, r)` and `(b, a, r)` are different facts.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Fact {
    pub e1: Arc<Entity>,
    pub e2: Arc<Entity>,
    pub relation: String,
}

impl Fact {
    /// Create a new fact
    pub fn new(e1: Arc<Entity>, e2: Arc<Entity>, relation: impl Into<String>) -> Self {
        Self {
            e1,
            e2,
            relation: relation.into(),
        }
    }
}

impl std::fmt::Display for Fact {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}, {})", self.relation, self.e1.key, self.e2.key)
    }
}

/// A segment witnessing a fact, with the occurrences that instantiate it.
///
/// Identity is `(fact, segment, o1, o2)`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Evidence {
    fact: Fact,
    segment: Arc<TextSegment>,
    o1: usize,
    o2: usize,
}

impl Evidence {
    /// Bind a fact to a segment.
    ///
    /// `o1`/`o2` index `segment.entities()` and must be distinct occurrences
    /// of `fact.e1` and `fact.e2` respectively.
    pub fn new(fact: Fact, segment: Arc<TextSegment>, o1: usize, o2: usize) -> Result<Self> {
        if o1 == o2 {
            return Err(CoreError::InvalidEvidence(format!(
                "{} on {}: both sides use occurrence {}",
                fact,
                segment.key(),
                o1
            )));
        }
        for (index, entity) in [(o1, &fact.e1), (o2, &fact.e2)] {
            match segment.entities.get(index) {
                None => {
                    return Err(CoreError::InvalidEvidence(format!(
                        "{} on {}: occurrence {} out of bounds ({} entities)",
                        fact,
                        segment.key(),
                        index,
                        segment.entities.len()
                    )))
                }
                Some(occurrence) if occurrence.key() != entity.key => {
                    return Err(CoreError::InvalidEvidence(format!(
                        "{} on {}: occurrence {} is {}, expected {}",
                        fact,
                        segment.key(),
                        index,
                        occurrence.key(),
                        entity.key
                    )))
                }
                Some(_) => {}
            }
        }

        Ok(Self {
            fact,
            segment,
            o1,
            o2,
        })
    }

    pub fn fact(&self) -> &Fact {
        &self.fact
    }

    pub fn segment(&self) -> &Arc<TextSegment> {
        &self.segment
    }

    pub fn o1(&self) -> usize {
        self.o1
    }

    pub fn o2(&self) -> usize {
        self.o2
    }

    /// Occurrence instantiating `fact.e1`
    pub fn first(&self) -> &EntityInSegment {
        &self.segment.entities[self.o1]
    }

    /// Occurrence instantiating `fact.e2`
    pub fn second(&self) -> &EntityInSegment {
        &self.segment.entities[self.o2]
    }

    /// Segment text with both occurrences marked
    pub fn highlighted(&self) -> String {
        self.segment.highlighted(self.o1, self.o2)
    }
}

// ============================================================================
// Tests
// ============================================================================
