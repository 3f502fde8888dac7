//! Shared fixtures for unit tests
//!
//! Segments are written as markup: plain tokens separated by spaces, with
//! entities as `{Token Token|kind}`. The entity key is the lowercased tokens
//! joined by `_`.

use std::sync::Arc;

use rex_core::{
    Corpus, DocumentRecord, Entity, Evidence, Fact, InMemoryCorpus, OccurrenceRecord,
    SegmentRecord,
};

use crate::{OracleError, ScoringOracle};

pub(crate) const BORN_IN: &[(&str, &[&str])] = &[
    (
        "doc_1",
        &["{Albert Einstein|person} was born in {Ulm|location} ."],
    ),
    (
        "doc_2",
        &[
            "{Marie Curie|person} was born in {Warsaw|location} .",
            "{Marie Curie|person} worked in {Paris|location} .",
        ],
    ),
    (
        "doc_3",
        &["{Niels Bohr|person} was born in {Copenhagen|location} near {Malmo|location} ."],
    ),
];

pub(crate) fn segment_record(offset: usize, markup: &str) -> SegmentRecord {
    let mut tokens: Vec<String> = Vec::new();
    let mut entities = Vec::new();
    let mut rest = markup.trim();

    while !rest.is_empty() {
        if let Some(stripped) = rest.strip_prefix('{') {
            let close = stripped.find('}').expect("unclosed entity in markup");
            let (words, kind) = stripped[..close]
                .split_once('|')
                .expect("entity markup needs a kind");
            let words: Vec<&str> = words.split_whitespace().collect();
            entities.push(OccurrenceRecord {
                key: words.join("_").to_lowercase(),
                canonical_form: Some(words.join(" ")),
                kind: kind.to_string(),
                offset: tokens.len(),
                offset_end: tokens.len() + words.len(),
            });
            tokens.extend(words.iter().map(|w| w.to_string()));
            rest = stripped[close + 1..].trim_start();
        } else {
            let (token, after) = rest.split_once(' ').unwrap_or((rest, ""));
            tokens.push(token.to_string());
            rest = after.trim_start();
        }
    }

    let text_len = tokens.join(" ").chars().count();
    SegmentRecord {
        offset,
        offset_end: offset + text_len,
        postags: vec!["X".to_string(); tokens.len()],
        tokens,
        entities,
    }
}

pub(crate) fn corpus_from_markup(documents: &[(&str, &[&str])]) -> InMemoryCorpus {
    let records = documents
        .iter()
        .map(|(id, segments)| {
            let mut offset = 0;
            let mut records = Vec::new();
            for markup in segments.iter() {
                let record = segment_record(offset, markup);
                offset = record.offset_end + 1;
                records.push(record);
            }
            let text = records
                .iter()
                .map(|r| r.tokens.join(" "))
                .collect::<Vec<_>>()
                .join(" ");
            DocumentRecord {
                human_identifier: id.to_string(),
                title: format!("Title for {id}"),
                text,
                preprocess: Default::default(),
                segments: records,
            }
        })
        .collect();
    InMemoryCorpus::from_records(records).expect("fixture corpus is valid")
}

pub(crate) fn born_in_corpus() -> InMemoryCorpus {
    corpus_from_markup(BORN_IN)
}

pub(crate) fn fact(corpus: &InMemoryCorpus, e1: &str, e2: &str, relation: &str) -> Fact {
    Fact::new(
        corpus.entity(e1).expect("unknown e1"),
        corpus.entity(e2).expect("unknown e2"),
        relation,
    )
}

/// Evidence for `relation(e1, e2)` on the first segment of `document` that
/// mentions both
pub(crate) fn evidence(
    corpus: &InMemoryCorpus,
    document: &str,
    e1: &str,
    e2: &str,
    relation: &str,
) -> Evidence {
    let doc = corpus.document(document).expect("unknown document");
    for segment in doc.segments() {
        let o1 = segment.entities().iter().position(|e| e.key() == e1);
        let o2 = segment.entities().iter().position(|e| e.key() == e2);
        if let (Some(o1), Some(o2)) = (o1, o2) {
            let fact = fact(corpus, e1, e2, relation);
            return Evidence::new(fact, Arc::clone(segment), o1, o2).expect("valid evidence");
        }
    }
    panic!("no segment of {document} mentions {e1} and {e2}");
}

pub(crate) fn entity(key: &str, kind: &str) -> Arc<Entity> {
    Arc::new(Entity::new(key, key, kind))
}

/// Scores evidence by whether "born" appears between the two entities
#[derive(Debug, Default)]
pub(crate) struct KeywordOracle {
    pub trained: usize,
    pub hit: f64,
    pub miss: f64,
}

impl KeywordOracle {
    pub fn new(hit: f64, miss: f64) -> Self {
        Self {
            trained: 0,
            hit,
            miss,
        }
    }
}

impl ScoringOracle for KeywordOracle {
    fn train(&mut self, labeled: &[(Evidence, bool)]) -> Result<(), OracleError> {
        if !labeled.iter().any(|(_, label)| *label) {
            return Err(OracleError::InsufficientData("no positives".into()));
        }
        self.trained += 1;
        Ok(())
    }

    fn score(&self, evidence: &Evidence) -> f64 {
        let segment = evidence.segment();
        if segment
            .tokens_between(evidence.o1(), evidence.o2())
            .iter()
            .any(|t| t == "born")
        {
            self.hit
        } else {
            self.miss
        }
    }
}

/// Never has enough data
#[derive(Debug, Default)]
pub(crate) struct UntrainableOracle;

impl ScoringOracle for UntrainableOracle {
    fn train(&mut self, _labeled: &[(Evidence, bool)]) -> Result<(), OracleError> {
        Err(OracleError::InsufficientData("always".into()))
    }

    fn score(&self, _evidence: &Evidence) -> f64 {
        0.99
    }
}

/// Trains fine, then scores every other candidate as NaN
#[derive(Debug, Default)]
pub(crate) struct NanOracle;

impl ScoringOracle for NanOracle {
    fn train(&mut self, _labeled: &[(Evidence, bool)]) -> Result<(), OracleError> {
        Ok(())
    }

    fn score(&self, _evidence: &Evidence) -> f64 {
        f64::NAN
    }

    fn score_batch(&self, evidence: &[Evidence]) -> Vec<f64> {
        (0..evidence.len())
            .map(|i| if i % 2 == 0 { f64::NAN } else { 0.6 })
            .collect()
    }
}

/// Scores only the first candidate of each batch
#[derive(Debug, Default)]
pub(crate) struct ShortBatchOracle;

impl ScoringOracle for ShortBatchOracle {
    fn train(&mut self, _labeled: &[(Evidence, bool)]) -> Result<(), OracleError> {
        Ok(())
    }

    fn score(&self, _evidence: &Evidence) -> f64 {
        0.6
    }

    fn score_batch(&self, evidence: &[Evidence]) -> Vec<f64> {
        evidence.iter().take(1).map(|e| self.score(e)).collect()
    }
}
