//! Candidate generation
//!
//! Enumerates, segment by segment, every ordered pair of distinct entity
//! occurrences whose kinds match a relation signature. No scoring happens
//! here; the output is the unlabeled evidence pool.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::warn;

use rex_core::{Corpus, Evidence, Fact, TextSegment};

use crate::RelationSignature;

/// Structural candidate generator for one relation
#[derive(Debug, Clone)]
pub struct CandidateGenerator {
    signature: RelationSignature,
}

impl CandidateGenerator {
    /// Create a generator for a relation signature
    pub fn new(signature: RelationSignature) -> Self {
        Self { signature }
    }

    pub fn signature(&self) -> &RelationSignature {
        &self.signature
    }

    /// Every candidate in the corpus, in document then segment order.
    ///
    /// Each call starts a fresh pass over the corpus.
    pub fn generate<'a, C>(&'a self, corpus: &'a C) -> impl Iterator<Item = Evidence> + 'a
    where
        C: Corpus + ?Sized,
    {
        corpus
            .segments()
            .flat_map(move |segment| self.segment_candidates(segment))
    }

    /// Candidates for which `skip` returns false
    pub fn generate_excluding<'a, C, F>(
        &'a self,
        corpus: &'a C,
        skip: F,
    ) -> impl Iterator<Item = Evidence> + 'a
    where
        C: Corpus + ?Sized,
        F: Fn(&Evidence) -> bool + 'a,
    {
        self.generate(corpus).filter(move |evidence| !skip(evidence))
    }

    /// Every evidence in the corpus whose fact is one of `facts`
    pub fn evidence_for_facts<C>(&self, corpus: &C, facts: &BTreeSet<Fact>) -> Vec<Evidence>
    where
        C: Corpus + ?Sized,
    {
        self.generate(corpus)
            .filter(|evidence| facts.contains(evidence.fact()))
            .collect()
    }

    fn segment_candidates(&self, segment: &Arc<TextSegment>) -> Vec<Evidence> {
        let entities = segment.entities();
        let mut candidates = Vec::new();

        for (o1, first) in entities.iter().enumerate() {
            if first.kind() != self.signature.kind1 {
                continue;
            }
            for (o2, second) in entities.iter().enumerate() {
                if o1 == o2 || second.kind() != self.signature.kind2 {
                    continue;
                }
                let fact = Fact::new(
                    Arc::clone(first.entity()),
                    Arc::clone(second.entity()),
                    &self.signature.relation,
                );
                match Evidence::new(fact, Arc::clone(segment), o1, o2) {
                    Ok(evidence) => candidates.push(evidence),
                    Err(error) => warn!(segment = %segment.key(), %error, "Skipping candidate"),
                }
            }
        }

        candidates
    }
}

// ============================================================================
// Tests
// ============================================================================
