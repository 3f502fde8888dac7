//! Rex Extractor - Bootstrapped relation extraction
//!
//! Grows the known instances of one relation from a handful of seed facts.
//! Candidates are enumerated from the corpus, scored by a pluggable oracle,
//! and the most uncertain ones are put to a human whose answers feed the
//! next round of training.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use rex_core::{Evidence, Fact};

pub mod candidates;
pub mod ledger;
pub mod loader;
pub mod metrics;
pub mod oracle;
pub mod pipeline;
pub mod selector;

#[cfg(test)]
pub(crate) mod test_support;

pub use candidates::CandidateGenerator;
pub use ledger::{Answer, AnswerLedger};
pub use loader::{LabeledEvidence, LoadError};
pub use metrics::{evaluate, evaluate_evidence, RelationMetrics};
pub use oracle::TokenOracle;
pub use pipeline::{
    BootstrapPipeline, BootstrapState, FactStatus, IterationReport, PipelineError, PipelineStatus,
};
pub use selector::{QuestionSelector, ScoredEvidence, Selection};

/// The relation being bootstrapped and the entity kinds it connects
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationSignature {
    pub relation: String,
    pub kind1: String,
    pub kind2: String,
}

impl RelationSignature {
    /// Create a new signature
    pub fn new(
        relation: impl Into<String>,
        kind1: impl Into<String>,
        kind2: impl Into<String>,
    ) -> Self {
        Self {
            relation: relation.into(),
            kind1: kind1.into(),
            kind2: kind2.into(),
        }
    }

    /// Signature a fact belongs to
    pub fn of_fact(fact: &Fact) -> Self {
        Self::new(&fact.relation, &fact.e1.kind, &fact.e2.kind)
    }

    /// Check whether a fact has this relation and these kinds
    pub fn matches(&self, fact: &Fact) -> bool {
        fact.relation == self.relation && fact.e1.kind == self.kind1 && fact.e2.kind == self.kind2
    }
}

impl std::fmt::Display for RelationSignature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({}, {})", self.relation, self.kind1, self.kind2)
    }
}

/// Errors raised by scoring oracles
#[derive(Error, Debug)]
pub enum OracleError {
    #[error("Insufficient training data: {0}")]
    InsufficientData(String),
}

/// Trainable classifier that scores evidence
///
/// Scores are confidences in `[0, 1]` that the evidence expresses its fact.
/// They only need to be comparable within one batch.
pub trait ScoringOracle {
    /// Replace the model with one trained on the given labels.
    ///
    /// Fails with [`OracleError::InsufficientData`] when there is no
    /// positive example to learn from.
    fn train(&mut self, labeled: &[(Evidence, bool)]) -> Result<(), OracleError>;

    /// Confidence that `evidence` expresses its fact
    fn score(&self, evidence: &Evidence) -> f64;

    /// Score a batch
    fn score_batch(&self, evidence: &[Evidence]) -> Vec<f64> {
        evidence.iter().map(|e| self.score(e)).collect()
    }
}

impl<T: ScoringOracle + ?Sized> ScoringOracle for Box<T> {
    fn train(&mut self, labeled: &[(Evidence, bool)]) -> Result<(), OracleError> {
        (**self).train(labeled)
    }

    fn score(&self, evidence: &Evidence) -> f64 {
        (**self).score(evidence)
    }

    fn score_batch(&self, evidence: &[Evidence]) -> Vec<f64> {
        (**self).score_batch(evidence)
    }
}
