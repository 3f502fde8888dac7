//! Question selection (uncertainty sampling)
//!
//! Picks the evidence whose score sits closest to the decision boundary.
//! Evidence the oracle is already confident about is split off: confident
//! positives are accepted, confident negatives are left unasked.

use serde::Serialize;

use rex_core::{BootstrapConfig, Evidence};

/// Decision boundary of the oracle's confidence
const BOUNDARY: f64 = 0.5;

/// Evidence paired with the oracle's score, if a model exists
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEvidence {
    pub evidence: Evidence,
    pub score: Option<f64>,
}

impl ScoredEvidence {
    pub fn new(evidence: Evidence, score: Option<f64>) -> Self {
        Self { evidence, score }
    }

    /// Score, with unscored evidence treated as maximally uncertain
    pub fn confidence(&self) -> f64 {
        self.score.unwrap_or(BOUNDARY)
    }

    fn distance_to_boundary(&self) -> f64 {
        (self.confidence() - BOUNDARY).abs()
    }
}

/// Outcome of one selection pass
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Evidence to ask about, most uncertain first
    pub questions: Vec<ScoredEvidence>,
    /// Evidence scoring at or above the accept threshold
    pub accepted: Vec<ScoredEvidence>,
    /// Number of evidence scoring at or below the reject threshold
    pub rejected: usize,
    /// Uncertain evidence that did not fit in the batch
    pub deferred: usize,
}

/// Summary counters of a selection, for reports
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SelectionStats {
    pub questions: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub deferred: usize,
}

impl Selection {
    pub fn stats(&self) -> SelectionStats {
        SelectionStats {
            questions: self.questions.len(),
            accepted: self.accepted.len(),
            rejected: self.rejected,
            deferred: self.deferred,
        }
    }
}

/// Uncertainty-sampling question selector
#[derive(Debug, Clone)]
pub struct QuestionSelector {
    batch_size: usize,
    accept_threshold: f64,
    reject_threshold: f64,
}

impl QuestionSelector {
    /// Create a selector asking at most `batch_size` questions per round
    pub fn new(batch_size: usize) -> Self {
        let defaults = BootstrapConfig::default();
        Self {
            batch_size,
            accept_threshold: defaults.accept_threshold,
            reject_threshold: defaults.reject_threshold,
        }
    }

    /// Set the confidence thresholds
    pub fn with_thresholds(mut self, accept: f64, reject: f64) -> Self {
        self.accept_threshold = accept.clamp(0.0, 1.0);
        self.reject_threshold = reject.clamp(0.0, 1.0);
        self
    }

    /// Create from the bootstrap configuration
    pub fn from_config(config: &BootstrapConfig) -> Self {
        Self::new(config.batch_size)
            .with_thresholds(config.accept_threshold, config.reject_threshold)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Split a scored pool into questions, accepted and rejected evidence.
    ///
    /// Unscored evidence is never accepted or rejected. Ties in uncertainty
    /// keep the pool's order.
    pub fn select(&self, pool: Vec<ScoredEvidence>) -> Selection {
        let mut selection = Selection::default();
        let mut uncertain = Vec::new();

        for item in pool {
            match item.score {
                Some(score) if score >= self.accept_threshold => selection.accepted.push(item),
                Some(score) if score <= self.reject_threshold => selection.rejected += 1,
                _ => uncertain.push(item),
            }
        }

        // stable: equal distances stay in generation order
        uncertain.sort_by(|a, b| a.distance_to_boundary().total_cmp(&b.distance_to_boundary()));

        selection.deferred = uncertain.len().saturating_sub(self.batch_size);
        uncertain.truncate(self.batch_size);
        selection.questions = uncertain;
        selection
    }
}

// ============================================================================
// Tests
// ============================================================================
