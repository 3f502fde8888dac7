//! Default scoring oracle
//!
//! A multinomial naive Bayes model over simple lexical features of the
//! evidence: the tokens between the two occurrences, their order and the
//! distance between them. Any other [`ScoringOracle`] can be used instead.

use std::collections::{HashMap, HashSet};

use tracing::debug;

use rex_core::Evidence;

use crate::{OracleError, ScoringOracle};

/// Naive Bayes scorer over between-entity tokens
#[derive(Debug, Clone)]
pub struct TokenOracle {
    /// Additive smoothing constant
    smoothing: f64,
    model: Option<NaiveBayes>,
}

#[derive(Debug, Clone, Default)]
struct NaiveBayes {
    log_prior_pos: f64,
    log_prior_neg: f64,
    pos_counts: HashMap<String, f64>,
    neg_counts: HashMap<String, f64>,
    pos_total: f64,
    neg_total: f64,
    vocabulary: usize,
}

impl TokenOracle {
    /// Create an untrained oracle
    pub fn new() -> Self {
        Self {
            smoothing: 1.0,
            model: None,
        }
    }

    /// Set the smoothing constant
    pub fn with_smoothing(mut self, smoothing: f64) -> Self {
        self.smoothing = smoothing.max(f64::EPSILON);
        self
    }

    pub fn is_trained(&self) -> bool {
        self.model.is_some()
    }

    /// Feature strings describing an evidence
    pub fn features(evidence: &Evidence) -> Vec<String> {
        let segment = evidence.segment();
        let between = segment.tokens_between(evidence.o1(), evidence.o2());

        let mut features: Vec<String> = between
            .iter()
            .map(|t| format!("between:{}", t.to_lowercase()))
            .collect();

        let forward = evidence.first().offset() < evidence.second().offset();
        features.push(format!("order:{}", if forward { "forward" } else { "backward" }));

        let gap = match between.len() {
            0 => "0",
            1 => "1",
            2 => "2",
            3..=5 => "3-5",
            _ => "6+",
        };
        features.push(format!("gap:{gap}"));
        features
    }

    fn log_likelihood(&self, model: &NaiveBayes, features: &[String], positive: bool) -> f64 {
        let (counts, total) = if positive {
            (&model.pos_counts, model.pos_total)
        } else {
            (&model.neg_counts, model.neg_total)
        };
        let denominator = total + self.smoothing * model.vocabulary.max(1) as f64;
        features
            .iter()
            .map(|f| {
                let count = counts.get(f).copied().unwrap_or(0.0);
                ((count + self.smoothing) / denominator).ln()
            })
            .sum()
    }
}

impl Default for TokenOracle {
    fn default() -> Self {
        Self::new()
    }
}

impl ScoringOracle for TokenOracle {
    fn train(&mut self, labeled: &[(Evidence, bool)]) -> Result<(), OracleError> {
        let positives = labeled.iter().filter(|(_, label)| *label).count();
        if positives == 0 {
            return Err(OracleError::InsufficientData(format!(
                "no positive examples among {} labeled",
                labeled.len()
            )));
        }
        let negatives = labeled.len() - positives;

        let mut model = NaiveBayes {
            log_prior_pos: ((positives as f64 + 1.0) / (labeled.len() as f64 + 2.0)).ln(),
            log_prior_neg: ((negatives as f64 + 1.0) / (labeled.len() as f64 + 2.0)).ln(),
            ..Default::default()
        };
        let mut vocabulary = HashSet::new();

        for (evidence, label) in labeled {
            let (counts, total) = if *label {
                (&mut model.pos_counts, &mut model.pos_total)
            } else {
                (&mut model.neg_counts, &mut model.neg_total)
            };
            for feature in Self::features(evidence) {
                *counts.entry(feature.clone()).or_insert(0.0) += 1.0;
                *total += 1.0;
                vocabulary.insert(feature);
            }
        }
        model.vocabulary = vocabulary.len();

        debug!(
            positives,
            negatives,
            vocabulary = model.vocabulary,
            "Token oracle trained"
        );
        self.model = Some(model);
        Ok(())
    }

    fn score(&self, evidence: &Evidence) -> f64 {
        let Some(model) = &self.model else {
            return 0.5;
        };
        let features = Self::features(evidence);
        let pos = model.log_prior_pos + self.log_likelihood(model, &features, true);
        let neg = model.log_prior_neg + self.log_likelihood(model, &features, false);

        1.0 / (1.0 + (neg - pos).exp())
    }
}

// ============================================================================
// Tests
// ============================================================================
