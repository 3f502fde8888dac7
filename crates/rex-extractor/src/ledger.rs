//! Human answer ledger
//!
//! Collects the human's judgments between two processing rounds. Answers
//! are keyed by evidence identity; answering the same evidence twice keeps
//! only the later answer.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use rex_core::Evidence;

/// One human judgment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    /// Whether the evidence expresses its fact
    pub label: bool,
    pub answered_at: DateTime<Utc>,
}

impl Answer {
    pub fn new(label: bool) -> Self {
        Self {
            label,
            answered_at: Utc::now(),
        }
    }
}

/// Answers recorded since the last drain
#[derive(Debug, Default)]
pub struct AnswerLedger {
    answers: BTreeMap<Evidence, Answer>,
    /// Answers recorded over the ledger's lifetime, overwrites included
    recorded: usize,
}

impl AnswerLedger {
    /// Create an empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a judgment, returning the label it replaced, if any
    pub fn record(&mut self, evidence: Evidence, label: bool) -> Option<bool> {
        self.recorded += 1;
        self.answers
            .insert(evidence, Answer::new(label))
            .map(|previous| previous.label)
    }

    /// Judgments accumulated since the last drain
    pub fn pending(&self) -> impl Iterator<Item = (&Evidence, bool)> + '_ {
        self.answers.iter().map(|(evidence, answer)| (evidence, answer.label))
    }

    /// Current answer for an evidence
    pub fn get(&self, evidence: &Evidence) -> Option<&Answer> {
        self.answers.get(evidence)
    }

    /// Take every pending judgment, leaving the ledger empty
    pub fn drain(&mut self) -> BTreeMap<Evidence, Answer> {
        std::mem::take(&mut self.answers)
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }

    pub fn total_recorded(&self) -> usize {
        self.recorded
    }
}

// ============================================================================
// Tests
// ============================================================================
