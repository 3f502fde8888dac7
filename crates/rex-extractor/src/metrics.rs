//! Quality Metrics module
//!
//! Precision and recall of proposed facts against a reference set. Matching
//! is exact fact equality; evidence is reduced to its fact first.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use rex_core::{Evidence, Fact};

/// Metrics for relation extraction evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationMetrics {
    /// Proposed facts present in the reference
    pub true_positives: usize,
    /// Proposed facts absent from the reference
    pub false_positives: usize,
    /// Reference facts not proposed
    pub false_negatives: usize,
}

impl RelationMetrics {
    /// Calculate precision (TP / (TP + FP))
    pub fn precision(&self) -> f64 {
        if self.true_positives + self.false_positives == 0 {
            0.0
        } else {
            self.true_positives as f64 / (self.true_positives + self.false_positives) as f64
        }
    }

    /// Calculate recall (TP / (TP + FN))
    pub fn recall(&self) -> f64 {
        if self.true_positives + self.false_negatives == 0 {
            0.0
        } else {
            self.true_positives as f64 / (self.true_positives + self.false_negatives) as f64
        }
    }

    /// Calculate F1 score (2 * P * R / (P + R))
    pub fn f1_score(&self) -> f64 {
        let p = self.precision();
        let r = self.recall();
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }

    /// Number of distinct proposed facts
    pub fn proposed(&self) -> usize {
        self.true_positives + self.false_positives
    }

    /// Number of distinct reference facts
    pub fn reference(&self) -> usize {
        self.true_positives + self.false_negatives
    }
}

/// Compare proposed facts with reference facts
pub fn evaluate<'a, P, R>(proposed: P, reference: R) -> RelationMetrics
where
    P: IntoIterator<Item = &'a Fact>,
    R: IntoIterator<Item = &'a Fact>,
{
    let proposed: BTreeSet<&Fact> = proposed.into_iter().collect();
    let reference: BTreeSet<&Fact> = reference.into_iter().collect();
    let true_positives = proposed.intersection(&reference).count();

    RelationMetrics {
        true_positives,
        false_positives: proposed.len() - true_positives,
        false_negatives: reference.len() - true_positives,
    }
}

/// Compare the facts of two evidence collections
pub fn evaluate_evidence<'a, P, R>(proposed: P, reference: R) -> RelationMetrics
where
    P: IntoIterator<Item = &'a Evidence>,
    R: IntoIterator<Item = &'a Evidence>,
{
    evaluate(
        proposed.into_iter().map(Evidence::fact),
        reference.into_iter().map(Evidence::fact),
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{born_in_corpus, entity, evidence};
    use proptest::prelude::*;

    fn facts(n: usize) -> Vec<Fact> {
        (0..n)
            .map(|i| {
                Fact::new(
                    entity(&format!("p{i}"), "person"),
                    entity(&format!("l{i}"), "location"),
                    "born_in",
                )
            })
            .collect()
    }

    #[test]
    fn test_half_overlap() {
        let f = facts(3);
        let proposed = [f[0].clone(), f[1].clone()];
        let reference = [f[0].clone(), f[2].clone()];

        let metrics = evaluate(&proposed, &reference);
        assert_eq!(metrics.precision(), 0.5);
        assert_eq!(metrics.recall(), 0.5);
        assert_eq!(metrics.f1_score(), 0.5);
    }

    #[test]
    fn test_empty_proposed() {
        let f = facts(1);
        let none: [Fact; 0] = [];

        let metrics = evaluate(&none, &f);
        assert_eq!(metrics.precision(), 0.0);
        assert_eq!(metrics.recall(), 0.0);

        let metrics = evaluate(&none, &none);
        assert_eq!(metrics.precision(), 0.0);
        assert_eq!(metrics.recall(), 0.0);
        assert_eq!(metrics.f1_score(), 0.0);
    }

    #[test]
    fn test_duplicates_count_once() {
        let f = facts(1);
        let proposed = [f[0].clone(), f[0].clone()];

        let metrics = evaluate(&proposed, &f);
        assert_eq!(metrics.proposed(), 1);
        assert_eq!(metrics.precision(), 1.0);
    }

    #[test]
    fn test_reversed_fact_does_not_match() {
        let f = facts(1);
        let reversed = Fact::new(f[0].e2.clone(), f[0].e1.clone(), "born_in");

        let metrics = evaluate([&reversed], &f);
        assert_eq!(metrics.true_positives, 0);
    }

    #[test]
    fn test_evaluate_evidence_compares_facts() {
        let corpus = born_in_corpus();
        let proposed = vec![evidence(&corpus, "doc_1", "albert_einstein", "ulm", "born_in")];
        let reference = vec![
            evidence(&corpus, "doc_1", "albert_einstein", "ulm", "born_in"),
            evidence(&corpus, "doc_2", "marie_curie", "warsaw", "born_in"),
        ];

        let metrics = evaluate_evidence(&proposed, &reference);
        assert_eq!(metrics.precision(), 1.0);
        assert_eq!(metrics.recall(), 0.5);
    }

    proptest! {
        #[test]
        fn prop_metrics_in_unit_range(
            proposed in prop::collection::vec(0usize..10, 0..10),
            reference in prop::collection::vec(0usize..10, 0..10),
        ) {
            let f = facts(10);
            let proposed: Vec<&Fact> = proposed.iter().map(|&i| &f[i]).collect();
            let reference: Vec<&Fact> = reference.iter().map(|&i| &f[i]).collect();

            let metrics = evaluate(proposed.iter().copied(), reference.iter().copied());
            prop_assert!((0.0..=1.0).contains(&metrics.precision()));
            prop_assert!((0.0..=1.0).contains(&metrics.recall()));
            prop_assert!(metrics.true_positives <= metrics.proposed().min(metrics.reference()));
        }
    }
}
