//! Bootstrap controller
//!
//! Drives the active-learning loop for one relation:
//!
//! ```text
//! Ready --start--> Running --force_process--> Running ... --> Converged
//!                     \--stop--> Stopped
//! ```
//!
//! Every pass runs RETRAIN -> GENERATE -> SCORE -> SELECT; `force_process`
//! first INCORPORATEs the answers collected since the previous pass. A pass
//! that produces no question converges the pipeline. Nothing happens in the
//! background: each transition is one call from the driving loop.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use rex_core::{BootstrapConfig, ConfigError, Corpus, Evidence, Fact};

use crate::candidates::CandidateGenerator;
use crate::ledger::AnswerLedger;
use crate::metrics::{evaluate, RelationMetrics};
use crate::selector::{QuestionSelector, ScoredEvidence, SelectionStats};
use crate::{OracleError, RelationSignature, ScoringOracle};

// ============================================================================
// Status Types
// ============================================================================

/// Lifecycle state of a pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Created, `start` not called yet
    Ready,
    /// Questions may be answered and processed
    Running,
    /// The last pass produced no question
    Converged,
    /// Ended by the caller
    Stopped,
}

impl std::fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ready => write!(f, "ready"),
            Self::Running => write!(f, "running"),
            Self::Converged => write!(f, "converged"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// Why a fact is known. Human confirmation outranks oracle acceptance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FactStatus {
    /// Scored at or above the accept threshold
    OracleAccepted,
    /// Seed fact or positive human answer
    HumanConfirmed,
}

impl std::fmt::Display for FactStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OracleAccepted => write!(f, "accepted"),
            Self::HumanConfirmed => write!(f, "confirmed"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Provenance {
    Seed,
    Human,
    Oracle { score: f64 },
}

impl Provenance {
    fn status(&self) -> FactStatus {
        match self {
            Self::Seed | Self::Human => FactStatus::HumanConfirmed,
            Self::Oracle { .. } => FactStatus::OracleAccepted,
        }
    }

    fn is_human(&self) -> bool {
        matches!(self, Self::Seed | Self::Human)
    }
}

// ============================================================================
// Errors and Reports
// ============================================================================

/// Errors raised by the bootstrap controller
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("{operation} is not valid while the pipeline is {status}")]
    InvalidState {
        operation: &'static str,
        status: PipelineStatus,
    },

    #[error("At least one seed fact is required")]
    NoSeeds,

    #[error("Seed {fact} does not match relation {expected}")]
    MixedSeeds { fact: String, expected: String },

    #[error("Evidence for {found} cannot be answered in a {expected} session")]
    RelationMismatch { expected: String, found: String },

    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Summary of one RETRAIN..SELECT pass
#[derive(Debug, Clone, Serialize)]
pub struct IterationReport {
    pub run_id: Uuid,
    /// 0 for the pass run by `start`
    pub iteration: usize,
    pub answers_positive: usize,
    pub answers_negative: usize,
    /// Whether the oracle accepted the training set this pass
    pub retrained: bool,
    /// Unlabeled candidates generated
    pub candidates: usize,
    pub selection: SelectionStats,
    pub known_facts: usize,
    pub excluded: usize,
    /// Against the gold standard, when one was given
    pub metrics: Option<RelationMetrics>,
    pub status: PipelineStatus,
}

// ============================================================================
// Bootstrap State
// ============================================================================

/// Mutable state of one bootstrap run
///
/// Known and excluded evidence are disjoint. Each phase of a pass takes the
/// state by reference.
#[derive(Debug, Default)]
pub struct BootstrapState {
    known: BTreeMap<Evidence, Provenance>,
    excluded: BTreeSet<Evidence>,
    seed_facts: BTreeSet<Fact>,
    ledger: AnswerLedger,
    questions: Vec<ScoredEvidence>,
    iteration: usize,
    model_trained: bool,
}

impl BootstrapState {
    /// Passes completed so far
    pub fn iteration(&self) -> usize {
        self.iteration
    }

    pub fn model_trained(&self) -> bool {
        self.model_trained
    }

    pub fn is_known(&self, evidence: &Evidence) -> bool {
        self.known.contains_key(evidence)
    }

    pub fn is_excluded(&self, evidence: &Evidence) -> bool {
        self.excluded.contains(evidence)
    }

    /// Known or excluded; never generated again
    pub fn is_settled(&self, evidence: &Evidence) -> bool {
        self.is_known(evidence) || self.is_excluded(evidence)
    }

    /// Score at which the oracle accepted an evidence
    pub fn oracle_score(&self, evidence: &Evidence) -> Option<f64> {
        match self.known.get(evidence) {
            Some(Provenance::Oracle { score }) => Some(*score),
            _ => None,
        }
    }

    pub fn pending_answers(&self) -> usize {
        self.ledger.len()
    }

    /// Every human judgment so far, seeds included
    fn human_labels(&self) -> Vec<(Evidence, bool)> {
        self.known
            .iter()
            .filter(|(_, provenance)| provenance.is_human())
            .map(|(evidence, _)| (evidence.clone(), true))
            .chain(self.excluded.iter().map(|evidence| (evidence.clone(), false)))
            .collect()
    }

    fn known_facts(&self) -> BTreeMap<Fact, FactStatus> {
        let mut facts: BTreeMap<Fact, FactStatus> = self
            .seed_facts
            .iter()
            .map(|fact| (fact.clone(), FactStatus::HumanConfirmed))
            .collect();
        for (evidence, provenance) in &self.known {
            let status = provenance.status();
            facts
                .entry(evidence.fact().clone())
                .and_modify(|current| *current = (*current).max(status))
                .or_insert(status);
        }
        facts
    }
}

// ============================================================================
// Phases
// ============================================================================

/// INCORPORATE: move drained answers into the known and excluded sets
fn incorporate(state: &mut BootstrapState) -> (usize, usize) {
    let mut positives = 0;
    let mut negatives = 0;

    for (evidence, answer) in state.ledger.drain() {
        if answer.label {
            state.excluded.remove(&evidence);
            state.known.insert(evidence, Provenance::Human);
            positives += 1;
        } else {
            state.known.remove(&evidence);
            state.excluded.insert(evidence);
            negatives += 1;
        }
    }

    (positives, negatives)
}

/// RETRAIN: train on every human label; keep the old model on failure
fn retrain<O: ScoringOracle + ?Sized>(state: &mut BootstrapState, oracle: &mut O) -> bool {
    let labeled = state.human_labels();
    match oracle.train(&labeled) {
        Ok(()) => {
            state.model_trained = true;
            true
        }
        Err(OracleError::InsufficientData(reason)) => {
            warn!(
                %reason,
                labeled = labeled.len(),
                keeping_previous = state.model_trained,
                "Skipping retrain"
            );
            false
        }
    }
}

/// GENERATE: candidates not already known or excluded
fn generate<C: Corpus + ?Sized>(
    state: &BootstrapState,
    generator: &CandidateGenerator,
    corpus: &C,
) -> Vec<Evidence> {
    generator
        .generate_excluding(corpus, |evidence| state.is_settled(evidence))
        .collect()
}

/// SCORE: unscored until a model has been trained once
fn score<O: ScoringOracle + ?Sized>(
    state: &BootstrapState,
    oracle: &O,
    pool: Vec<Evidence>,
) -> Vec<ScoredEvidence> {
    if !state.model_trained {
        return pool
            .into_iter()
            .map(|evidence| ScoredEvidence::new(evidence, None))
            .collect();
    }
    let scores = oracle.score_batch(&pool);
    if scores.len() != pool.len() {
        warn!(
            candidates = pool.len(),
            scores = scores.len(),
            "Oracle returned a mismatched score batch"
        );
    }
    let mut scores = scores.into_iter();
    pool.into_iter()
        .map(|evidence| {
            // missing or non-finite scores count as unscored
            let score = scores
                .next()
                .filter(|score| score.is_finite())
                .map(|score| score.clamp(0.0, 1.0));
            ScoredEvidence::new(evidence, score)
        })
        .collect()
}

/// SELECT: accept confident positives, keep the batch of questions
fn select(
    state: &mut BootstrapState,
    selector: &QuestionSelector,
    scored: Vec<ScoredEvidence>,
) -> SelectionStats {
    let selection = selector.select(scored);
    let stats = selection.stats();

    for item in selection.accepted {
        let score = item.confidence();
        state.known.insert(item.evidence, Provenance::Oracle { score });
    }
    state.questions = selection.questions;
    stats
}

// ============================================================================
// Bootstrap Pipeline
// ============================================================================

/// Active-learning controller for one relation
pub struct BootstrapPipeline<C, O> {
    run_id: Uuid,
    corpus: C,
    oracle: O,
    generator: CandidateGenerator,
    selector: QuestionSelector,
    status: PipelineStatus,
    state: BootstrapState,
    gold: Option<BTreeSet<Fact>>,
    reports: Vec<IterationReport>,
}

impl<C: Corpus, O: ScoringOracle> BootstrapPipeline<C, O> {
    /// Create a pipeline for the relation of the seed facts.
    ///
    /// All seeds must share one relation and one pair of entity kinds.
    pub fn new(
        corpus: C,
        oracle: O,
        seeds: impl IntoIterator<Item = Fact>,
        config: &BootstrapConfig,
    ) -> Result<Self, PipelineError> {
        config.validate()?;

        let seeds: BTreeSet<Fact> = seeds.into_iter().collect();
        let signature = seeds
            .iter()
            .next()
            .map(RelationSignature::of_fact)
            .ok_or(PipelineError::NoSeeds)?;
        if let Some(odd) = seeds.iter().find(|fact| !signature.matches(fact)) {
            return Err(PipelineError::MixedSeeds {
                fact: odd.to_string(),
                expected: signature.to_string(),
            });
        }

        let run_id = Uuid::new_v4();
        info!(%run_id, relation = %signature, seeds = seeds.len(), "Bootstrap pipeline created");

        Ok(Self {
            run_id,
            corpus,
            oracle,
            generator: CandidateGenerator::new(signature),
            selector: QuestionSelector::from_config(config),
            status: PipelineStatus::Ready,
            state: BootstrapState {
                seed_facts: seeds,
                ..Default::default()
            },
            gold: None,
            reports: Vec::new(),
        })
    }

    /// Track precision and recall against gold-standard evidence
    pub fn with_gold_standard(mut self, gold: impl IntoIterator<Item = Evidence>) -> Self {
        self.gold = Some(gold.into_iter().map(|e| e.fact().clone()).collect());
        self
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    pub fn signature(&self) -> &RelationSignature {
        self.generator.signature()
    }

    pub fn state(&self) -> &BootstrapState {
        &self.state
    }

    pub fn corpus(&self) -> &C {
        &self.corpus
    }

    pub fn oracle(&self) -> &O {
        &self.oracle
    }

    /// Reports of every pass, oldest first
    pub fn reports(&self) -> &[IterationReport] {
        &self.reports
    }

    fn expect_running(&self, operation: &'static str) -> Result<(), PipelineError> {
        if self.status != PipelineStatus::Running {
            return Err(PipelineError::InvalidState {
                operation,
                status: self.status,
            });
        }
        Ok(())
    }

    /// Ground the seeds in the corpus and prepare the first batch.
    ///
    /// Returns once the first batch (possibly empty) is ready.
    pub fn start(&mut self) -> Result<IterationReport, PipelineError> {
        if self.status != PipelineStatus::Ready {
            return Err(PipelineError::InvalidState {
                operation: "start",
                status: self.status,
            });
        }
        self.status = PipelineStatus::Running;

        let seed_evidence = self
            .generator
            .evidence_for_facts(&self.corpus, &self.state.seed_facts);
        let grounded: BTreeSet<&Fact> = seed_evidence.iter().map(Evidence::fact).collect();
        for fact in self.state.seed_facts.iter().filter(|f| !grounded.contains(f)) {
            warn!(run_id = %self.run_id, %fact, "Seed fact has no evidence in the corpus");
        }
        info!(
            run_id = %self.run_id,
            evidence = seed_evidence.len(),
            grounded = grounded.len(),
            "Seed facts grounded"
        );
        for evidence in seed_evidence {
            self.state.known.insert(evidence, Provenance::Seed);
        }

        Ok(self.advance(0, 0))
    }

    /// Questions of the current batch, most uncertain first.
    ///
    /// The same batch is returned until the next `force_process`. Empty
    /// once converged or stopped.
    pub fn questions_available(&self) -> impl Iterator<Item = &Evidence> + '_ {
        self.state.questions.iter().map(|q| &q.evidence)
    }

    /// Current batch together with the oracle's scores
    pub fn scored_questions(&self) -> &[ScoredEvidence] {
        &self.state.questions
    }

    /// Record a human judgment for the next pass
    pub fn add_answer(&mut self, evidence: Evidence, label: bool) -> Result<(), PipelineError> {
        self.expect_running("add_answer")?;
        let signature = self.generator.signature();
        if !signature.matches(evidence.fact()) {
            return Err(PipelineError::RelationMismatch {
                expected: signature.to_string(),
                found: evidence.fact().to_string(),
            });
        }

        debug!(run_id = %self.run_id, fact = %evidence.fact(), label, "Answer recorded");
        if let Some(previous) = self.state.ledger.record(evidence, label) {
            debug!(run_id = %self.run_id, previous, label, "Earlier answer overwritten");
        }
        Ok(())
    }

    /// Incorporate pending answers and prepare the next batch
    pub fn force_process(&mut self) -> Result<IterationReport, PipelineError> {
        self.expect_running("force_process")?;
        let (positives, negatives) = incorporate(&mut self.state);
        info!(
            run_id = %self.run_id,
            positives,
            negatives,
            "Answers incorporated"
        );
        Ok(self.advance(positives, negatives))
    }

    /// End the session; pending answers are still incorporated
    pub fn stop(&mut self) {
        if matches!(self.status, PipelineStatus::Ready | PipelineStatus::Running) {
            let (positives, negatives) = incorporate(&mut self.state);
            self.state.questions.clear();
            self.status = PipelineStatus::Stopped;
            info!(run_id = %self.run_id, positives, negatives, "Bootstrap stopped");
        }
    }

    /// Snapshot of every known fact and why it is known
    pub fn known_facts(&self) -> BTreeMap<Fact, FactStatus> {
        self.state.known_facts()
    }

    /// Snapshot of every labeled evidence: known ones as `true`, excluded
    /// ones as `false`
    pub fn labeled_evidence(&self) -> Vec<(Evidence, bool)> {
        let mut labeled: BTreeMap<&Evidence, bool> =
            self.state.known.keys().map(|e| (e, true)).collect();
        labeled.extend(self.state.excluded.iter().map(|e| (e, false)));
        labeled
            .into_iter()
            .map(|(evidence, label)| (evidence.clone(), label))
            .collect()
    }

    /// RETRAIN -> GENERATE -> SCORE -> SELECT, then check convergence
    fn advance(&mut self, answers_positive: usize, answers_negative: usize) -> IterationReport {
        let retrained = retrain(&mut self.state, &mut self.oracle);
        let pool = generate(&self.state, &self.generator, &self.corpus);
        let candidates = pool.len();
        let scored = score(&self.state, &self.oracle, pool);
        let selection = select(&mut self.state, &self.selector, scored);

        let known = self.state.known_facts();
        let metrics = self
            .gold
            .as_ref()
            .map(|gold| evaluate(known.keys(), gold.iter()));
        if let Some(metrics) = &metrics {
            info!(
                run_id = %self.run_id,
                iteration = self.state.iteration,
                precision = metrics.precision(),
                recall = metrics.recall(),
                "Interim evaluation"
            );
        }

        if selection.questions == 0 {
            self.status = PipelineStatus::Converged;
            info!(
                run_id = %self.run_id,
                iteration = self.state.iteration,
                known_facts = known.len(),
                "Bootstrap converged"
            );
        }

        let report = IterationReport {
            run_id: self.run_id,
            iteration: self.state.iteration,
            answers_positive,
            answers_negative,
            retrained,
            candidates,
            selection,
            known_facts: known.len(),
            excluded: self.state.excluded.len(),
            metrics,
            status: self.status,
        };
        info!(
            run_id = %self.run_id,
            iteration = report.iteration,
            candidates,
            questions = selection.questions,
            accepted = selection.accepted,
            rejected = selection.rejected,
            "Pass complete"
        );

        self.state.iteration += 1;
        self.reports.push(report.clone());
        report
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::TokenOracle;
    use crate::test_support::{
        born_in_corpus, corpus_from_markup, entity, evidence, fact, KeywordOracle, NanOracle,
        ShortBatchOracle, UntrainableOracle,
    };
    use rex_core::InMemoryCorpus;

    fn seeds(corpus: &InMemoryCorpus) -> Vec<Fact> {
        vec![fact(corpus, "albert_einstein", "ulm", "born_in")]
    }

    fn keyword_pipeline(
        corpus: &InMemoryCorpus,
    ) -> BootstrapPipeline<&InMemoryCorpus, KeywordOracle> {
        BootstrapPipeline::new(
            corpus,
            KeywordOracle::new(0.95, 0.5),
            seeds(corpus),
            &BootstrapConfig::default(),
        )
        .unwrap()
    }

    fn questions<C: Corpus, O: ScoringOracle>(p: &BootstrapPipeline<C, O>) -> Vec<Evidence> {
        p.questions_available().cloned().collect()
    }

    #[test]
    fn test_requires_seeds() {
        let corpus = born_in_corpus();
        let result = BootstrapPipeline::new(
            &corpus,
            TokenOracle::new(),
            Vec::new(),
            &BootstrapConfig::default(),
        );
        assert!(matches!(result, Err(PipelineError::NoSeeds)));
    }

    #[test]
    fn test_rejects_mixed_seeds() {
        let corpus = born_in_corpus();
        let seeds = vec![
            fact(&corpus, "albert_einstein", "ulm", "born_in"),
            fact(&corpus, "marie_curie", "paris", "worked_in"),
        ];
        let result =
            BootstrapPipeline::new(&corpus, TokenOracle::new(), seeds, &BootstrapConfig::default());
        assert!(matches!(result, Err(PipelineError::MixedSeeds { .. })));
    }

    #[test]
    fn test_rejects_invalid_config() {
        let corpus = born_in_corpus();
        let config = BootstrapConfig {
            batch_size: 0,
            ..Default::default()
        };
        let result = BootstrapPipeline::new(&corpus, TokenOracle::new(), seeds(&corpus), &config);
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn test_operations_require_running() {
        let corpus = born_in_corpus();
        let mut pipeline = keyword_pipeline(&corpus);
        let e = evidence(&corpus, "doc_2", "marie_curie", "paris", "born_in");

        assert_eq!(pipeline.status(), PipelineStatus::Ready);
        assert!(matches!(
            pipeline.add_answer(e, true),
            Err(PipelineError::InvalidState { operation: "add_answer", .. })
        ));
        assert!(pipeline.force_process().is_err());

        pipeline.start().unwrap();
        assert!(matches!(
            pipeline.start(),
            Err(PipelineError::InvalidState { operation: "start", .. })
        ));
    }

    #[test]
    fn test_start_accepts_confident_and_asks_uncertain() {
        let corpus = born_in_corpus();
        let mut pipeline = keyword_pipeline(&corpus);

        let report = pipeline.start().unwrap();
        assert_eq!(pipeline.status(), PipelineStatus::Running);
        assert_eq!(report.iteration, 0);
        assert!(report.retrained);
        assert_eq!(report.candidates, 4);
        assert_eq!(report.selection.accepted, 3);

        let asked = questions(&pipeline);
        assert_eq!(asked, vec![evidence(&corpus, "doc_2", "marie_curie", "paris", "born_in")]);

        let known = pipeline.known_facts();
        assert_eq!(
            known.get(&fact(&corpus, "albert_einstein", "ulm", "born_in")),
            Some(&FactStatus::HumanConfirmed)
        );
        assert_eq!(
            known.get(&fact(&corpus, "marie_curie", "warsaw", "born_in")),
            Some(&FactStatus::OracleAccepted)
        );
        let warsaw = evidence(&corpus, "doc_2", "marie_curie", "warsaw", "born_in");
        assert_eq!(pipeline.state().oracle_score(&warsaw), Some(0.95));
    }

    #[test]
    fn test_questions_are_idempotent() {
        let corpus = born_in_corpus();
        let mut pipeline = BootstrapPipeline::new(
            &corpus,
            UntrainableOracle,
            seeds(&corpus),
            &BootstrapConfig::default(),
        )
        .unwrap();
        pipeline.start().unwrap();

        let first = questions(&pipeline);
        assert_eq!(first.len(), 4);
        assert_eq!(questions(&pipeline), first);

        pipeline.add_answer(first[0].clone(), true).unwrap();
        assert_eq!(questions(&pipeline), first);
    }

    #[test]
    fn test_insufficient_data_leaves_pool_unscored() {
        let corpus = born_in_corpus();
        let mut pipeline = BootstrapPipeline::new(
            &corpus,
            UntrainableOracle,
            seeds(&corpus),
            &BootstrapConfig::default(),
        )
        .unwrap();

        let report = pipeline.start().unwrap();
        assert!(!report.retrained);
        assert!(!pipeline.state().model_trained());
        // the oracle would score 0.99, but it was never trained
        assert!(pipeline.scored_questions().iter().all(|q| q.score.is_none()));
        assert_eq!(report.selection.accepted, 0);
    }

    #[test]
    fn test_insufficient_data_keeps_previous_model() {
        let corpus = born_in_corpus();
        let mut pipeline = keyword_pipeline(&corpus);
        pipeline.start().unwrap();

        let seed = evidence(&corpus, "doc_1", "albert_einstein", "ulm", "born_in");
        pipeline.add_answer(seed.clone(), false).unwrap();
        let report = pipeline.force_process().unwrap();

        assert!(!report.retrained);
        assert!(pipeline.state().model_trained());
        assert!(pipeline.state().is_excluded(&seed));
        assert_eq!(pipeline.scored_questions()[0].score, Some(0.5));
        assert_eq!(pipeline.oracle().trained, 1);
    }

    #[test]
    fn test_answers_are_never_regenerated() {
        let corpus = born_in_corpus();
        let config = BootstrapConfig {
            batch_size: 2,
            ..Default::default()
        };
        let mut pipeline =
            BootstrapPipeline::new(&corpus, UntrainableOracle, seeds(&corpus), &config).unwrap();
        pipeline.start().unwrap();

        let first = questions(&pipeline);
        assert_eq!(first.len(), 2);
        pipeline.add_answer(first[0].clone(), true).unwrap();
        pipeline.add_answer(first[1].clone(), false).unwrap();
        let report = pipeline.force_process().unwrap();

        assert_eq!(report.answers_positive, 1);
        assert_eq!(report.answers_negative, 1);
        assert_eq!(report.candidates, 2);
        let second = questions(&pipeline);
        assert!(second.iter().all(|q| !first.contains(q)));
        assert!(pipeline.state().is_known(&first[0]));
        assert!(pipeline.state().is_excluded(&first[1]));
    }

    #[test]
    fn test_last_answer_wins() {
        let corpus = born_in_corpus();
        let mut pipeline = keyword_pipeline(&corpus);
        pipeline.start().unwrap();

        let paris = evidence(&corpus, "doc_2", "marie_curie", "paris", "born_in");
        pipeline.add_answer(paris.clone(), true).unwrap();
        pipeline.add_answer(paris.clone(), false).unwrap();
        assert_eq!(pipeline.state().pending_answers(), 1);

        let report = pipeline.force_process().unwrap();
        assert_eq!(report.answers_negative, 1);
        assert_eq!(report.answers_positive, 0);
        assert!(pipeline.state().is_excluded(&paris));
        assert!(!pipeline
            .known_facts()
            .contains_key(&fact(&corpus, "marie_curie", "paris", "born_in")));
    }

    #[test]
    fn test_converges_when_nothing_left() {
        let corpus = born_in_corpus();
        let mut pipeline = keyword_pipeline(&corpus);
        pipeline.start().unwrap();

        let paris = evidence(&corpus, "doc_2", "marie_curie", "paris", "born_in");
        pipeline.add_answer(paris, false).unwrap();
        let report = pipeline.force_process().unwrap();

        assert_eq!(report.candidates, 0);
        assert_eq!(report.status, PipelineStatus::Converged);
        assert_eq!(pipeline.status(), PipelineStatus::Converged);
        assert_eq!(pipeline.questions_available().count(), 0);
        assert!(pipeline.force_process().is_err());
    }

    #[test]
    fn test_loop_terminates_on_finite_corpus() {
        let corpus = born_in_corpus();
        let truth = [
            fact(&corpus, "marie_curie", "warsaw", "born_in"),
            fact(&corpus, "niels_bohr", "copenhagen", "born_in"),
        ];
        let config = BootstrapConfig {
            batch_size: 1,
            ..Default::default()
        };
        let mut pipeline =
            BootstrapPipeline::new(&corpus, TokenOracle::new(), seeds(&corpus), &config).unwrap();
        pipeline.start().unwrap();

        let mut rounds = 0;
        loop {
            let batch = questions(&pipeline);
            if batch.is_empty() {
                break;
            }
            for question in batch {
                let label = truth.contains(question.fact());
                pipeline.add_answer(question, label).unwrap();
            }
            pipeline.force_process().unwrap();
            rounds += 1;
            assert!(rounds <= 5, "loop did not converge");
        }

        assert_eq!(pipeline.status(), PipelineStatus::Converged);
        assert_eq!(pipeline.reports().len(), rounds + 1);
    }

    #[test]
    fn test_gold_standard_metrics() {
        let corpus = born_in_corpus();
        let gold = vec![
            evidence(&corpus, "doc_1", "albert_einstein", "ulm", "born_in"),
            evidence(&corpus, "doc_2", "marie_curie", "warsaw", "born_in"),
        ];
        let mut pipeline = keyword_pipeline(&corpus).with_gold_standard(gold);

        let report = pipeline.start().unwrap();
        let metrics = report.metrics.unwrap();
        // known: einstein (seed) + warsaw, copenhagen, malmo (accepted)
        assert_eq!(metrics.true_positives, 2);
        assert_eq!(metrics.false_positives, 2);
        assert_eq!(metrics.recall(), 1.0);
        assert_eq!(metrics.precision(), 0.5);
    }

    #[test]
    fn test_stop_keeps_pending_answers() {
        let corpus = born_in_corpus();
        let mut pipeline = keyword_pipeline(&corpus);
        pipeline.start().unwrap();

        let paris = evidence(&corpus, "doc_2", "marie_curie", "paris", "born_in");
        pipeline.add_answer(paris.clone(), true).unwrap();
        pipeline.stop();

        assert_eq!(pipeline.status(), PipelineStatus::Stopped);
        assert_eq!(pipeline.questions_available().count(), 0);
        assert_eq!(
            pipeline
                .known_facts()
                .get(&fact(&corpus, "marie_curie", "paris", "born_in")),
            Some(&FactStatus::HumanConfirmed)
        );
        assert!(pipeline.labeled_evidence().contains(&(paris, true)));
        let seed = evidence(&corpus, "doc_1", "albert_einstein", "ulm", "born_in");
        assert!(pipeline.add_answer(seed, true).is_err());
    }

    #[test]
    fn test_relation_mismatch() {
        let corpus = born_in_corpus();
        let mut pipeline = keyword_pipeline(&corpus);
        pipeline.start().unwrap();

        let other = evidence(&corpus, "doc_2", "marie_curie", "paris", "worked_in");
        assert!(matches!(
            pipeline.add_answer(other, true),
            Err(PipelineError::RelationMismatch { .. })
        ));
    }

    #[test]
    fn test_answer_with_wrong_kinds_is_rejected() {
        let corpus = born_in_corpus();
        let mut pipeline = keyword_pipeline(&corpus);
        pipeline.start().unwrap();

        // born_in(location, person) is outside born_in(person, location)
        let reversed = evidence(&corpus, "doc_1", "ulm", "albert_einstein", "born_in");
        assert!(matches!(
            pipeline.add_answer(reversed.clone(), true),
            Err(PipelineError::RelationMismatch { .. })
        ));
        pipeline.force_process().unwrap();
        assert!(!pipeline.state().is_known(&reversed));
        assert!(!pipeline.known_facts().contains_key(reversed.fact()));
    }

    #[test]
    fn test_non_finite_scores_count_as_unscored() {
        let corpus = born_in_corpus();
        let mut pipeline = BootstrapPipeline::new(
            &corpus,
            NanOracle,
            seeds(&corpus),
            &BootstrapConfig::default(),
        )
        .unwrap();

        let report = pipeline.start().unwrap();
        assert!(report.retrained);
        assert_eq!(report.selection.questions, 4);
        let scores: Vec<Option<f64>> =
            pipeline.scored_questions().iter().map(|q| q.score).collect();
        assert_eq!(scores.iter().filter(|s| s.is_none()).count(), 2);
        assert!(scores.iter().flatten().all(|s| *s == 0.6));

        let first = questions(&pipeline)[0].clone();
        pipeline.add_answer(first, false).unwrap();
        let report = pipeline.force_process().unwrap();
        assert_eq!(report.candidates, 3);
        assert_eq!(report.selection.questions, 3);
    }

    #[test]
    fn test_short_score_batch_keeps_every_candidate() {
        let corpus = born_in_corpus();
        let mut pipeline = BootstrapPipeline::new(
            &corpus,
            ShortBatchOracle,
            seeds(&corpus),
            &BootstrapConfig::default(),
        )
        .unwrap();

        let report = pipeline.start().unwrap();
        assert_eq!(report.candidates, 4);
        assert_eq!(report.selection.questions, 4);
        let unscored = pipeline
            .scored_questions()
            .iter()
            .filter(|q| q.score.is_none())
            .count();
        assert_eq!(unscored, 3);
        assert_eq!(pipeline.status(), PipelineStatus::Running);
    }

    #[test]
    fn test_unexpressed_seed_still_known() {
        let corpus = corpus_from_markup(&[(
            "doc",
            &["{Ada Lovelace|person} lived in {London|location} ."],
        )]);
        let seed = Fact::new(
            entity("ada_lovelace", "person"),
            entity("paris", "location"),
            "born_in",
        );

        let mut pipeline = BootstrapPipeline::new(
            &corpus,
            TokenOracle::new(),
            vec![seed.clone()],
            &BootstrapConfig::default(),
        )
        .unwrap();
        let report = pipeline.start().unwrap();

        // no seed evidence, so nothing to train on and one unscored question
        assert!(!report.retrained);
        assert_eq!(questions(&pipeline).len(), 1);
        assert_eq!(pipeline.known_facts().get(&seed), Some(&FactStatus::HumanConfirmed));
    }

    #[test]
    fn test_independent_pipelines_share_a_corpus() {
        let corpus = born_in_corpus();
        let mut born = keyword_pipeline(&corpus);
        let mut worked = BootstrapPipeline::new(
            &corpus,
            KeywordOracle::new(0.95, 0.5),
            vec![fact(&corpus, "marie_curie", "paris", "worked_in")],
            &BootstrapConfig::default(),
        )
        .unwrap();

        born.start().unwrap();
        worked.start().unwrap();
        assert_ne!(born.run_id(), worked.run_id());
        assert_eq!(worked.signature().relation, "worked_in");
        assert!(questions(&worked)
            .iter()
            .all(|q| q.fact().relation == "worked_in"));
    }
}
