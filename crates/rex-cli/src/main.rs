//! Rex CLI - Command-line interface
//!
//! Usage:
//!   rex run <seeds> <output> [--corpus <path>] [--gold <path>] [--report <path>]
//!   rex eval <proposed> <reference> [--corpus <path>]
//!
//! The corpus defaults to `corpus.path` from the configuration
//! (`REX_CORPUS_PATH`).

mod interviewer;

use std::io;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use rex_core::{AppConfig, Evidence, InMemoryCorpus, LoggingConfig};
use rex_extractor::loader::{
    load_evidence_from_csv, load_facts_from_csv, save_labeled_evidence_to_csv,
};
use rex_extractor::{evaluate_evidence, BootstrapPipeline, FactStatus, TokenOracle};

use crate::interviewer::Interviewer;

#[derive(Parser)]
#[command(name = "rex")]
#[command(about = "Bootstrapped relation extraction with a human in the loop")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML); environment variables override it
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run an interactive bootstrap session
    Run {
        /// Seed facts (CSV)
        seeds: PathBuf,
        /// Where to write the labeled evidence (CSV)
        output: PathBuf,
        /// Preprocessed corpus (JSON)
        #[arg(long)]
        corpus: Option<PathBuf>,
        /// Gold-standard evidence for interim evaluation (CSV)
        #[arg(long)]
        gold: Option<PathBuf>,
        /// Questions per round
        #[arg(long)]
        batch_size: Option<usize>,
        /// Write the per-round reports as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Evaluate proposed evidence against a reference
    Eval {
        /// Proposed evidence (CSV)
        proposed: PathBuf,
        /// Reference evidence (CSV)
        reference: PathBuf,
        /// Preprocessed corpus (JSON)
        #[arg(long)]
        corpus: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = load_config(cli.config.as_deref())?;
    init_tracing(&config.logging);

    match cli.command {
        Commands::Run {
            seeds,
            output,
            corpus,
            gold,
            batch_size,
            report,
        } => {
            if let Some(batch_size) = batch_size {
                config.bootstrap.batch_size = batch_size;
            }
            let corpus = load_corpus(corpus, &config)?;
            let session = Session {
                seeds: &seeds,
                output: &output,
                gold: gold.as_deref(),
                report: report.as_deref(),
            };
            run_session(&config, &corpus, session)
        }
        Commands::Eval {
            proposed,
            reference,
            corpus,
        } => {
            let corpus = load_corpus(corpus, &config)?;
            evaluate_files(&corpus, &proposed, &reference)
        }
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    let config = match path {
        Some(path) => AppConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?
            .with_env_override()?,
        None => AppConfig::from_env()?,
    };
    config.validate()?;
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("rex={0},rex_core={0},rex_extractor={0}", logging.level).into()
    });

    // stdout belongs to the interviewer
    if logging.json_format {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
    }
}

fn load_corpus(path: Option<PathBuf>, config: &AppConfig) -> anyhow::Result<InMemoryCorpus> {
    let Some(path) = path.or_else(|| config.corpus.path.clone()) else {
        bail!("No corpus given: pass --corpus or set REX_CORPUS_PATH");
    };
    InMemoryCorpus::from_json_path(&path)
        .with_context(|| format!("Failed to load corpus {}", path.display()))
}

/// File arguments of `rex run`
struct Session<'a> {
    seeds: &'a Path,
    output: &'a Path,
    gold: Option<&'a Path>,
    report: Option<&'a Path>,
}

fn run_session(
    config: &AppConfig,
    corpus: &InMemoryCorpus,
    session: Session<'_>,
) -> anyhow::Result<()> {
    let Session {
        seeds,
        output,
        gold,
        report,
    } = session;

    let seeds = load_facts_from_csv(seeds, corpus)?;
    let mut pipeline =
        BootstrapPipeline::new(corpus, TokenOracle::new(), seeds, &config.bootstrap)?;
    if let Some(gold) = gold {
        let gold = load_evidence_from_csv(gold, corpus)?;
        pipeline = pipeline.with_gold_standard(gold.into_iter().map(|e| e.evidence));
    }
    info!(run_id = %pipeline.run_id(), relation = %pipeline.signature(), "Starting session");

    pipeline.start()?;
    let stdin = io::stdin();
    let mut interviewer = Interviewer::new(stdin.lock(), io::stdout());

    loop {
        let questions: Vec<Evidence> = pipeline.questions_available().cloned().collect();
        if questions.is_empty() {
            break;
        }
        let outcome = interviewer.interview(&questions, |evidence, label| {
            pipeline.add_answer(evidence, label)?;
            Ok(())
        })?;
        if outcome.stopped {
            pipeline.stop();
            break;
        }
        pipeline.force_process()?;
    }

    let labeled = pipeline.labeled_evidence();
    let written = save_labeled_evidence_to_csv(labeled.iter().map(|(e, l)| (e, *l)), output)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let known = pipeline.known_facts();
    let confirmed = known
        .values()
        .filter(|status| **status == FactStatus::HumanConfirmed)
        .count();
    println!();
    println!("Session {} ({})", pipeline.status(), pipeline.signature());
    println!(
        "Known facts: {} ({} confirmed, {} accepted)",
        known.len(),
        confirmed,
        known.len() - confirmed
    );
    println!("Wrote {} labeled evidence to {}", written, output.display());
    if let Some(metrics) = pipeline.reports().last().and_then(|r| r.metrics) {
        println!("Precision: {:.2}", metrics.precision());
        println!("Recall: {:.2}", metrics.recall());
    }

    if let Some(path) = report {
        let json = serde_json::to_string_pretty(pipeline.reports())?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!(path = %path.display(), rounds = pipeline.reports().len(), "Wrote reports");
    }
    Ok(())
}

fn evaluate_files(
    corpus: &InMemoryCorpus,
    proposed: &Path,
    reference: &Path,
) -> anyhow::Result<()> {
    let proposed = load_evidence_from_csv(proposed, corpus)?;
    let reference = load_evidence_from_csv(reference, corpus)?;

    // rows labeled false are explicit rejections, not claims
    let metrics = evaluate_evidence(
        proposed
            .iter()
            .filter(|e| e.label != Some(false))
            .map(|e| &e.evidence),
        reference
            .iter()
            .filter(|e| e.label != Some(false))
            .map(|e| &e.evidence),
    );
    info!(
        true_positives = metrics.true_positives,
        false_positives = metrics.false_positives,
        false_negatives = metrics.false_negatives,
        "Evaluation complete"
    );

    println!("Precision: {:.2}", metrics.precision());
    println!("Recall: {:.2}", metrics.recall());
    Ok(())
}
