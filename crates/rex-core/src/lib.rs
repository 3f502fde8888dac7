//! Rex Core - Domain models, corpus access and shared types
//!
//! This crate defines the core abstractions used throughout rex:
//! - Document models (documents, segments, entity occurrences)
//! - Relation models (facts and the evidence that supports them)
//! - Read-only corpus access
//! - Common error types
//! - Configuration management

pub mod config;
pub mod corpus;
pub mod model;

pub use config::{AppConfig, BootstrapConfig, ConfigError, CorpusConfig, LoggingConfig};
pub use corpus::{Corpus, DocumentRecord, InMemoryCorpus, OccurrenceRecord, SegmentRecord};
pub use model::{
    Entity, EntityInSegment, Evidence, Fact, IEDocument, PreProcessResult, PreProcessStep,
    SegmentKey, TextSegment,
};

use std::path::PathBuf;

use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for rex operations
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid segment: {0}")]
    InvalidSegment(String),

    #[error("Invalid evidence: {0}")]
    InvalidEvidence(String),

    #[error("Preprocess step {step} requires {requires} on document {document}")]
    MissingPrerequisite {
        document: String,
        step: PreProcessStep,
        requires: PreProcessStep,
    },

    #[error("Preprocess step {step} already computed on document {document}")]
    AlreadyComputed {
        document: String,
        step: PreProcessStep,
    },

    #[error("Invalid preprocess result for {step}: {reason}")]
    InvalidPreprocessResult { step: PreProcessStep, reason: String },

    #[error("Entity key {0} is bound to conflicting entities")]
    DuplicateEntity(String),

    #[error("Duplicate document: {0}")]
    DuplicateDocument(String),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed corpus JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
