//! CSV import/export of facts and evidence
//!
//! Fact rows: `e1_key, e1_kind, e2_key, e2_kind, relation`.
//! Evidence rows add `document, segment_offset, o1, o2, label`, where
//! `label` is `true`, `false` or empty.
//!
//! Every reference is resolved against the corpus while loading. A row
//! that cannot be resolved fails the whole load with its row number and
//! field.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use rex_core::{Corpus, Entity, Evidence, Fact};

/// Errors raised while reading or writing CSV files
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed CSV at row {row}: {source}")]
    Csv {
        row: usize,
        #[source]
        source: csv::Error,
    },

    #[error("Row {row}, field {field}: {message}")]
    Row {
        row: usize,
        field: &'static str,
        message: String,
    },

    #[error("Failed to write CSV: {0}")]
    Write(#[from] csv::Error),
}

/// Evidence read from CSV with its optional label
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledEvidence {
    pub evidence: Evidence,
    pub label: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize)]
struct FactRow {
    e1_key: String,
    e1_kind: String,
    e2_key: String,
    e2_kind: String,
    relation: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct EvidenceRow {
    e1_key: String,
    e1_kind: String,
    e2_key: String,
    e2_kind: String,
    relation: String,
    document: String,
    segment_offset: usize,
    o1: usize,
    o2: usize,
    label: Option<bool>,
}

// ============================================================================
// Loading
// ============================================================================

/// Read fact rows, resolving entities against the corpus
pub fn read_facts<R: Read, C: Corpus + ?Sized>(
    reader: R,
    corpus: &C,
) -> Result<Vec<Fact>, LoadError> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut facts = Vec::new();

    for (index, result) in reader.deserialize::<FactRow>().enumerate() {
        let row = index + 1;
        let record = result.map_err(|source| LoadError::Csv { row, source })?;
        let e1 = resolve_entity(
            corpus,
            row,
            &record.e1_key,
            &record.e1_kind,
            ("e1_key", "e1_kind"),
        )?;
        let e2 = resolve_entity(
            corpus,
            row,
            &record.e2_key,
            &record.e2_kind,
            ("e2_key", "e2_kind"),
        )?;
        facts.push(Fact::new(e1, e2, record.relation));
    }

    Ok(facts)
}

/// Read evidence rows, resolving entities and segments against the corpus
pub fn read_evidence<R: Read, C: Corpus + ?Sized>(
    reader: R,
    corpus: &C,
) -> Result<Vec<LabeledEvidence>, LoadError> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut evidence = Vec::new();

    for (index, result) in reader.deserialize::<EvidenceRow>().enumerate() {
        let row = index + 1;
        let record = result.map_err(|source| LoadError::Csv { row, source })?;
        let e1 = resolve_entity(
            corpus,
            row,
            &record.e1_key,
            &record.e1_kind,
            ("e1_key", "e1_kind"),
        )?;
        let e2 = resolve_entity(
            corpus,
            row,
            &record.e2_key,
            &record.e2_kind,
            ("e2_key", "e2_kind"),
        )?;

        if corpus.document(&record.document).is_none() {
            return Err(LoadError::Row {
                row,
                field: "document",
                message: format!("unknown document {}", record.document),
            });
        }
        let segment = corpus
            .segment(&record.document, record.segment_offset)
            .ok_or_else(|| LoadError::Row {
                row,
                field: "segment_offset",
                message: format!(
                    "document {} has no segment at offset {}",
                    record.document, record.segment_offset
                ),
            })?;

        let field = match segment.entities().get(record.o1) {
            Some(occurrence) if occurrence.key() == e1.key => "o2",
            _ => "o1",
        };
        let fact = Fact::new(e1, e2, record.relation);
        let item =
            Evidence::new(fact, segment, record.o1, record.o2).map_err(|e| LoadError::Row {
                row,
                field,
                message: e.to_string(),
            })?;

        evidence.push(LabeledEvidence {
            evidence: item,
            label: record.label,
        });
    }

    Ok(evidence)
}

fn resolve_entity<C: Corpus + ?Sized>(
    corpus: &C,
    row: usize,
    key: &str,
    kind: &str,
    fields: (&'static str, &'static str),
) -> Result<Arc<Entity>, LoadError> {
    let entity = corpus.entity(key).ok_or_else(|| LoadError::Row {
        row,
        field: fields.0,
        message: format!("unknown entity {key}"),
    })?;
    if entity.kind != kind {
        return Err(LoadError::Row {
            row,
            field: fields.1,
            message: format!("entity {key} is a {}, not a {kind}", entity.kind),
        });
    }
    Ok(entity)
}

/// Load seed facts from a CSV file
pub fn load_facts_from_csv<C: Corpus + ?Sized>(
    path: impl AsRef<Path>,
    corpus: &C,
) -> Result<Vec<Fact>, LoadError> {
    let path = path.as_ref();
    let facts = read_facts(open(path)?, corpus)?;
    info!(path = %path.display(), facts = facts.len(), "Loaded facts");
    Ok(facts)
}

/// Load evidence from a CSV file
pub fn load_evidence_from_csv<C: Corpus + ?Sized>(
    path: impl AsRef<Path>,
    corpus: &C,
) -> Result<Vec<LabeledEvidence>, LoadError> {
    let path = path.as_ref();
    let evidence = read_evidence(open(path)?, corpus)?;
    info!(path = %path.display(), evidence = evidence.len(), "Loaded evidence");
    Ok(evidence)
}

fn open(path: &Path) -> Result<std::fs::File, LoadError> {
    std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ============================================================================
// Saving
// ============================================================================

/// Write labeled evidence rows
pub fn write_labeled_evidence<'a, W, I>(writer: W, items: I) -> Result<usize, LoadError>
where
    W: Write,
    I: IntoIterator<Item = (&'a Evidence, bool)>,
{
    let mut writer = csv::Writer::from_writer(writer);
    let mut written = 0;

    for (evidence, label) in items {
        let fact = evidence.fact();
        writer.serialize(EvidenceRow {
            e1_key: fact.e1.key.clone(),
            e1_kind: fact.e1.kind.clone(),
            e2_key: fact.e2.key.clone(),
            e2_kind: fact.e2.kind.clone(),
            relation: fact.relation.clone(),
            document: evidence.segment().document_id().to_string(),
            segment_offset: evidence.segment().offset(),
            o1: evidence.o1(),
            o2: evidence.o2(),
            label: Some(label),
        })?;
        written += 1;
    }

    writer.flush().map_err(|e| LoadError::Write(e.into()))?;
    Ok(written)
}

/// Write fact rows
pub fn write_facts<'a, W, I>(writer: W, facts: I) -> Result<usize, LoadError>
where
    W: Write,
    I: IntoIterator<Item = &'a Fact>,
{
    let mut writer = csv::Writer::from_writer(writer);
    let mut written = 0;

    for fact in facts {
        writer.serialize(FactRow {
            e1_key: fact.e1.key.clone(),
            e1_kind: fact.e1.kind.clone(),
            e2_key: fact.e2.key.clone(),
            e2_kind: fact.e2.kind.clone(),
            relation: fact.relation.clone(),
        })?;
        written += 1;
    }

    writer.flush().map_err(|e| LoadError::Write(e.into()))?;
    Ok(written)
}

/// Save labeled evidence to a CSV file
pub fn save_labeled_evidence_to_csv<'a, I>(
    items: I,
    path: impl AsRef<Path>,
) -> Result<usize, LoadError>
where
    I: IntoIterator<Item = (&'a Evidence, bool)>,
{
    let path = path.as_ref();
    let file = std::fs::File::create(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let written = write_labeled_evidence(file, items)?;
    info!(path = %path.display(), rows = written, "Saved labeled evidence");
    Ok(written)
}

// ============================================================================
// Tests
// ============================================================================
