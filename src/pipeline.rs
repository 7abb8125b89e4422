//! Ingestion stages: prepare, embed and import.
//!
//! Each stage reads the previous stage's artifact, writes its own and
//! returns a summary with counts. Stages are order-preserving.

use std::path::Path;

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};

use crate::artifacts;
use crate::record::{CanonicalRecord, EmbeddedRecord};
use crate::semantic::indexer::{self, Indexer, UpsertOutcome, UpsertReport};
use crate::semantic::{normalize_records, CleanOptions, Embedder};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PrepareSummary {
    pub rows_read: usize,
    pub rows_skipped: usize,
    pub duplicates_removed: usize,
    pub records_written: usize,
}

/// Raw CSV to canonical CSV. Returns the canonical records as well.
pub fn prepare(
    raw_csv: &Path,
    cleaned_csv: &Path,
    opts: CleanOptions,
) -> anyhow::Result<(PrepareSummary, Vec<CanonicalRecord>)> {
    let _span = tracing::info_span!("prepare").entered();
    let raw = artifacts::read_raw_csv(raw_csv)
        .with_context(|| format!("failed to read raw catalog {}", raw_csv.display()))?;
    let rows_read = raw.rows.len();

    let outcome = normalize_records(raw.rows, opts);
    artifacts::write_canonical_csv(cleaned_csv, &outcome.records)
        .context("failed to write canonical catalog")?;

    let summary = PrepareSummary {
        rows_read,
        rows_skipped: raw.skipped,
        duplicates_removed: outcome.duplicates_removed,
        records_written: outcome.records.len(),
    };
    log::info!(
        "prepared {} records ({} rows read, {} malformed, {} duplicates)",
        summary.records_written,
        summary.rows_read,
        summary.rows_skipped,
        summary.duplicates_removed
    );

    Ok((summary, outcome.records))
}

#[derive(Debug, Default)]
pub struct EmbedSummary {
    pub records: Vec<EmbeddedRecord>,
    pub skipped: usize,
}

/// Embed every record in chunks of `batch_size`.
///
/// Each chunk's vectors are zipped back onto its records by position.
/// Records whose combined text is blank are skipped with a warning.
pub fn embed_records(
    embedder: &dyn Embedder,
    records: Vec<CanonicalRecord>,
    batch_size: usize,
    show_progress: bool,
) -> anyhow::Result<EmbedSummary> {
    let mut skipped = 0;
    let mut pending = Vec::with_capacity(records.len());
    for (idx, record) in records.into_iter().enumerate() {
        let text = record.combined_text();
        if text.trim().is_empty() {
            log::warn!("record {idx} has no text to embed, skipping");
            skipped += 1;
            continue;
        }
        pending.push((record, text));
    }

    let progress = if show_progress {
        let bar = ProgressBar::new(pending.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} embedded ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    let mut embedded = Vec::with_capacity(pending.len());
    let mut pending = pending.into_iter().peekable();
    while pending.peek().is_some() {
        let (chunk, texts): (Vec<CanonicalRecord>, Vec<String>) =
            pending.by_ref().take(batch_size.max(1)).unzip();

        let vectors = embedder
            .embed_batch(&texts)
            .with_context(|| format!("failed to embed batch starting at record {}", embedded.len()))?;

        for (record, vector) in chunk.into_iter().zip(vectors) {
            embedded.push(record.into_embedded(vector));
        }
        progress.inc(texts.len() as u64);
    }
    progress.finish_and_clear();

    if let Some(first) = embedded.first() {
        log::info!("Embedding dimensionality: {}", first.embedding.len());
    }
    log::info!("embedded {} records ({} skipped)", embedded.len(), skipped);

    Ok(EmbedSummary {
        records: embedded,
        skipped,
    })
}

/// Canonical CSV to embedding JSON.
pub fn embed(
    embedder: &dyn Embedder,
    cleaned_csv: &Path,
    embeddings_json: &Path,
    batch_size: usize,
    show_progress: bool,
) -> anyhow::Result<EmbedSummary> {
    let _span = tracing::info_span!("embed").entered();
    let canonical = artifacts::read_canonical_csv(cleaned_csv)
        .with_context(|| format!("failed to read canonical catalog {}", cleaned_csv.display()))?;
    if canonical.skipped > 0 {
        log::warn!("{} malformed canonical rows skipped", canonical.skipped);
    }

    let summary = embed_records(embedder, canonical.rows, batch_size, show_progress)?;
    artifacts::write_embeddings(embeddings_json, &summary.records)
        .context("failed to write embeddings")?;

    Ok(summary)
}

/// Records from an embeddings file, ids assigned by file position.
#[derive(Debug, Default)]
pub struct IndexableRecords {
    pub records: Vec<EmbeddedRecord>,
    /// File position of each entry in `records`
    pub positions: Vec<usize>,
    /// Elements that did not decode, as failed outcomes
    pub rejected: Vec<(usize, UpsertOutcome)>,
}

/// Load an embeddings file for indexing. A malformed element is rejected
/// on its own; the rest keep the ids their positions give them.
pub fn load_indexable(embeddings_json: &Path) -> anyhow::Result<IndexableRecords> {
    let mut entries = artifacts::read_embedding_entries(embeddings_json)
        .with_context(|| format!("failed to read embeddings {}", embeddings_json.display()))?;
    indexer::assign_ids(entries.records.iter_mut().map(|(idx, record)| (*idx, record)));

    let (positions, records) = entries.records.into_iter().unzip();
    let rejected = entries
        .rejected
        .into_iter()
        .map(|(idx, reason)| {
            let outcome = UpsertOutcome {
                id: format!("#{idx}"),
                error: Some(reason),
            };
            (idx, outcome)
        })
        .collect();

    Ok(IndexableRecords {
        records,
        positions,
        rejected,
    })
}

#[derive(Debug)]
pub struct ImportSummary {
    pub report: UpsertReport,
    pub document_count: u64,
}

/// Embedding JSON into the index: assign ids, persist them, upsert.
///
/// The report covers every element of the file in file order, including
/// the ones that failed to decode.
pub fn import(
    indexer: &Indexer,
    embeddings_json: &Path,
    embeddings_with_ids_json: &Path,
) -> anyhow::Result<ImportSummary> {
    let _span = tracing::info_span!("import").entered();
    let loaded = load_indexable(embeddings_json)?;

    artifacts::write_embeddings(embeddings_with_ids_json, &loaded.records)
        .context("failed to write embeddings with ids")?;

    indexer.ensure_schema().context("failed to create collection")?;
    let upserted = indexer.upsert(&loaded.records).context("bulk import failed")?;

    for (_, outcome) in &loaded.rejected {
        log::error!(
            "Failed to import document {}: {}",
            outcome.id,
            outcome.error.as_deref().unwrap_or_default()
        );
    }

    let mut outcomes: Vec<(usize, UpsertOutcome)> = loaded
        .positions
        .into_iter()
        .zip(upserted.outcomes)
        .chain(loaded.rejected)
        .collect();
    outcomes.sort_by_key(|(idx, _)| *idx);
    let report = UpsertReport {
        outcomes: outcomes.into_iter().map(|(_, outcome)| outcome).collect(),
    };

    let document_count = indexer.count().context("failed to read collection info")?;

    Ok(ImportSummary {
        report,
        document_count,
    })
}
