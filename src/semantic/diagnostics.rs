//! Offline checks of embedding quality.
//!
//! Run against the embedding artifact before importing it, to confirm that
//! related products land close together. Nothing here is used when serving
//! queries.

use rayon::prelude::*;

use crate::record::EmbeddedRecord;
use crate::store::memory::l2_norm;

#[derive(Debug, thiserror::Error)]
pub enum DiagnosticsError {
    #[error("Dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    #[error("Record index {index} out of range ({len} records)")]
    IndexOutOfRange { index: usize, len: usize },
}

/// A vector's position in a list and its similarity to a reference vector.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub index: usize,
    pub similarity: f32,
}

/// The two records matched by title substrings, and their similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct TitlePairSimilarity {
    pub first_index: usize,
    pub first_title: String,
    pub second_index: usize,
    pub second_title: String,
    pub similarity: f32,
}

/// Cosine similarity in [-1, 1]. A zero vector is similar to nothing (0).
pub fn similarity(a: &[f32], b: &[f32]) -> Result<f32, DiagnosticsError> {
    if a.len() != b.len() {
        return Err(DiagnosticsError::DimensionMismatch {
            left: a.len(),
            right: b.len(),
        });
    }

    let norms = l2_norm(a) * l2_norm(b);
    if norms < f32::EPSILON {
        return Ok(0.0);
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    Ok((dot / norms).clamp(-1.0, 1.0))
}

/// The `n` vectors most similar to `vector`, best first.
///
/// Vectors of the wrong length are skipped. Ties keep index order.
pub fn top_neighbors(vector: &[f32], all: &[Vec<f32>], n: usize) -> Vec<Neighbor> {
    let mut neighbors: Vec<Neighbor> = all
        .iter()
        .enumerate()
        .filter_map(|(index, other)| {
            similarity(vector, other)
                .ok()
                .map(|similarity| Neighbor { index, similarity })
        })
        .collect();

    neighbors.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
    neighbors.truncate(n);
    neighbors
}

/// Neighbors of the record at `index`, leaving the record itself out.
pub fn similar_records(
    records: &[EmbeddedRecord],
    index: usize,
    n: usize,
) -> Result<Vec<Neighbor>, DiagnosticsError> {
    let target = records
        .get(index)
        .ok_or(DiagnosticsError::IndexOutOfRange {
            index,
            len: records.len(),
        })?;

    let vectors: Vec<Vec<f32>> = records.iter().map(|r| r.embedding.clone()).collect();
    let mut neighbors = top_neighbors(&target.embedding, &vectors, n.saturating_add(1));
    neighbors.retain(|neighbor| neighbor.index != index);
    neighbors.truncate(n);
    Ok(neighbors)
}

/// Compare the first record whose title contains `needle_a` with the first
/// whose title contains `needle_b`. `None` when either is not found.
pub fn compare_titles(
    records: &[EmbeddedRecord],
    needle_a: &str,
    needle_b: &str,
) -> Option<TitlePairSimilarity> {
    let find = |needle: &str| records.iter().position(|r| r.title.contains(needle));

    let (Some(first), Some(second)) = (find(needle_a), find(needle_b)) else {
        log::error!("One or both products not found in the dataset");
        return None;
    };

    let similarity = similarity(&records[first].embedding, &records[second].embedding).ok()?;
    Some(TitlePairSimilarity {
        first_index: first,
        first_title: records[first].title.clone(),
        second_index: second,
        second_title: records[second].title.clone(),
        similarity,
    })
}

/// Full pairwise similarity matrix. Rows are computed in parallel.
pub fn similarity_matrix(vectors: &[Vec<f32>]) -> Vec<Vec<f32>> {
    vectors
        .par_iter()
        .map(|row| {
            vectors
                .iter()
                .map(|col| similarity(row, col).unwrap_or(0.0))
                .collect()
        })
        .collect()
}

/// Pairwise similarities of the first `limit` records as a text table,
/// one row per record labelled with its position and title.
pub fn format_matrix(records: &[EmbeddedRecord], limit: usize) -> String {
    let shown = &records[..limit.min(records.len())];
    let vectors: Vec<Vec<f32>> = shown.iter().map(|r| r.embedding.clone()).collect();
    let matrix = similarity_matrix(&vectors);

    let mut out = String::new();
    for (idx, (record, row)) in shown.iter().zip(&matrix).enumerate() {
        let cells: Vec<String> = row.iter().map(|value| format!("{value:>7.4}")).collect();
        out.push_str(&format!("{idx:>4} {} | {}\n", cells.join(" "), record.title));
    }
    out
}
