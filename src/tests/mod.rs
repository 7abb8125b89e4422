use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::semantic::embeddings::{check_inputs, Embedder, EmbeddingError};


/// Deterministic stand-in for a real model: hashes lowercase word tokens
/// into a fixed number of buckets and L2-normalizes the result.
pub struct HashEmbedder {
    dimensions: usize,
    batches: AtomicUsize,
}

impl HashEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions,
            batches: AtomicUsize::new(0),
        }
    }

    /// Number of `embed_batch` calls so far
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];

        let lower = text.to_lowercase();
        let mut tokens: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .collect();
        if tokens.is_empty() {
            tokens.push(lower.trim());
        }

        for token in tokens {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let bucket = (hasher.finish() % self.dimensions as u64) as usize;
            vector[bucket] += 1.0;
        }

        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Embedder for HashEmbedder {
    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        check_inputs(texts)?;
        Ok(texts.iter().map(|t| self.vectorize(t)).collect())
    }
}

#[test]
fn test_hash_embedder_is_deterministic() {
    let embedder = HashEmbedder::new(32);
    let a = embedder.embed("Resin 3D printer").unwrap();
    let b = embedder.embed("Resin 3D printer").unwrap();
    assert_eq!(a, b);

    let norm = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() < 1e-5);
}
