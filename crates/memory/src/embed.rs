//! Feature-hashing embedder — the default, dependency-free embedding.
//!
//! Hashes lowercase word unigrams and bigrams into a fixed number of
//! buckets (FNV-1a) and L2-normalises the result. Deterministic, loads in
//! zero time, and needs no model weights, which keeps the embedding
//! interface honest: swapping in a real sentence-embedding backend is a
//! matter of implementing [`Embedder`] with the same fixed dimension
//! discipline.

use hearth_core::error::MemoryError;
use hearth_core::model::Embedder;

/// Default embedding dimension.
pub const DEFAULT_DIMENSION: usize = 256;

/// A deterministic bag-of-words embedder using the hashing trick.
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSION)
    }
}

impl Embedder for HashingEmbedder {
    fn name(&self) -> &str {
        "feature-hashing"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError> {
        let mut vector = vec![0.0f32; self.dimension];

        let words: Vec<String> = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .map(|w| w.to_lowercase())
            .collect();

        for word in &words {
            let bucket = (fnv1a(word.as_bytes()) as usize) % self.dimension;
            vector[bucket] += 1.0;
        }
        for pair in words.windows(2) {
            let bigram = format!("{} {}", pair[0], pair[1]);
            let bucket = (fnv1a(bigram.as_bytes()) as usize) % self.dimension;
            vector[bucket] += 0.5;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in &mut vector {
                *x /= norm;
            }
        }

        Ok(vector)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}
