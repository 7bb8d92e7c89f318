//! Query and document embedding.
//!
//! Index build and query must agree on the embedder, so the trait is
//! the contract and the feature-hashing implementation is the default
//! for both sides. It needs no model runtime and is fully
//! deterministic: identical text always produces an identical vector.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Maps text into a fixed-dimension vector.
pub trait Embedder: Send + Sync {
    fn dimension(&self) -> usize;

    /// L2-normalised embedding of `text`. All-zero only for text with
    /// no tokens.
    fn embed(&self, text: &str) -> Vec<f32>;
}

/// Bag-of-tokens feature hashing into a fixed dimension.
///
/// Tokens are lowercased alphanumeric runs; each token hashes to one
/// bucket with a hash-derived sign, and the count vector is
/// L2-normalised. Not a semantic model, but it preserves the retrieval
/// contract exactly: the distance of a chunk to its own text is zero.
#[derive(Debug, Clone)]
pub struct HashingEmbedder {
    dimension: usize,
}

impl HashingEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension: dimension.max(1),
        }
    }
}

impl Default for HashingEmbedder {
    fn default() -> Self {
        Self::new(crate::DEFAULT_DIMENSION)
    }
}

impl Embedder for HashingEmbedder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimension];

        for token in tokens(text) {
            // DefaultHasher with default keys is stable for a given
            // input, which is all determinism requires here.
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let hash = hasher.finish();

            let bucket = (hash % self.dimension as u64) as usize;
            let sign = if hash & (1 << 63) == 0 { 1.0 } else { -1.0 };
            vector[bucket] += sign;
        }

        let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}

fn tokens(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embedding_is_deterministic() {
        let embedder = HashingEmbedder::new(64);
        let a = embedder.embed("Add a cube to the scene");
        let b = embedder.embed("Add a cube to the scene");
        assert_eq!(a, b);
    }

    #[test]
    fn embedding_is_normalised() {
        let embedder = HashingEmbedder::new(64);
        let v = embedder.embed("mesh modifiers and shading");
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_text_embeds_to_zero() {
        let embedder = HashingEmbedder::new(16);
        assert!(embedder.embed("  \t ").iter().all(|v| *v == 0.0));
    }

    #[test]
    fn tokenisation_ignores_case_and_punctuation() {
        let embedder = HashingEmbedder::new(64);
        assert_eq!(embedder.embed("Cube, Mesh!"), embedder.embed("cube mesh"));
    }
}
