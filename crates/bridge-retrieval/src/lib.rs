//! bridge-retrieval: embedding-based search over documentation chunks.
//!
//! The index is built wholesale by an offline job and consumed
//! read-only here. Queries are embedded with the same embedder the
//! index was built with, scored by cosine distance against the stored
//! vectors, and returned ascending by distance with ties broken by
//! document id for determinism.

mod embedder;
mod index;

pub use embedder::{Embedder, HashingEmbedder};
pub use index::{DocumentIndex, EmbeddingRecord, SearchHit};

use thiserror::Error;

/// Default vector dimension, matching the offline build.
pub const DEFAULT_DIMENSION: usize = 384;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("failed to read index: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse index: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("record '{doc_id}' has dimension {actual}, index expects {expected}")]
    DimensionMismatch {
        doc_id: String,
        expected: usize,
        actual: usize,
    },
}
