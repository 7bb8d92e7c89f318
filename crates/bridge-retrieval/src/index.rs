//! Read-only document index and top-k cosine search.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{Embedder, RetrievalError};

/// One documentation chunk with its precomputed vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub doc_id: String,
    pub text: String,
    pub vector: Vec<f32>,
    pub source_path: String,
    #[serde(default)]
    pub offset: usize,
}

/// On-disk shape produced by the offline indexing job.
#[derive(Debug, Serialize, Deserialize)]
struct IndexFile {
    dimension: usize,
    records: Vec<EmbeddingRecord>,
}

/// A search result: the matched record and its cosine distance.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub doc_id: String,
    pub text: String,
    pub source_path: String,
    pub offset: usize,
    pub distance: f32,
}

/// Immutable embedding index. Rebuilt wholesale offline; the bridge
/// only ever reads it.
pub struct DocumentIndex {
    records: Vec<EmbeddingRecord>,
    embedder: Arc<dyn Embedder>,
}

impl DocumentIndex {
    /// Load an index file, checking every vector against the declared
    /// dimension and the embedder's.
    pub fn load(path: &Path, embedder: Arc<dyn Embedder>) -> Result<Self, RetrievalError> {
        let raw = fs::read_to_string(path)?;
        let file: IndexFile = serde_json::from_str(&raw)?;

        for record in &file.records {
            if record.vector.len() != file.dimension {
                return Err(RetrievalError::DimensionMismatch {
                    doc_id: record.doc_id.clone(),
                    expected: file.dimension,
                    actual: record.vector.len(),
                });
            }
        }
        if file.dimension != embedder.dimension() {
            return Err(RetrievalError::DimensionMismatch {
                doc_id: "<index>".into(),
                expected: embedder.dimension(),
                actual: file.dimension,
            });
        }

        info!(
            records = file.records.len(),
            dimension = file.dimension,
            path = %path.display(),
            "loaded document index"
        );
        Ok(Self {
            records: file.records,
            embedder,
        })
    }

    /// Build an index in memory by embedding chunks directly. Used by
    /// tests and small deployments without a prebuilt file.
    pub fn build<I, S>(chunks: I, embedder: Arc<dyn Embedder>) -> Self
    where
        I: IntoIterator<Item = (S, S, S)>,
        S: Into<String>,
    {
        let records = chunks
            .into_iter()
            .map(|(doc_id, text, source_path)| {
                let text = text.into();
                let vector = embedder.embed(&text);
                EmbeddingRecord {
                    doc_id: doc_id.into(),
                    text,
                    vector,
                    source_path: source_path.into(),
                    offset: 0,
                }
            })
            .collect();
        Self { records, embedder }
    }

    /// An index with no records; every search returns nothing.
    pub fn empty(embedder: Arc<dyn Embedder>) -> Self {
        Self {
            records: Vec::new(),
            embedder,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Top-k records by ascending cosine distance to the query. Ties
    /// break on document id so results are deterministic.
    pub fn search(&self, query: &str, k: usize) -> Vec<SearchHit> {
        let query_vector = self.embedder.embed(query);

        let mut hits: Vec<SearchHit> = self
            .records
            .iter()
            .map(|record| SearchHit {
                doc_id: record.doc_id.clone(),
                text: record.text.clone(),
                source_path: record.source_path.clone(),
                offset: record.offset,
                distance: cosine_distance(&query_vector, &record.vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            a.distance
                .partial_cmp(&b.distance)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.doc_id.cmp(&b.doc_id))
        });
        hits.truncate(k);
        hits
    }
}

/// Cosine distance in [0, 2]; orthogonal (or degenerate) vectors score 1.
fn cosine_distance(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 1.0;
    }
    1.0 - dot / (norm_a.sqrt() * norm_b.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::HashingEmbedder;
    use std::io::Write;

    fn sample_index() -> DocumentIndex {
        let embedder = Arc::new(HashingEmbedder::new(64));
        DocumentIndex::build(
            vec![
                ("modeling/cube", "Add a cube mesh to the scene", "modeling.rst"),
                ("modeling/cylinder", "Add a cylinder mesh primitive", "modeling.rst"),
                ("render/eevee", "Configure the realtime render engine", "render.rst"),
                ("anim/keyframes", "Insert keyframes on object location", "animation.rst"),
            ],
            embedder,
        )
    }

    #[test]
    fn exact_text_query_returns_itself_at_distance_zero() {
        let index = sample_index();
        let hits = index.search("Add a cube mesh to the scene", 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].doc_id, "modeling/cube");
        assert!(hits[0].distance.abs() < 1e-5);
    }

    #[test]
    fn distances_are_non_decreasing() {
        let index = sample_index();
        let hits = index.search("cube mesh", 4);
        assert_eq!(hits.len(), 4);
        for window in hits.windows(2) {
            assert!(window[0].distance <= window[1].distance);
        }
    }

    #[test]
    fn k_larger_than_index_returns_everything() {
        let index = sample_index();
        assert_eq!(index.search("mesh", 100).len(), 4);
    }

    #[test]
    fn ties_break_by_doc_id() {
        let embedder = Arc::new(HashingEmbedder::new(64));
        // Identical text means identical distance for both records.
        let index = DocumentIndex::build(
            vec![
                ("b/doc", "duplicate chunk", "b.rst"),
                ("a/doc", "duplicate chunk", "a.rst"),
            ],
            embedder,
        );
        let hits = index.search("duplicate chunk", 2);
        assert_eq!(hits[0].doc_id, "a/doc");
        assert_eq!(hits[1].doc_id, "b/doc");
    }

    #[test]
    fn empty_index_returns_no_hits() {
        let index = DocumentIndex::empty(Arc::new(HashingEmbedder::new(16)));
        assert!(index.search("anything", 3).is_empty());
    }

    #[test]
    fn load_round_trips_the_offline_format() {
        let embedder = Arc::new(HashingEmbedder::new(8));
        let record = EmbeddingRecord {
            doc_id: "doc/1".into(),
            text: "hello index".into(),
            vector: embedder.embed("hello index"),
            source_path: "doc.rst".into(),
            offset: 42,
        };
        let file = IndexFile {
            dimension: 8,
            records: vec![record],
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.json");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(serde_json::to_string(&file).unwrap().as_bytes())
            .unwrap();

        let index = DocumentIndex::load(&path, embedder).unwrap();
        assert_eq!(index.len(), 1);
        let hits = index.search("hello index", 1);
        assert_eq!(hits[0].offset, 42);
        assert!(hits[0].distance.abs() < 1e-5);
    }

    #[test]
    fn load_rejects_dimension_mismatch() {
        let file = IndexFile {
            dimension: 8,
            records: vec![EmbeddingRecord {
                doc_id: "bad".into(),
                text: "short vector".into(),
                vector: vec![0.1; 4],
                source_path: "x.rst".into(),
                offset: 0,
            }],
        };

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docs.json");
        std::fs::write(&path, serde_json::to_string(&file).unwrap()).unwrap();

        let err = DocumentIndex::load(&path, Arc::new(HashingEmbedder::new(8)))
            .err()
            .unwrap();
        assert!(matches!(err, RetrievalError::DimensionMismatch { .. }));
    }
}
