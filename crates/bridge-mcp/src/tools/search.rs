//! Documentation search over the offline embedding index.
//!
//! Read-only and host-free, so it runs on the I/O context instead of
//! the executor queue, but it is still dispatched like any other tool.

use std::sync::Arc;

use async_trait::async_trait;
use bridge_core::BridgeError;
use bridge_retrieval::DocumentIndex;
use serde_json::{json, Value};
use tracing::debug;

use crate::registry::ImmediateTool;

const DEFAULT_K: usize = 5;
const MAX_K: usize = 50;

pub struct SearchDocumentsTool {
    index: Arc<DocumentIndex>,
}

impl SearchDocumentsTool {
    pub fn new(index: Arc<DocumentIndex>) -> Self {
        Self { index }
    }
}

#[async_trait]
impl ImmediateTool for SearchDocumentsTool {
    fn name(&self) -> &str {
        "search_documents"
    }

    fn description(&self) -> &str {
        "Search the host documentation index and return the closest chunks."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Free-text query"
                },
                "k": {
                    "type": "integer",
                    "description": "Number of results (default 5, max 50)"
                }
            },
            "required": ["query"]
        })
    }

    async fn call(&self, params: Value) -> Result<Value, BridgeError> {
        let query = params
            .get("query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| BridgeError::Schema("missing query".into()))?;
        let k = params
            .get("k")
            .and_then(|v| v.as_u64())
            .map(|k| (k as usize).clamp(1, MAX_K))
            .unwrap_or(DEFAULT_K);

        let hits = self.index.search(query, k);
        debug!(query, k, hits = hits.len(), "search_documents");
        Ok(json!({ "results": hits }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_retrieval::HashingEmbedder;

    fn tool() -> SearchDocumentsTool {
        let embedder = Arc::new(HashingEmbedder::new(64));
        let index = DocumentIndex::build(
            vec![
                ("a", "extrude the selected mesh faces", "modeling.rst"),
                ("b", "render the scene with cycles", "render.rst"),
            ],
            embedder,
        );
        SearchDocumentsTool::new(Arc::new(index))
    }

    #[tokio::test]
    async fn search_returns_ranked_results() {
        let result = tool()
            .call(json!({ "query": "extrude mesh faces", "k": 2 }))
            .await
            .unwrap();
        let results = result["results"].as_array().unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0]["doc_id"], "a");
    }

    #[tokio::test]
    async fn k_defaults_when_omitted() {
        let result = tool().call(json!({ "query": "mesh" })).await.unwrap();
        // Smaller index than the default k: everything comes back.
        assert_eq!(result["results"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn missing_query_is_a_schema_error() {
        let err = tool().call(json!({})).await.unwrap_err();
        assert!(matches!(err, BridgeError::Schema(_)));
    }
}
