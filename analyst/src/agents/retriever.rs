// Retriever: nearest-neighbour search against the hosted Azure AI Search index

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{info, instrument};

use super::embedder::Embedder;
use crate::error::{StartupError, TurnError};
use crate::models::DocumentChunk;

const VECTOR_FIELD: &str = "content_vector";
const SELECT_FIELDS: &str = "content,metadata";

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Return chunks in the order the index ranked them.
    async fn retrieve(&self, query: &str) -> Result<Vec<DocumentChunk>, TurnError>;
}

pub struct AzureSearchRetriever {
    http: reqwest::Client,
    api_key: String,
    search_url: String,
    top_k: usize,
    embedder: Arc<dyn Embedder>,
}

impl AzureSearchRetriever {
    /// Bind to an existing index. The index must already exist; a missing
    /// index or bad key fails here rather than on the first question.
    pub async fn connect(
        http: reqwest::Client,
        endpoint: &str,
        api_key: String,
        index: &str,
        api_version: &str,
        top_k: usize,
        embedder: Arc<dyn Embedder>,
    ) -> Result<Self, StartupError> {
        let endpoint = endpoint.trim_end_matches('/');
        let index_url = format!("{}/indexes/{}?api-version={}", endpoint, index, api_version);

        let response = http
            .get(&index_url)
            .header("api-key", &api_key)
            .send()
            .await
            .map_err(|e| StartupError::ClientConstruction(format!("Search service unreachable: {}", e)))?;
        if !response.status().is_success() {
            return Err(StartupError::ClientConstruction(format!(
                "Search index '{}' unavailable ({})",
                index,
                response.status()
            )));
        }
        info!("Bound to search index '{}'", index);

        Ok(Self {
            http,
            api_key,
            search_url: search_url(endpoint, index, api_version),
            top_k,
            embedder,
        })
    }
}

pub(crate) fn search_url(endpoint: &str, index: &str, api_version: &str) -> String {
    format!(
        "{}/indexes/{}/docs/search?api-version={}",
        endpoint.trim_end_matches('/'),
        index,
        api_version
    )
}

#[derive(Serialize)]
pub(crate) struct SearchRequest<'a> {
    select: &'static str,
    top: usize,
    #[serde(rename = "vectorQueries")]
    vector_queries: Vec<VectorQuery<'a>>,
}

#[derive(Serialize)]
struct VectorQuery<'a> {
    kind: &'static str,
    vector: &'a [f32],
    fields: &'static str,
    k: usize,
}

impl<'a> SearchRequest<'a> {
    pub(crate) fn new(vector: &'a [f32], top_k: usize) -> Self {
        Self {
            select: SELECT_FIELDS,
            top: top_k,
            vector_queries: vec![VectorQuery {
                kind: "vector",
                vector,
                fields: VECTOR_FIELD,
                k: top_k,
            }],
        }
    }
}

#[derive(Deserialize)]
pub(crate) struct SearchResponse {
    value: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(default)]
    content: String,
    #[serde(default)]
    metadata: Value,
}

impl SearchResponse {
    pub(crate) fn into_chunks(self) -> Vec<DocumentChunk> {
        self.value
            .into_iter()
            .map(|hit| DocumentChunk::new(hit.content, metadata_map(hit.metadata)))
            .collect()
    }
}

/// The index stores metadata as a JSON-encoded string; tolerate an
/// inline object too. Anything else yields empty metadata.
fn metadata_map(raw: Value) -> Map<String, Value> {
    match raw {
        Value::Object(map) => map,
        Value::String(encoded) => match serde_json::from_str(&encoded) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        },
        _ => Map::new(),
    }
}

#[async_trait]
impl Retriever for AzureSearchRetriever {
    #[instrument(skip(self))]
    async fn retrieve(&self, query: &str) -> Result<Vec<DocumentChunk>, TurnError> {
        let vector = self.embedder.embed(query).await.map_err(TurnError::Retrieval)?;

        let response = self
            .http
            .post(&self.search_url)
            .header("api-key", &self.api_key)
            .json(&SearchRequest::new(&vector, self.top_k))
            .send()
            .await
            .map_err(|e| TurnError::Retrieval(format!("Search request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(TurnError::Retrieval(format!(
                "Search failed ({}): {}",
                status, body
            )));
        }

        let parsed: SearchResponse = response
            .json()
            .await
            .map_err(|e| TurnError::Retrieval(format!("Failed to parse search response: {}", e)))?;
        let chunks = parsed.into_chunks();
        info!("Retriever: {} chunks", chunks.len());
        Ok(chunks)
    }
}
