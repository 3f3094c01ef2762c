// Embedder: turns query text into a vector via Azure OpenAI embeddings

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single query string. Errors are returned as display text;
    /// the retriever decides how to classify them.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, String>;
}

pub struct AzureOpenAiEmbedder {
    http: reqwest::Client,
    api_key: String,
    url: String,
}

impl AzureOpenAiEmbedder {
    pub fn new(
        http: reqwest::Client,
        endpoint: &str,
        api_key: String,
        deployment: &str,
        api_version: &str,
    ) -> Self {
        Self {
            http,
            api_key,
            url: embeddings_url(endpoint, deployment, api_version),
        }
    }
}

pub(crate) fn embeddings_url(endpoint: &str, deployment: &str, api_version: &str) -> String {
    format!(
        "{}/openai/deployments/{}/embeddings?api-version={}",
        endpoint.trim_end_matches('/'),
        deployment,
        api_version
    )
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    input: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

impl EmbedResponse {
    pub(crate) fn into_vector(self) -> Result<Vec<f32>, String> {
        self.data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| "No embedding in response".to_string())
    }
}

#[async_trait]
impl Embedder for AzureOpenAiEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, String> {
        let response = self
            .http
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&EmbedRequest { input: text })
            .send()
            .await
            .map_err(|e| format!("Embedding request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Embedding failed ({}): {}", status, body));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse embedding response: {}", e))?;
        let vector = parsed.into_vector()?;
        debug!(dimensions = vector.len(), "Embedded query");
        Ok(vector)
    }
}
