use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

pub const UNKNOWN_SOURCE: &str = "Unknown Doc";
pub const UNKNOWN_PAGE: &str = "N/A";

/// A retrieved unit of document text plus its provenance metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl DocumentChunk {
    pub fn new(text: impl Into<String>, metadata: Map<String, Value>) -> Self {
        Self {
            text: text.into(),
            metadata,
        }
    }

    pub fn source(&self) -> String {
        self.metadata_str("source")
            .unwrap_or_else(|| UNKNOWN_SOURCE.to_string())
    }

    pub fn page(&self) -> String {
        self.metadata_str("page")
            .unwrap_or_else(|| UNKNOWN_PAGE.to_string())
    }

    fn metadata_str(&self, key: &str) -> Option<String> {
        match self.metadata.get(key)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineResult {
    pub answer: String,
    pub cited_chunks: Vec<DocumentChunk>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Citation {
    pub source: String,
    pub page: String,
    pub line: String,
}

impl From<&DocumentChunk> for Citation {
    fn from(chunk: &DocumentChunk) -> Self {
        let source = chunk.source();
        let page = chunk.page();
        let line = format!("Source: {} | Page: {}", source, page);
        Self { source, page, line }
    }
}

// API Request/Response models
#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub session_id: Uuid,
    pub answer: String,
    pub citations: Vec<Citation>,
}

#[derive(Debug, Serialize)]
pub struct SessionView {
    pub session_id: Uuid,
    pub state: crate::shell::ShellState,
    pub turns: Vec<ChatTurn>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub connected: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}
