// Chat model: single-shot chat completion against an Azure OpenAI deployment

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, messages: &[PromptMessage], temperature: f32) -> Result<String, String>;
}

pub struct AzureChatModel {
    http: reqwest::Client,
    api_key: String,
    url: String,
}

impl AzureChatModel {
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
            url: completions_url(endpoint, deployment, api_version),
        }
    }
}

pub(crate) fn completions_url(endpoint: &str, deployment: &str, api_version: &str) -> String {
    format!(
        "{}/openai/deployments/{}/chat/completions?api-version={}",
        endpoint.trim_end_matches('/'),
        deployment,
        api_version
    )
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    messages: &'a [PromptMessage],
    temperature: f32,
}

#[derive(Deserialize)]
pub(crate) struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl CompletionResponse {
    pub(crate) fn into_text(self) -> Result<String, String> {
        self.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| "No text in chat completion response".to_string())
    }
}

#[async_trait]
impl ChatModel for AzureChatModel {
    async fn complete(&self, messages: &[PromptMessage], temperature: f32) -> Result<String, String> {
        let response = self
            .http
            .post(&self.url)
            .header("api-key", &self.api_key)
            .json(&CompletionRequest {
                messages,
                temperature,
            })
            .send()
            .await
            .map_err(|e| format!("Chat request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("Chat completion failed ({}): {}", status, body));
        }

        let parsed: CompletionResponse = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse chat response: {}", e))?;
        parsed.into_text()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::fake_azure;
    use serde_json::json;
    use warp::Filter;

    fn model(endpoint: &str) -> AzureChatModel {
        AzureChatModel::new(
            reqwest::Client::new(),
            endpoint,
            "oai-key".to_string(),
            "gpt-4o-mini",
            "2024-06-01",
        )
    }

    fn question() -> Vec<PromptMessage> {
        vec![PromptMessage {
            role: PromptRole::User,
            content: "How did revenue change?".into(),
        }]
    }

    #[tokio::test]
    async fn completes_against_deployment() {
        let route = warp::post()
            .and(warp::path!("openai" / "deployments" / "gpt-4o-mini" / "chat" / "completions"))
            .and(warp::header::exact("api-key", "oai-key"))
            .and(warp::body::json())
            .map(|body: serde_json::Value| {
                assert_eq!(body["temperature"], 0.0);
                assert_eq!(body["messages"][0]["content"], "How did revenue change?");
                warp::reply::json(&json!({
                    "choices": [{"message": {"role": "assistant", "content": "Revenue grew 10%."}}]
                }))
            });
        let endpoint = fake_azure::serve(route);

        let answer = model(&endpoint).complete(&question(), 0.0).await.unwrap();
        assert_eq!(answer, "Revenue grew 10%.");
    }

    #[tokio::test]
    async fn throttling_and_transport_failures_are_errors() {
        let endpoint = fake_azure::serve(fake_azure::failing(429, "rate limited"));
        let err = model(&endpoint).complete(&question(), 0.0).await.unwrap_err();
        assert!(err.contains("429"), "{err}");

        let err = model(fake_azure::UNREACHABLE)
            .complete(&question(), 0.0)
            .await
            .unwrap_err();
        assert!(err.starts_with("Chat request failed"), "{err}");
    }

    #[test]
    fn request_body_carries_roles_and_temperature() {
        let messages = vec![
            PromptMessage {
                role: PromptRole::System,
                content: "sys".into(),
            },
            PromptMessage {
                role: PromptRole::User,
                content: "q".into(),
            },
        ];
        let body = serde_json::to_value(CompletionRequest {
            messages: &messages,
            temperature: 0.0,
        })
        .unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["temperature"], 0.0);
    }

    #[test]
    fn extracts_first_choice() {
        let parsed: CompletionResponse = serde_json::from_str(
            r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"Revenue grew."},"finish_reason":"stop"}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.into_text().unwrap(), "Revenue grew.");

        let filtered: CompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#).unwrap();
        assert!(filtered.into_text().is_err());
    }

    #[test]
    fn completions_url_targets_deployment() {
        assert_eq!(
            completions_url("https://oai.example.com", "gpt-4o-mini", "2024-06-01"),
            "https://oai.example.com/openai/deployments/gpt-4o-mini/chat/completions?api-version=2024-06-01"
        );
    }
}
