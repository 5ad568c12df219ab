//! Ollama HTTP Client
//!
//! Direct HTTP client for the local Ollama server's REST API. Uses reqwest
//! instead of third-party wrapper crates for stability and full API control.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

/// Default Ollama server address
pub const DEFAULT_OLLAMA_URL: &str = "http://127.0.0.1:11434";

#[derive(Error, Debug)]
pub enum OllamaError {
    #[error("Ollama HTTP error: {0}")]
    Http(String),
    #[error("Ollama server not available")]
    ServerUnavailable,
    #[error("Ollama request failed ({status}): {body}")]
    Status { status: u16, body: String },
    #[error("Deserialization error: {0}")]
    Deserialize(String),
    #[error("Empty response from model {0}")]
    EmptyResponse(String),
}

impl From<reqwest::Error> for OllamaError {
    fn from(e: reqwest::Error) -> Self {
        OllamaError::Http(e.to_string())
    }
}

/// One chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: Option<ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// Ollama HTTP client
#[derive(Clone)]
pub struct OllamaClient {
    http: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let http = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Health check: returns the names of locally available models
    pub async fn heartbeat(&self) -> Result<Vec<String>, OllamaError> {
        debug!(url = %self.base_url, "Ollama heartbeat check");
        let resp = self.http.get(format!("{}/api/tags", self.base_url))
            .send().await?;

        if !resp.status().is_success() {
            return Err(OllamaError::ServerUnavailable);
        }

        let tags: TagsResponse = resp.json().await
            .map_err(|e| OllamaError::Deserialize(e.to_string()))?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    /// Non-streaming chat completion; returns the assistant message content
    pub async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String, OllamaError> {
        let body = json!({
            "model": model,
            "messages": messages,
            "stream": false,
        });

        debug!(model = %model, messages = messages.len(), "Sending chat request");
        let resp = self.http.post(format!("{}/api/chat", self.base_url))
            .json(&body)
            .send().await?;

        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            error!(model = %model, status = %status, body = %text, "Ollama chat failed");
            return Err(OllamaError::Status { status: status.as_u16(), body: text });
        }

        let parsed: ChatResponse = serde_json::from_str(&text)
            .map_err(|e| OllamaError::Deserialize(format!("{}: {}", e, text)))?;
        let content = parsed.message
            .map(|m| m.content)
            .ok_or_else(|| OllamaError::EmptyResponse(model.to_string()))?;

        info!(model = %model, chars = content.len(), "Chat completed");
        Ok(content)
    }

    /// Embed a single prompt
    pub async fn embed(&self, model: &str, prompt: &str) -> Result<Vec<f32>, OllamaError> {
        let body = json!({
            "model": model,
            "prompt": prompt,
        });

        let resp = self.http.post(format!("{}/api/embeddings", self.base_url))
            .json(&body)
            .send().await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            error!(model = %model, status = %status, body = %text, "Ollama embedding failed");
            return Err(OllamaError::Status { status: status.as_u16(), body: text });
        }

        let parsed: EmbeddingResponse = resp.json().await
            .map_err(|e| OllamaError::Deserialize(e.to_string()))?;
        if parsed.embedding.is_empty() {
            return Err(OllamaError::EmptyResponse(model.to_string()));
        }
        Ok(parsed.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::test_support::serve_once;

    fn client(url: &str) -> OllamaClient {
        OllamaClient::new(url, Duration::from_secs(5))
    }

    #[test]
    fn test_base_url_trimmed() {
        assert_eq!(client("http://localhost:11434/").base_url(), "http://localhost:11434");
    }

    #[tokio::test]
    async fn test_heartbeat_lists_models() {
        let url = serve_once(200, r#"{"models":[{"name":"mistral:latest"},{"name":"all-minilm:latest"}]}"#).await;
        let models = client(&url).heartbeat().await.unwrap();
        assert_eq!(models, vec!["mistral:latest", "all-minilm:latest"]);
    }

    #[tokio::test]
    async fn test_chat_returns_content() {
        let url = serve_once(
            200,
            r#"{"model":"mistral","message":{"role":"assistant","content":" Leave is 25 days. "},"done":true}"#,
        ).await;
        let answer = client(&url)
            .chat("mistral", &[ChatMessage::user("How much leave?")])
            .await
            .unwrap();
        assert_eq!(answer, " Leave is 25 days. ");
    }

    #[tokio::test]
    async fn test_chat_error_status() {
        let url = serve_once(404, r#"{"error":"model 'nope' not found"}"#).await;
        let err = client(&url).chat("nope", &[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, OllamaError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn test_chat_missing_message() {
        let url = serve_once(200, r#"{"done":true}"#).await;
        let err = client(&url).chat("mistral", &[ChatMessage::user("hi")]).await.unwrap_err();
        assert!(matches!(err, OllamaError::EmptyResponse(_)));
    }

    #[tokio::test]
    async fn test_embed() {
        let url = serve_once(200, r#"{"embedding":[0.5,-0.25,1.0]}"#).await;
        let v = client(&url).embed("all-minilm", "fire exits").await.unwrap();
        assert_eq!(v, vec![0.5, -0.25, 1.0]);
    }
}
