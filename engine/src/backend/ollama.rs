//! Ollama Backend Client
//!
//! Implements the `InferenceBackend` trait against an Ollama-compatible
//! serving endpoint. All catalog entries share one endpoint; each client
//! carries its own model name and sampling temperature.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{BackendError, Completion, InferenceBackend, Message, MessageRole, Result};

/// Client for one catalog entry served by Ollama
#[derive(Debug, Clone)]
pub struct OllamaClient {
    /// Catalog name of this backend (e.g. "phi3")
    name: String,

    /// Base URL of the serving endpoint (typically http://localhost:11434)
    base_url: String,

    /// Model identifier (e.g. "phi3:mini")
    model: String,

    /// Sampling temperature
    temperature: f32,

    /// HTTP client for API requests
    client: Client,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into(),
            model: model.into(),
            temperature,
            client: Client::builder()
                .timeout(Duration::from_secs(300))
                .build()
                .unwrap_or_default(),
        }
    }

    /// Convert our Message format to Ollama's format
    fn convert_messages(&self, messages: &[Message]) -> Vec<OllamaMessage> {
        messages
            .iter()
            .map(|msg| OllamaMessage {
                role: match msg.role {
                    MessageRole::User => "user".to_string(),
                    MessageRole::Assistant => "assistant".to_string(),
                    MessageRole::System => "system".to_string(),
                },
                content: msg.content.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl InferenceBackend for OllamaClient {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, messages: &[Message]) -> Result<Completion> {
        let ollama_messages = self.convert_messages(messages);

        tracing::debug!(
            "Ollama request: backend={}, model={}, messages={}, total_chars={}",
            self.name,
            self.model,
            ollama_messages.len(),
            ollama_messages
                .iter()
                .map(|m| m.content.len())
                .sum::<usize>()
        );

        let request = OllamaRequest {
            model: self.model.clone(),
            messages: ollama_messages,
            stream: false,
            options: OllamaOptions {
                temperature: self.temperature,
            },
        };

        let url = format!("{}/api/chat", self.base_url);
        let start = std::time::Instant::now();
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout
                } else if e.is_connect() {
                    BackendError::Unavailable(format!(
                        "cannot connect to serving endpoint at {}",
                        self.base_url
                    ))
                } else {
                    BackendError::Network(e.to_string())
                }
            })?;

        tracing::debug!(
            "Ollama response for {} received in {:.1}s",
            self.name,
            start.elapsed().as_secs_f64()
        );

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(BackendError::Unavailable(format!(
                "serving endpoint error ({}): {}",
                status, error_text
            )));
        }

        let ollama_response: OllamaResponse = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(format!("failed to parse response: {}", e)))?;

        Ok(Completion::new(ollama_response.message.content))
    }

    async fn check_health(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }
}

/// Ollama API request format
#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    options: OllamaOptions,
}

/// Generation options passed through to the endpoint
#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
}

/// Ollama message format
#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    content: String,
}

/// Ollama API response format
#[derive(Debug, Deserialize)]
struct OllamaResponse {
    message: OllamaMessage,
    #[allow(dead_code)]
    #[serde(default)]
    done: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_properties() {
        let client = OllamaClient::new("phi3", "http://localhost:11434", "phi3:mini", 0.7);
        assert_eq!(client.name(), "phi3");
    }

    #[test]
    fn test_message_conversion() {
        let client = OllamaClient::new("phi3", "http://localhost:11434", "phi3:mini", 0.7);

        let messages = vec![
            Message::system("You are a planning specialist"),
            Message::user("Hello"),
            Message::assistant("Hi there"),
        ];

        let ollama_messages = client.convert_messages(&messages);

        assert_eq!(ollama_messages.len(), 3);
        assert_eq!(ollama_messages[0].role, "system");
        assert_eq!(ollama_messages[1].role, "user");
        assert_eq!(ollama_messages[2].role, "assistant");
    }

    #[tokio::test]
    async fn test_connection_error() {
        // Unroutable port, connection must fail
        let client = OllamaClient::new("phi3", "http://127.0.0.1:1", "phi3:mini", 0.7);
        let messages = vec![Message::user("Hello")];

        let result = client.generate(&messages).await;

        assert!(result.is_err());
        match result.unwrap_err() {
            BackendError::Unavailable(msg) => {
                assert!(msg.contains("cannot connect"));
            }
            BackendError::Network(_) => {
                // Also acceptable, connection errors can manifest differently
            }
            other => panic!("expected Unavailable or Network, got: {:?}", other),
        }
    }
}
