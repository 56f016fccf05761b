//! Inference Backend Abstraction Layer
//!
//! This module provides a common interface for invoking the inference
//! backends registered in the catalog. The `InferenceBackend` trait defines
//! the contract a backend client must implement; the router picks a catalog
//! profile and the orchestrator resolves it to a client through `BackendSet`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::catalog::BackendCatalog;
use crate::config::BackendsConfig;

pub mod ollama;
pub mod router;

/// Result type for backend operations
pub type Result<T> = std::result::Result<T, BackendError>;

/// Errors that can occur while invoking a backend
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("timeout")]
    Timeout,

    #[error("parse error: {0}")]
    Parse(String),
}

/// Message in a stage conversation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Message {
    /// Role of the message sender (user, assistant, system)
    pub role: MessageRole,

    /// Content of the message
    pub content: String,
}

impl Message {
    /// Create a new user message
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    /// Create a new assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }

    /// Create a new system message
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }
}

/// Role of a message sender
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    /// User message
    User,

    /// Assistant message
    Assistant,

    /// System message
    System,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
            MessageRole::System => write!(f, "system"),
        }
    }
}

/// Completion returned by a backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    /// The generated content
    pub content: String,
}

impl Completion {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
        }
    }
}

/// Contract every backend client must implement
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Catalog name of the backend this client serves (e.g. "phi3")
    fn name(&self) -> &str;

    /// Generate a completion for the given conversation
    async fn generate(&self, messages: &[Message]) -> Result<Completion>;

    /// Check if the backend is currently reachable.
    /// Default implementation returns true.
    async fn check_health(&self) -> bool {
        true
    }
}

/// Clients for every catalog entry, keyed by backend name
pub struct BackendSet {
    backends: HashMap<String, Arc<dyn InferenceBackend>>,
}

impl BackendSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self {
            backends: HashMap::new(),
        }
    }

    /// Build one Ollama client per catalog profile, all pointed at the
    /// configured serving endpoint.
    pub fn from_catalog(catalog: &BackendCatalog, config: &BackendsConfig) -> Self {
        let mut set = Self::new();

        for profile in catalog.profiles() {
            let temperature = config
                .entries
                .iter()
                .find(|e| e.name == profile.name)
                .map(|e| e.temperature)
                .unwrap_or(0.7);

            set.insert(Arc::new(ollama::OllamaClient::new(
                profile.name.clone(),
                config.base_url.clone(),
                profile.model.clone(),
                temperature,
            )));
        }

        set
    }

    /// Register a client, replacing any existing client with the same name
    pub fn insert(&mut self, backend: Arc<dyn InferenceBackend>) {
        self.backends.insert(backend.name().to_string(), backend);
    }

    /// Look up a client by catalog name
    pub fn get(&self, name: &str) -> Option<Arc<dyn InferenceBackend>> {
        self.backends.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }

    /// Check the health of all registered clients.
    /// Returns (backend_name, is_healthy) pairs sorted by name.
    pub async fn check_health(&self) -> Vec<(String, bool)> {
        let mut results = Vec::new();
        for (name, backend) in &self.backends {
            results.push((name.clone(), backend.check_health().await));
        }
        results.sort_by(|a, b| a.0.cmp(&b.0));
        results
    }
}

impl Default for BackendSet {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::BackendCatalog;

    #[test]
    fn test_message_creation() {
        let user_msg = Message::user("Hello");
        assert_eq!(user_msg.role, MessageRole::User);
        assert_eq!(user_msg.content, "Hello");

        let assistant_msg = Message::assistant("Hi there");
        assert_eq!(assistant_msg.role, MessageRole::Assistant);

        let system_msg = Message::system("You are a planning specialist");
        assert_eq!(system_msg.role, MessageRole::System);
    }

    #[test]
    fn test_message_serialization() {
        let msg = Message::user("test");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""role":"user"#));

        let deserialized: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(msg, deserialized);
    }

    #[test]
    fn test_backend_set_from_catalog() {
        let config = BackendsConfig::default();
        let catalog = BackendCatalog::from_config(&config).unwrap();
        let set = BackendSet::from_catalog(&catalog, &config);

        assert_eq!(set.len(), 3);
        assert!(set.get("phi3").is_some());
        assert!(set.get("gemma3").is_some());
        assert!(set.get("qwen3").is_some());
        assert!(set.get("missing").is_none());
    }
}
