//! Semantic Memory Port
//!
//! The engine treats similarity scoring as an opaque oracle owned by an
//! external collaborator: the only contract is that retrieval is a pure
//! function of the store's current contents and the query, and that a
//! stored text is findable by a subsequent retrieval with that text as the
//! query. The default implementation is `db::memory::EpisodicMemory`, which
//! ranks with SQLite full-text search; nothing in the engine depends on the
//! ranking technique.

use async_trait::async_trait;
use serde::Serialize;

/// One entry retrieved from the memory store
#[derive(Debug, Clone, Serialize)]
pub struct MemoryEntry {
    /// The stored text (task and result combined)
    pub text: String,

    /// Metadata recorded alongside the text
    pub metadata: serde_json::Value,

    /// Unix timestamp of when the entry was stored
    pub created_at: i64,

    /// Similarity rank assigned by the store (lower is more similar)
    pub rank: f64,
}

/// Contract with the semantic memory collaborator
#[async_trait]
pub trait MemoryPort: Send + Sync {
    /// Retrieve up to `k` entries most similar to `query`, best first
    async fn retrieve(&self, query: &str, k: usize) -> anyhow::Result<Vec<MemoryEntry>>;

    /// Store a completed task/result text with its metadata
    async fn store(&self, text: &str, metadata: serde_json::Value) -> anyhow::Result<()>;
}

/// Render retrieved entries as a context block for stage prompts.
/// Returns an empty string when there is nothing to show.
pub fn format_context(entries: &[MemoryEntry]) -> String {
    if entries.is_empty() {
        return String::new();
    }

    let mut parts = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        parts.push(format!("Previous conversation {}:\n{}", i + 1, entry.text));
    }

    parts.join("\n\n")
}
