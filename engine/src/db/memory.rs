//! Episodic Memory Store
//!
//! Full-text-search implementation of the `MemoryPort` contract. Stored
//! texts are indexed in an FTS5 table; retrieval ranks matches by bm25 and
//! returns the best `k`. The ranking function is an implementation detail —
//! callers only rely on the port contract.

use crate::memory::{MemoryEntry, MemoryPort};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Row, SqlitePool};

/// FTS-backed memory store
pub struct EpisodicMemory {
    pool: SqlitePool,
}

impl EpisodicMemory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Build a safe FTS match expression from free-form query text.
    ///
    /// Raw query text can contain FTS5 operators; quoting each token and
    /// joining with OR keeps the query valid for any input. Returns `None`
    /// when the text contains no indexable tokens.
    fn match_expression(query: &str) -> Option<String> {
        let tokens: Vec<String> = query
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| format!("\"{}\"", t))
            .collect();

        if tokens.is_empty() {
            None
        } else {
            Some(tokens.join(" OR "))
        }
    }
}

#[async_trait]
impl MemoryPort for EpisodicMemory {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<MemoryEntry>> {
        let Some(expression) = Self::match_expression(query) else {
            return Ok(Vec::new());
        };

        let rows = sqlx::query(
            r#"
            SELECT m.text AS text, m.metadata AS metadata, m.created_at AS created_at,
                   memory_fts.rank AS rank
            FROM memory_fts
            JOIN memory_entries m ON m.id = memory_fts.rowid
            WHERE memory_fts MATCH ?1
            ORDER BY rank
            LIMIT ?2
            "#,
        )
        .bind(&expression)
        .bind(k as i64)
        .fetch_all(&self.pool)
        .await
        .context("Failed to execute FTS query on memory_fts")?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let metadata_raw: String = row.get("metadata");
            entries.push(MemoryEntry {
                text: row.get("text"),
                metadata: serde_json::from_str(&metadata_raw)
                    .unwrap_or(serde_json::Value::Null),
                created_at: row.get("created_at"),
                rank: row.get("rank"),
            });
        }

        Ok(entries)
    }

    async fn store(&self, text: &str, metadata: serde_json::Value) -> Result<()> {
        sqlx::query(
            "INSERT INTO memory_entries (text, metadata, created_at) VALUES (?1, ?2, ?3)",
        )
        .bind(text)
        .bind(metadata.to_string())
        .bind(chrono::Utc::now().timestamp())
        .execute(&self.pool)
        .await
        .context("Failed to insert memory entry")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_expression_quotes_tokens() {
        let expr = EpisodicMemory::match_expression("fix the parser").unwrap();
        assert_eq!(expr, r#""fix" OR "the" OR "parser""#);
    }

    #[test]
    fn test_match_expression_strips_operators() {
        let expr = EpisodicMemory::match_expression(r#"NEAR("a b") AND c*"#).unwrap();
        assert!(expr.contains(r#""NEAR""#));
        assert!(!expr.contains('('));
        assert!(!expr.contains('*'));
    }

    #[test]
    fn test_match_expression_empty_input() {
        assert!(EpisodicMemory::match_expression("").is_none());
        assert!(EpisodicMemory::match_expression("!!! ---").is_none());
    }
}
