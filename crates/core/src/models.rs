use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// An indexed unit of ingested text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub id: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vec<f32>>,
    pub created_at: DateTime<Utc>,
}

impl Chunk {
    /// Builds a chunk that already carries its embedding. Ingestion only ever
    /// appends chunks built this way.
    pub fn embedded(content: String, source: Option<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            content,
            source,
            embedding: Some(embedding),
            created_at: Utc::now(),
        }
    }

    pub fn source_label(&self) -> &str {
        self.source
            .as_deref()
            .filter(|source| !source.trim().is_empty())
            .unwrap_or("unknown")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Chunks embedded and appended by this call.
    pub entries: usize,
    /// Older chunks dropped to stay within capacity.
    pub evicted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoreStats {
    pub entries: usize,
    pub capacity: usize,
    pub embedded: usize,
    pub dimensions: Vec<usize>,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

impl StoreStats {
    pub fn from_chunks(chunks: &[Chunk], capacity: usize) -> Self {
        let mut dimensions = chunks
            .iter()
            .filter_map(|chunk| chunk.embedding.as_ref().map(Vec::len))
            .collect::<Vec<_>>();
        dimensions.sort_unstable();
        dimensions.dedup();

        Self {
            entries: chunks.len(),
            capacity,
            embedded: chunks.iter().filter(|chunk| chunk.embedding.is_some()).count(),
            dimensions,
            oldest: chunks.iter().map(|chunk| chunk.created_at).min(),
            newest: chunks.iter().map(|chunk| chunk.created_at).max(),
        }
    }
}
