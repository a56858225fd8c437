#[cfg(test)]
mod tests;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DocumentRecord {
    pub id: i64,
    pub source_url: String,
    pub title: Option<String>,
    /// Position of the source URL in the configured list
    pub position: i64,
    /// Length of the extracted text in characters
    pub content_length: i64,
    pub loaded_date: NaiveDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDocument {
    pub source_url: String,
    pub title: Option<String>,
    pub position: i64,
    pub content_length: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct ChunkRecord {
    pub id: i64,
    /// Key shared with the vector index
    pub chunk_id: String,
    pub document_id: i64,
    pub source_url: String,
    pub chunk_index: i64,
    pub start_offset: i64,
    pub end_offset: i64,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewChunk {
    pub chunk_id: String,
    pub document_id: i64,
    pub chunk_index: i64,
    pub start_offset: i64,
    pub end_offset: i64,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Type)]
#[sqlx(type_name = "TEXT", rename_all = "lowercase")]
pub enum BuildStatus {
    Building,
    Completed,
    Failed,
}

impl std::fmt::Display for BuildStatus {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            BuildStatus::Building => write!(f, "Building"),
            BuildStatus::Completed => write!(f, "Completed"),
            BuildStatus::Failed => write!(f, "Failed"),
        }
    }
}

/// One run of the index build
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct IndexBuild {
    pub id: i64,
    pub status: BuildStatus,
    pub document_count: i64,
    pub chunk_count: i64,
    pub embedding_model: String,
    pub dimension: Option<i64>,
    pub started_date: NaiveDateTime,
    pub completed_date: Option<NaiveDateTime>,
    pub error_message: Option<String>,
}

impl IndexBuild {
    #[inline]
    pub fn is_completed(&self) -> bool {
        self.status == BuildStatus::Completed
    }

    /// Wall-clock duration of a finished build
    #[inline]
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.completed_date.map(|done| done - self.started_date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct DocumentChunkCount {
    pub source_url: String,
    pub title: Option<String>,
    pub chunk_count: i64,
}
