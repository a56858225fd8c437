// LanceDB vector index: one row per embedded chunk, keyed into the docstore by chunk_id


pub mod vector_store;

use serde::{Deserialize, Serialize};

pub use vector_store::{SearchHit, VectorStore};

/// Row stored in the vector table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorRecord {
    /// Unique identifier of the row
    pub id: String,
    pub vector: Vec<f32>,
    /// Docstore key of the chunk this vector embeds
    pub chunk_id: String,
    pub source_url: String,
    pub chunk_index: u32,
}

impl VectorRecord {
    #[inline]
    pub fn new(chunk_id: String, source_url: String, chunk_index: u32, vector: Vec<f32>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            vector,
            chunk_id,
            source_url,
            chunk_index,
        }
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.vector.len()
    }
}
