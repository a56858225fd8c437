pub mod chunking;
pub mod openai;

use anyhow::Result;

pub use chunking::{
    Chunk, ChunkMetadata, ChunkingConfig, clean_chunk, clean_chunks, clean_text, split_document,
    split_documents,
};
pub use openai::{OpenAiClient, OpenAiEmbeddings};

/// Maps text to fixed-length vectors.
///
/// Calls are blocking; async callers should run them on a blocking thread.
pub trait Embedder: Send + Sync {
    /// Embed a batch of chunk texts, returning one vector per input in input order
    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Name of the model producing the vectors
    fn model_name(&self) -> &str;
}
