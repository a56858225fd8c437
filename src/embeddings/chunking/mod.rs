#[cfg(test)]
mod tests;

use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::loader::Document;

/// Where a chunk came from inside its document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub source_url: String,
    /// Position of this chunk within its document
    pub chunk_index: usize,
    /// Character offset of the first character, inclusive
    pub start: usize,
    /// Character offset one past the last character
    pub end: usize,
}

/// A window of document text ready for cleaning and embedding
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Configuration for splitting documents into chunks.
///
/// Sizes are counted in characters (Unicode scalar values), not bytes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum number of characters in a chunk
    pub chunk_size: usize,
    /// Number of characters shared by consecutive chunks
    pub chunk_overlap: usize,
    /// Preferred place to end a chunk
    pub separator: char,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            separator: ' ',
        }
    }
}

impl ChunkingConfig {
    #[inline]
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            bail!("chunk size must be at least 1");
        }
        if self.chunk_overlap >= self.chunk_size {
            bail!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        Ok(())
    }
}

/// Compute the `[start, end)` character windows covering a text of `len` characters.
///
/// `is_separator(p)` reports whether the character at offset `p` is the separator.
/// A window ends just before the last separator that keeps it longer than the
/// overlap, otherwise it is cut at exactly `chunk_size` characters. The next window
/// always begins `chunk_overlap` characters before the previous one ended.
fn window_bounds<F>(len: usize, config: &ChunkingConfig, is_separator: F) -> Vec<(usize, usize)>
where
    F: Fn(usize) -> bool,
{
    if len == 0 {
        return Vec::new();
    }
    if len <= config.chunk_size {
        return vec![(0, len)];
    }

    let mut windows = Vec::new();
    let mut start = 0;
    loop {
        if start + config.chunk_size >= len {
            windows.push((start, len));
            break;
        }

        let hard_end = start + config.chunk_size;
        let end = (start + config.chunk_overlap + 1..=hard_end)
            .rev()
            .find(|&p| is_separator(p))
            .unwrap_or(hard_end);

        windows.push((start, end));
        start = end - config.chunk_overlap;
    }

    windows
}

/// Split a single document into overlapping chunks
#[inline]
pub fn split_document(document: &Document, config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    config.validate()?;

    let text = document.text.as_str();
    let chars: Vec<(usize, char)> = text.char_indices().collect();
    let byte_offset = |char_offset: usize| {
        chars
            .get(char_offset)
            .map_or(text.len(), |&(byte, _)| byte)
    };

    let bounds = window_bounds(chars.len(), config, |p| {
        chars.get(p).is_some_and(|&(_, c)| c == config.separator)
    });

    let chunks = bounds
        .into_iter()
        .enumerate()
        .map(|(chunk_index, (start, end))| Chunk {
            text: text
                .get(byte_offset(start)..byte_offset(end))
                .unwrap_or_default()
                .to_string(),
            metadata: ChunkMetadata {
                source_url: document.source_url.clone(),
                chunk_index,
                start,
                end,
            },
        })
        .collect::<Vec<_>>();

    debug!(
        "Split {} ({} chars) into {} chunks",
        document.source_url,
        chars.len(),
        chunks.len()
    );

    Ok(chunks)
}

/// Split every document, keeping document order and per-document chunk order
#[inline]
pub fn split_documents(documents: &[Document], config: &ChunkingConfig) -> Result<Vec<Chunk>> {
    let mut chunks = Vec::new();
    for document in documents {
        chunks.extend(split_document(document, config)?);
    }
    Ok(chunks)
}

/// Normalize chunk whitespace: paragraph breaks become single spaces and the
/// ends are trimmed.
#[inline]
pub fn clean_text(text: &str) -> String {
    text.replace("\n\n", " ").trim().to_string()
}

#[inline]
pub fn clean_chunk(chunk: Chunk) -> Chunk {
    Chunk {
        text: clean_text(&chunk.text),
        metadata: chunk.metadata,
    }
}

/// Clean every chunk and drop the ones left empty
#[inline]
pub fn clean_chunks(chunks: Vec<Chunk>) -> Vec<Chunk> {
    chunks
        .into_iter()
        .map(clean_chunk)
        .filter(|chunk| {
            let keep = !chunk.text.is_empty();
            if !keep {
                debug!(
                    "Dropping empty chunk {} of {}",
                    chunk.metadata.chunk_index, chunk.metadata.source_url
                );
            }
            keep
        })
        .collect()
}
