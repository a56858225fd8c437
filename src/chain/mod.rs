// Retrieval question answering: embed the question, fetch the closest chunks,
// ask the chat model and split its reply into an answer and cited sources.

pub mod openai;


use std::fmt::Write as _;
use std::sync::Arc;

use itertools::Itertools;
use tracing::{debug, info};
use url::Url;

use crate::embeddings::Embedder;
use crate::indexer::{RetrievedChunk, VectorIndex};
use crate::{QaError, Result};

pub use openai::OpenAiChat;

/// Answer given when the index returned nothing to ground a reply on
pub const NO_CONTENT_ANSWER: &str =
    "I don't know. No indexed news content matched your question.";

const SOURCES_MARKER: &str = "SOURCES:";

/// Blocking text completion
pub trait ChatModel: Send + Sync {
    fn complete(&self, prompt: &str) -> anyhow::Result<String>;

    fn model_name(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    /// Source URLs backing the answer, most relevant first
    pub sources: Vec<String>,
}

pub struct RetrievalQaChain {
    index: VectorIndex,
    embedder: Arc<dyn Embedder>,
    chat: Arc<dyn ChatModel>,
    top_k: usize,
}

impl RetrievalQaChain {
    #[inline]
    pub fn new(
        index: VectorIndex,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
        top_k: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            chat,
            top_k,
        }
    }

    #[inline]
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    #[inline]
    pub async fn run(&self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(QaError::Answer("Question is empty".to_string()));
        }

        let embedder = Arc::clone(&self.embedder);
        let owned_question = question.to_string();
        let query_vector = tokio::task::spawn_blocking(move || embedder.embed_query(&owned_question))
            .await
            .map_err(|e| QaError::Embedding(format!("Embedding task failed: {}", e)))?
            .map_err(|e| QaError::Embedding(format!("{:#}", e)))?;

        let retrieved = self.index.search(&query_vector, self.top_k).await?;
        debug!("Retrieved {} chunks for question", retrieved.len());

        if retrieved.is_empty() {
            return Ok(Answer {
                text: NO_CONTENT_ANSWER.to_string(),
                sources: Vec::new(),
            });
        }

        let prompt = build_prompt(question, &retrieved);
        let chat = Arc::clone(&self.chat);
        let reply = tokio::task::spawn_blocking(move || chat.complete(&prompt))
            .await
            .map_err(|e| QaError::Answer(format!("Chat task failed: {}", e)))?
            .map_err(|e| QaError::Answer(format!("{:#}", e)))?;

        let answer = parse_answer(&reply, &retrieved);
        info!(
            "Answered question with {} sources from {}",
            answer.sources.len(),
            self.chat.model_name()
        );
        Ok(answer)
    }

    #[inline]
    pub async fn close(&self) {
        self.index.close().await;
    }
}

/// Prompt listing every retrieved chunk with its source, followed by the question
#[inline]
pub fn build_prompt(question: &str, retrieved: &[RetrievedChunk]) -> String {
    let mut prompt = String::from(
        "Given the following extracted parts of news articles and a question, create a final \
         answer with references (\"SOURCES\").\nIf you don't know the answer, just say that you \
         don't know. Don't try to make up an answer.\nALWAYS return a \"SOURCES\" part at the end \
         of your answer, listing the source URLs you used separated by commas.\n\n",
    );

    let _ = writeln!(prompt, "QUESTION: {}", question);
    prompt.push_str("=========\n");
    for hit in retrieved {
        let _ = writeln!(
            prompt,
            "Content: {}\nSource: {}\n",
            hit.chunk.content, hit.chunk.source_url
        );
    }
    prompt.push_str("=========\nFINAL ANSWER:");
    prompt
}

/// Split a model reply into answer text and the sources it cites.
///
/// Only URLs that were actually retrieved count as sources. A reply with no
/// `SOURCES:` line is credited to every retrieved source in rank order.
#[inline]
pub fn parse_answer(reply: &str, retrieved: &[RetrievedChunk]) -> Answer {
    let retrieved_sources: Vec<&str> = retrieved
        .iter()
        .map(|hit| hit.chunk.source_url.as_str())
        .unique()
        .collect();

    let Some(position) = find_sources_marker(reply) else {
        return Answer {
            text: reply.trim().to_string(),
            sources: retrieved_sources.iter().map(|s| (*s).to_string()).collect(),
        };
    };

    let text = reply.get(..position).unwrap_or_default().trim().to_string();
    let cited = reply
        .get(position + SOURCES_MARKER.len()..)
        .unwrap_or_default();

    let retrieved_keys: Vec<(String, &str)> = retrieved_sources
        .iter()
        .map(|source| (citation_key(source), *source))
        .collect();

    let sources = cited
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(trim_citation)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| {
            let key = citation_key(entry);
            retrieved_keys
                .iter()
                .find(|(retrieved_key, _)| *retrieved_key == key)
                .map(|(_, source)| *source)
        })
        .unique()
        .map(str::to_string)
        .collect();

    Answer { text, sources }
}

/// Byte offset of the last case-insensitive `SOURCES:` marker
fn find_sources_marker(reply: &str) -> Option<usize> {
    reply
        .char_indices()
        .rev()
        .map(|(index, _)| index)
        .find(|&index| {
            reply
                .get(index..index + SOURCES_MARKER.len())
                .is_some_and(|candidate| candidate.eq_ignore_ascii_case(SOURCES_MARKER))
        })
}

/// Comparison form of a URL: scheme and host lowercased, trailing `/` and fragment ignored
fn citation_key(source: &str) -> String {
    match Url::parse(source) {
        Ok(mut url) => {
            url.set_fragment(None);
            let path = url.path().trim_end_matches('/').to_string();
            url.set_path(&path);
            url.as_str().trim_end_matches('/').to_string()
        }
        Err(_) => source.trim().trim_end_matches('/').to_lowercase(),
    }
}

fn trim_citation(entry: &str) -> &str {
    entry.trim_matches(|c: char| {
        matches!(
            c,
            '.' | ';' | '"' | '\'' | '(' | ')' | '[' | ']' | '<' | '>' | '*' | '`'
        )
    })
}
