// Application context shared by the web and terminal front ends


use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::chain::{Answer, ChatModel, OpenAiChat, RetrievalQaChain};
use crate::config::Config;
use crate::embeddings::{Embedder, OpenAiEmbeddings};
use crate::indexer::{BuildSummary, IndexBuilder, VectorIndex};
use crate::{QaError, Result};

/// Anything that can turn a question into an answer
#[async_trait]
pub trait Answerer: Send + Sync {
    async fn answer(&self, query: &str) -> Result<Answer>;
}

/// Everything a running instance needs, built once at startup
pub struct AppContext {
    config: Config,
    chain: RetrievalQaChain,
}

impl AppContext {
    /// Build a fresh index from the configured sources, then serve from it
    #[inline]
    pub async fn build(config: &Config) -> Result<(Self, BuildSummary)> {
        let (embedder, chat) = Self::hosted_models(config)?;
        Self::build_with(config, embedder, chat).await
    }

    /// Serve from the index persisted by an earlier build
    #[inline]
    pub async fn open(config: &Config) -> Result<Self> {
        let (embedder, chat) = Self::hosted_models(config)?;
        Self::open_with(config, embedder, chat).await
    }

    #[inline]
    pub async fn build_with(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
    ) -> Result<(Self, BuildSummary)> {
        let (index, summary) = IndexBuilder::new(config, Arc::clone(&embedder))
            .build()
            .await?;
        Ok((Self::assemble(config, index, embedder, chat), summary))
    }

    #[inline]
    pub async fn open_with(
        config: &Config,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
    ) -> Result<Self> {
        let index = VectorIndex::open(config).await?;
        Ok(Self::assemble(config, index, embedder, chat))
    }

    fn assemble(
        config: &Config,
        index: VectorIndex,
        embedder: Arc<dyn Embedder>,
        chat: Arc<dyn ChatModel>,
    ) -> Self {
        info!(
            "Ready to answer with {} (embeddings: {})",
            chat.model_name(),
            embedder.model_name()
        );

        Self {
            config: config.clone(),
            chain: RetrievalQaChain::new(index, embedder, chat, config.retrieval.top_k),
        }
    }

    fn hosted_models(config: &Config) -> Result<(Arc<dyn Embedder>, Arc<dyn ChatModel>)> {
        let api_key = Config::api_key().map_err(|e| QaError::Config(e.to_string()))?;

        let embedder = OpenAiEmbeddings::new(&config.openai, api_key.clone())
            .map_err(|e| QaError::Config(format!("{:#}", e)))?;
        let chat = OpenAiChat::new(&config.openai, api_key)
            .map_err(|e| QaError::Config(format!("{:#}", e)))?;

        Ok((Arc::new(embedder), Arc::new(chat)))
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn index(&self) -> &VectorIndex {
        self.chain.index()
    }

    #[inline]
    pub async fn close(&self) {
        self.chain.close().await;
    }
}

#[async_trait]
impl Answerer for AppContext {
    #[inline]
    async fn answer(&self, query: &str) -> Result<Answer> {
        self.chain.run(query).await
    }
}
