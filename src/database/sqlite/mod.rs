use anyhow::{Context, Result, anyhow};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};
use uuid::Uuid;

use crate::embeddings::Chunk;
use crate::loader::Document;


pub mod models;
pub mod queries;

pub use models::{
    BuildStatus, ChunkRecord, DocumentChunkCount, DocumentRecord, IndexBuild, NewChunk,
    NewDocument,
};
pub use queries::{ChunkQueries, DocumentQueries, IndexBuildQueries};

pub type DbPool = Pool<Sqlite>;

/// Result of writing a new corpus to the docstore
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCorpus {
    pub build_id: i64,
    /// Fresh chunk ids, aligned with the chunks passed in
    pub chunk_ids: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    #[inline]
    pub async fn new<P: AsRef<Path>>(database_url: P) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(database_url)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .context("Failed to create database connection pool")?;

        let database = Self { pool };
        database.run_migrations().await?;

        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    #[inline]
    pub async fn initialize_from_config_dir(config_dir: &Path) -> Result<Self> {
        let db_path = config_dir.join("metadata.db");

        std::fs::create_dir_all(config_dir).with_context(|| {
            format!(
                "Failed to create config directory: {}",
                config_dir.display()
            )
        })?;

        Self::new(db_path).await
    }

    /// Open an existing docstore without creating it
    #[inline]
    pub async fn open_existing(db_path: &Path) -> Result<Self> {
        if !db_path.exists() {
            return Err(anyhow!("Docstore not found at {}", db_path.display()));
        }
        Self::new(db_path).await
    }

    #[inline]
    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Replace all documents and chunks and open a new build, in one transaction.
    ///
    /// Every chunk's `source_url` must belong to one of `documents`.
    #[inline]
    pub async fn replace_corpus(
        &self,
        documents: &[Document],
        chunks: &[Chunk],
        embedding_model: &str,
    ) -> Result<StoredCorpus> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin docstore transaction")?;

        let removed = DocumentQueries::delete_all(&mut *tx).await?;
        debug!("Removed {} documents from previous build", removed);

        let mut document_ids: HashMap<&str, i64> = HashMap::new();
        for (position, document) in documents.iter().enumerate() {
            let new_document = NewDocument {
                source_url: document.source_url.clone(),
                title: document.title.clone(),
                position: position as i64,
                content_length: document.text.chars().count() as i64,
            };
            let id = DocumentQueries::create(&mut *tx, &new_document).await?;
            document_ids.entry(document.source_url.as_str()).or_insert(id);
        }

        let mut chunk_ids = Vec::with_capacity(chunks.len());
        for chunk in chunks {
            let document_id = *document_ids
                .get(chunk.metadata.source_url.as_str())
                .ok_or_else(|| {
                    anyhow!(
                        "Chunk refers to unknown document {}",
                        chunk.metadata.source_url
                    )
                })?;

            let chunk_id = Uuid::new_v4().to_string();
            let new_chunk = NewChunk {
                chunk_id: chunk_id.clone(),
                document_id,
                chunk_index: chunk.metadata.chunk_index as i64,
                start_offset: chunk.metadata.start as i64,
                end_offset: chunk.metadata.end as i64,
                content: chunk.text.clone(),
            };
            ChunkQueries::create(&mut *tx, &new_chunk).await?;
            chunk_ids.push(chunk_id);
        }

        let build_id = IndexBuildQueries::create(
            &mut *tx,
            embedding_model,
            documents.len() as i64,
            chunks.len() as i64,
        )
        .await?;

        tx.commit()
            .await
            .context("Failed to commit docstore transaction")?;

        info!(
            "Stored {} documents and {} chunks (build {})",
            documents.len(),
            chunk_ids.len(),
            build_id
        );

        Ok(StoredCorpus {
            build_id,
            chunk_ids,
        })
    }

    #[inline]
    pub async fn mark_build_completed(&self, build_id: i64, dimension: usize) -> Result<()> {
        IndexBuildQueries::mark_completed(&self.pool, build_id, dimension as i64).await
    }

    #[inline]
    pub async fn mark_build_failed(&self, build_id: i64, error_message: &str) -> Result<()> {
        IndexBuildQueries::mark_failed(&self.pool, build_id, error_message).await
    }

    #[inline]
    pub async fn latest_build(&self) -> Result<Option<IndexBuild>> {
        IndexBuildQueries::latest(&self.pool).await
    }

    #[inline]
    pub async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        DocumentQueries::list_all(&self.pool).await
    }

    #[inline]
    pub async fn get_chunk(&self, chunk_id: &str) -> Result<Option<ChunkRecord>> {
        ChunkQueries::get_by_chunk_id(&self.pool, chunk_id).await
    }

    #[inline]
    pub async fn get_chunks(&self, chunk_ids: &[String]) -> Result<Vec<ChunkRecord>> {
        ChunkQueries::get_by_chunk_ids(&self.pool, chunk_ids).await
    }

    #[inline]
    pub async fn list_chunk_ids(&self) -> Result<Vec<String>> {
        ChunkQueries::list_chunk_ids(&self.pool).await
    }

    #[inline]
    pub async fn chunk_count(&self) -> Result<i64> {
        ChunkQueries::count(&self.pool).await
    }

    #[inline]
    pub async fn chunk_counts_by_document(&self) -> Result<Vec<DocumentChunkCount>> {
        ChunkQueries::counts_by_document(&self.pool).await
    }
}
