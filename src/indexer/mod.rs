// Index construction (load, chunk, clean, embed, persist, reload) and index loading

pub mod consistency;


use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, error, info};

use crate::config::Config;
use crate::database::lancedb::{VectorRecord, VectorStore};
use crate::database::sqlite::{ChunkRecord, Database, IndexBuild};
use crate::embeddings::{Chunk, Embedder, clean_chunks, split_documents};
use crate::loader::{DocumentLoader, LoadFailure};
use crate::{QaError, Result};

pub use consistency::{ConsistencyReport, ConsistencyValidator};

const REBUILD_HINT: &str = "run `news-qa build` to create it";

/// A docstore chunk returned by a similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedChunk {
    pub chunk: ChunkRecord,
    pub similarity_score: f32,
    pub distance: f32,
}

/// A persisted index opened for querying
pub struct VectorIndex {
    database: Database,
    vector_store: VectorStore,
    build: IndexBuild,
}

impl VectorIndex {
    /// Open the index stored under the configured base directory
    #[inline]
    pub async fn open(config: &Config) -> Result<Self> {
        Self::open_at(&config.database_path(), &config.vector_database_path()).await
    }

    /// Open a persisted index, refusing anything but a complete and consistent build
    #[inline]
    pub async fn open_at(database_path: &Path, vector_path: &Path) -> Result<Self> {
        if !database_path.exists() {
            return Err(QaError::Index(format!(
                "No index found at {}; {}",
                database_path.display(),
                REBUILD_HINT
            )));
        }

        let database = Database::open_existing(database_path)
            .await
            .map_err(|e| QaError::Database(format!("{:#}", e)))?;

        let build = database
            .latest_build()
            .await?
            .ok_or_else(|| QaError::Index(format!("The index has never been built; {}", REBUILD_HINT)))?;

        if !build.is_completed() {
            let reason = build
                .error_message
                .as_deref()
                .map(|message| format!(" ({})", message))
                .unwrap_or_default();
            return Err(QaError::Index(format!(
                "The latest index build #{} is {}{}; {}",
                build.id,
                build.status.to_string().to_lowercase(),
                reason,
                REBUILD_HINT
            )));
        }

        let vector_store = VectorStore::open_existing(vector_path)
            .await
            .map_err(|e| QaError::Index(format!("{}; {}", e, REBUILD_HINT)))?;

        if let Some(expected) = build.dimension {
            let actual = vector_store.dimension().await?;
            if actual as i64 != expected {
                return Err(QaError::Index(format!(
                    "Vector index dimension {} does not match build #{} ({}); {}",
                    actual, build.id, expected, REBUILD_HINT
                )));
            }
        }

        let report = ConsistencyValidator::new(&database, &vector_store)
            .validate_consistency()
            .await?;
        if !report.is_consistent {
            return Err(QaError::Index(format!(
                "Docstore and vector index disagree ({}); {}",
                report.summary(),
                REBUILD_HINT
            )));
        }

        info!(
            "Opened index build #{} with {} chunks",
            build.id, report.docstore_chunks
        );

        Ok(Self {
            database,
            vector_store,
            build,
        })
    }

    #[inline]
    pub fn build_info(&self) -> &IndexBuild {
        &self.build
    }

    #[inline]
    pub fn database(&self) -> &Database {
        &self.database
    }

    #[inline]
    pub fn vector_store(&self) -> &VectorStore {
        &self.vector_store
    }

    #[inline]
    pub async fn chunk_count(&self) -> Result<usize> {
        Ok(self.vector_store.count().await?)
    }

    /// Return up to `k` chunks nearest to `query_vector`, closest first
    #[inline]
    pub async fn search(&self, query_vector: &[f32], k: usize) -> Result<Vec<RetrievedChunk>> {
        if k == 0 {
            return Ok(Vec::new());
        }

        let hits = self.vector_store.search_similar(query_vector, k).await?;
        let chunk_ids: Vec<String> = hits.iter().map(|hit| hit.chunk_id.clone()).collect();

        let mut records: HashMap<String, ChunkRecord> = self
            .database
            .get_chunks(&chunk_ids)
            .await?
            .into_iter()
            .map(|record| (record.chunk_id.clone(), record))
            .collect();

        hits.into_iter()
            .map(|hit| {
                let chunk = records.remove(&hit.chunk_id).ok_or_else(|| {
                    QaError::Index(format!(
                        "Vector index row {} has no docstore entry",
                        hit.chunk_id
                    ))
                })?;
                Ok(RetrievedChunk {
                    chunk,
                    similarity_score: hit.similarity_score,
                    distance: hit.distance,
                })
            })
            .collect()
    }

    #[inline]
    pub async fn close(&self) {
        self.database.close().await;
    }
}

/// What a build produced
#[derive(Debug, Clone, PartialEq)]
pub struct BuildSummary {
    pub build_id: i64,
    pub documents: usize,
    pub failed_urls: Vec<LoadFailure>,
    pub chunks: usize,
    pub dimension: usize,
    pub duration: Duration,
}

/// Builds the index from the configured sources and reloads it from disk
pub struct IndexBuilder {
    config: Config,
    embedder: Arc<dyn Embedder>,
    loader: DocumentLoader,
}

impl IndexBuilder {
    #[inline]
    pub fn new(config: &Config, embedder: Arc<dyn Embedder>) -> Self {
        Self {
            loader: DocumentLoader::new(&config.loader),
            config: config.clone(),
            embedder,
        }
    }

    #[inline]
    pub fn with_loader(mut self, loader: DocumentLoader) -> Self {
        self.loader = loader;
        self
    }

    /// Run the whole pipeline and return the freshly reloaded index.
    ///
    /// Nothing on disk changes unless loading, chunking and embedding all succeed.
    #[inline]
    pub async fn build(&mut self) -> Result<(VectorIndex, BuildSummary)> {
        let started = Instant::now();
        info!("Building index from {} sources", self.config.loader.urls.len());

        let report = self.loader.load().await;
        let failed_urls = report.failed.clone();
        let documents = report.into_documents()?;

        let chunks = clean_chunks(
            split_documents(&documents, &self.config.chunking)
                .map_err(|e| QaError::Index(format!("{:#}", e)))?,
        );
        if chunks.is_empty() {
            return Err(QaError::Index(format!(
                "No text chunks were produced from {} loaded documents",
                documents.len()
            )));
        }
        info!(
            "Split {} documents into {} chunks",
            documents.len(),
            chunks.len()
        );

        let vectors = self.embed_chunks(&chunks).await?;

        let base_dir = self.config.get_base_dir().to_path_buf();
        let database = Database::initialize_from_config_dir(&base_dir)
            .await
            .map_err(|e| QaError::Database(format!("{:#}", e)))?;

        let stored = database
            .replace_corpus(&documents, &chunks, self.embedder.model_name())
            .await
            .map_err(|e| QaError::Database(format!("{:#}", e)))?;

        let records: Vec<VectorRecord> = chunks
            .iter()
            .zip(stored.chunk_ids.iter())
            .zip(vectors)
            .map(|((chunk, chunk_id), vector)| {
                VectorRecord::new(
                    chunk_id.clone(),
                    chunk.metadata.source_url.clone(),
                    chunk.metadata.chunk_index as u32,
                    vector,
                )
            })
            .collect();

        let dimension = match self.persist_vectors(&records).await {
            Ok(dimension) => dimension,
            Err(e) => {
                error!("Failed to write vector index: {}", e);
                database
                    .mark_build_failed(stored.build_id, &e.to_string())
                    .await?;
                database.close().await;
                return Err(e);
            }
        };

        database
            .mark_build_completed(stored.build_id, dimension)
            .await?;
        database.close().await;

        let index = VectorIndex::open(&self.config).await?;

        let summary = BuildSummary {
            build_id: stored.build_id,
            documents: documents.len(),
            failed_urls,
            chunks: chunks.len(),
            dimension,
            duration: started.elapsed(),
        };

        info!(
            "Index build #{} completed: {} documents, {} chunks, dimension {} in {:?}",
            summary.build_id, summary.documents, summary.chunks, summary.dimension, summary.duration
        );

        Ok((index, summary))
    }

    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>> {
        let batch_size = self.config.openai.batch_size.max(1) as usize;
        let bar = crate::progress_bar(
            chunks.len(),
            "{spinner} [{bar:30}] {pos}/{len} chunks embedded",
        );

        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
            let embedder = Arc::clone(&self.embedder);

            let batch_vectors = tokio::task::spawn_blocking(move || embedder.embed_documents(&texts))
                .await
                .map_err(|e| QaError::Embedding(format!("Embedding task failed: {}", e)))?
                .map_err(|e| QaError::Embedding(format!("{:#}", e)))?;

            if batch_vectors.len() != batch.len() {
                return Err(QaError::Embedding(format!(
                    "Expected {} vectors, got {}",
                    batch.len(),
                    batch_vectors.len()
                )));
            }

            vectors.extend(batch_vectors);
            bar.inc(batch.len() as u64);
            debug!("Embedded {}/{} chunks", vectors.len(), chunks.len());
        }

        bar.finish_and_clear();
        Ok(vectors)
    }

    async fn persist_vectors(&self, records: &[VectorRecord]) -> Result<usize> {
        let store = VectorStore::connect(&self.vector_path()).await?;
        store.replace_all(records).await
    }

    fn vector_path(&self) -> PathBuf {
        self.config.vector_database_path()
    }
}
