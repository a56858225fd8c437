
use super::models::*;
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqliteExecutor, SqlitePool};
use tracing::debug;

const CHUNK_SELECT: &str = "SELECT c.id, c.chunk_id, c.document_id, d.source_url, c.chunk_index, \
     c.start_offset, c.end_offset, c.content \
     FROM chunks c JOIN documents d ON d.id = c.document_id";

pub struct DocumentQueries;

impl DocumentQueries {
    #[inline]
    pub async fn create<'e, E>(executor: E, document: &NewDocument) -> Result<i64>
    where
        E: SqliteExecutor<'e>,
    {
        let now = Utc::now().naive_utc();
        let id = sqlx::query(
            "INSERT INTO documents (source_url, title, position, content_length, loaded_date) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&document.source_url)
        .bind(&document.title)
        .bind(document.position)
        .bind(document.content_length)
        .bind(now)
        .execute(executor)
        .await
        .context("Failed to create document")?
        .last_insert_rowid();

        Ok(id)
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<DocumentRecord>> {
        sqlx::query_as::<_, DocumentRecord>(
            "SELECT id, source_url, title, position, content_length, loaded_date \
             FROM documents ORDER BY position",
        )
        .fetch_all(pool)
        .await
        .context("Failed to list documents")
    }

    /// Delete every document; chunks go with them
    #[inline]
    pub async fn delete_all<'e, E>(executor: E) -> Result<u64>
    where
        E: SqliteExecutor<'e>,
    {
        let result = sqlx::query("DELETE FROM documents")
            .execute(executor)
            .await
            .context("Failed to delete documents")?;

        Ok(result.rows_affected())
    }
}

pub struct ChunkQueries;

impl ChunkQueries {
    #[inline]
    pub async fn create<'e, E>(executor: E, chunk: &NewChunk) -> Result<i64>
    where
        E: SqliteExecutor<'e>,
    {
        let id = sqlx::query(
            "INSERT INTO chunks (chunk_id, document_id, chunk_index, start_offset, end_offset, content) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&chunk.chunk_id)
        .bind(chunk.document_id)
        .bind(chunk.chunk_index)
        .bind(chunk.start_offset)
        .bind(chunk.end_offset)
        .bind(&chunk.content)
        .execute(executor)
        .await
        .context("Failed to create chunk")?
        .last_insert_rowid();

        Ok(id)
    }

    #[inline]
    pub async fn get_by_chunk_id(pool: &SqlitePool, chunk_id: &str) -> Result<Option<ChunkRecord>> {
        sqlx::query_as::<_, ChunkRecord>(&format!("{} WHERE c.chunk_id = ?", CHUNK_SELECT))
            .bind(chunk_id)
            .fetch_optional(pool)
            .await
            .context("Failed to get chunk by id")
    }

    /// Fetch the chunks with the given ids, in no particular order
    #[inline]
    pub async fn get_by_chunk_ids(
        pool: &SqlitePool,
        chunk_ids: &[String],
    ) -> Result<Vec<ChunkRecord>> {
        if chunk_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new(CHUNK_SELECT);
        builder.push(" WHERE c.chunk_id IN (");
        let mut separated = builder.separated(", ");
        for chunk_id in chunk_ids {
            separated.push_bind(chunk_id);
        }
        separated.push_unseparated(")");

        let chunks = builder
            .build_query_as::<ChunkRecord>()
            .fetch_all(pool)
            .await
            .context("Failed to get chunks by id")?;

        debug!(
            "Fetched {} of {} requested chunks",
            chunks.len(),
            chunk_ids.len()
        );
        Ok(chunks)
    }

    #[inline]
    pub async fn list_by_document(pool: &SqlitePool, document_id: i64) -> Result<Vec<ChunkRecord>> {
        sqlx::query_as::<_, ChunkRecord>(&format!(
            "{} WHERE c.document_id = ? ORDER BY c.chunk_index",
            CHUNK_SELECT
        ))
        .bind(document_id)
        .fetch_all(pool)
        .await
        .context("Failed to list chunks for document")
    }

    #[inline]
    pub async fn list_chunk_ids(pool: &SqlitePool) -> Result<Vec<String>> {
        sqlx::query_scalar::<_, String>("SELECT chunk_id FROM chunks ORDER BY id")
            .fetch_all(pool)
            .await
            .context("Failed to list chunk ids")
    }

    #[inline]
    pub async fn count(pool: &SqlitePool) -> Result<i64> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM chunks")
            .fetch_one(pool)
            .await
            .context("Failed to count chunks")
    }

    #[inline]
    pub async fn counts_by_document(pool: &SqlitePool) -> Result<Vec<DocumentChunkCount>> {
        sqlx::query_as::<_, DocumentChunkCount>(
            "SELECT d.source_url, d.title, COUNT(c.id) AS chunk_count \
             FROM documents d LEFT JOIN chunks c ON c.document_id = d.id \
             GROUP BY d.id ORDER BY d.position",
        )
        .fetch_all(pool)
        .await
        .context("Failed to count chunks per document")
    }
}

pub struct IndexBuildQueries;

impl IndexBuildQueries {
    #[inline]
    pub async fn create<'e, E>(
        executor: E,
        embedding_model: &str,
        document_count: i64,
        chunk_count: i64,
    ) -> Result<i64>
    where
        E: SqliteExecutor<'e>,
    {
        let now = Utc::now().naive_utc();
        let id = sqlx::query(
            "INSERT INTO index_builds (status, document_count, chunk_count, embedding_model, started_date) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(BuildStatus::Building)
        .bind(document_count)
        .bind(chunk_count)
        .bind(embedding_model)
        .bind(now)
        .execute(executor)
        .await
        .context("Failed to create index build")?
        .last_insert_rowid();

        Ok(id)
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<IndexBuild>> {
        sqlx::query_as::<_, IndexBuild>("SELECT * FROM index_builds WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get index build")
    }

    #[inline]
    pub async fn mark_completed(pool: &SqlitePool, id: i64, dimension: i64) -> Result<()> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            "UPDATE index_builds SET status = ?, dimension = ?, completed_date = ?, error_message = NULL \
             WHERE id = ?",
        )
        .bind(BuildStatus::Completed)
        .bind(dimension)
        .bind(now)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to mark index build completed")?;

        Ok(())
    }

    #[inline]
    pub async fn mark_failed(pool: &SqlitePool, id: i64, error_message: &str) -> Result<()> {
        let now = Utc::now().naive_utc();
        sqlx::query(
            "UPDATE index_builds SET status = ?, completed_date = ?, error_message = ? WHERE id = ?",
        )
        .bind(BuildStatus::Failed)
        .bind(now)
        .bind(error_message)
        .bind(id)
        .execute(pool)
        .await
        .context("Failed to mark index build failed")?;

        Ok(())
    }

    /// Most recently started build, whatever its status
    #[inline]
    pub async fn latest(pool: &SqlitePool) -> Result<Option<IndexBuild>> {
        sqlx::query_as::<_, IndexBuild>("SELECT * FROM index_builds ORDER BY id DESC LIMIT 1")
            .fetch_optional(pool)
            .await
            .context("Failed to get latest index build")
    }
}
