// Cross-store consistency: every vector row has one docstore chunk and vice versa

#[cfg(test)]
mod tests;

use std::collections::HashSet;
use tracing::{debug, info, warn};

use crate::Result;
use crate::database::lancedb::VectorStore;
use crate::database::sqlite::Database;

/// Consistency check results between the docstore and the vector index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsistencyReport {
    /// Number of chunks in the docstore
    pub docstore_chunks: usize,
    /// Number of rows in the vector index
    pub vector_rows: usize,
    /// Chunk ids that exist in the docstore but not in the vector index
    pub missing_in_index: Vec<String>,
    /// Chunk ids that exist in the vector index but not in the docstore
    pub orphaned_in_index: Vec<String>,
    /// Chunk ids stored more than once in the vector index
    pub duplicated_in_index: Vec<String>,
    pub is_consistent: bool,
}

impl ConsistencyReport {
    /// Compare the chunk ids held by each store
    #[inline]
    pub fn compare(docstore_ids: &[String], index_ids: &[String]) -> Self {
        let docstore_set: HashSet<&String> = docstore_ids.iter().collect();

        let mut index_set: HashSet<&String> = HashSet::with_capacity(index_ids.len());
        let mut duplicated: Vec<String> = Vec::new();
        for id in index_ids {
            if !index_set.insert(id) && !duplicated.contains(id) {
                duplicated.push(id.clone());
            }
        }

        let mut missing_in_index: Vec<String> = docstore_set
            .difference(&index_set)
            .map(|id| (*id).clone())
            .collect();
        missing_in_index.sort();

        let mut orphaned_in_index: Vec<String> = index_set
            .difference(&docstore_set)
            .map(|id| (*id).clone())
            .collect();
        orphaned_in_index.sort();

        let is_consistent =
            missing_in_index.is_empty() && orphaned_in_index.is_empty() && duplicated.is_empty();

        Self {
            docstore_chunks: docstore_ids.len(),
            vector_rows: index_ids.len(),
            missing_in_index,
            orphaned_in_index,
            duplicated_in_index: duplicated,
            is_consistent,
        }
    }

    /// One-line description of what is wrong, if anything
    #[inline]
    pub fn summary(&self) -> String {
        if self.is_consistent {
            return format!(
                "{} chunks, {} vectors, consistent",
                self.docstore_chunks, self.vector_rows
            );
        }

        format!(
            "{} chunks, {} vectors: {} missing from vector index, {} orphaned vectors, {} duplicated vectors",
            self.docstore_chunks,
            self.vector_rows,
            self.missing_in_index.len(),
            self.orphaned_in_index.len(),
            self.duplicated_in_index.len()
        )
    }
}

/// Performs consistency validation between SQLite and LanceDB
pub struct ConsistencyValidator<'a> {
    database: &'a Database,
    vector_store: &'a VectorStore,
}

impl<'a> ConsistencyValidator<'a> {
    #[inline]
    pub fn new(database: &'a Database, vector_store: &'a VectorStore) -> Self {
        Self {
            database,
            vector_store,
        }
    }

    #[inline]
    pub async fn validate_consistency(&self) -> Result<ConsistencyReport> {
        info!("Starting cross-database consistency validation");

        let docstore_ids = self.database.list_chunk_ids().await?;
        debug!("Found {} chunks in docstore", docstore_ids.len());

        let index_ids = self.vector_store.list_chunk_ids().await?;
        debug!("Found {} rows in vector index", index_ids.len());

        let report = ConsistencyReport::compare(&docstore_ids, &index_ids);

        if report.is_consistent {
            info!("Database consistency validation passed");
        } else {
            warn!("Database consistency validation found issues: {}", report.summary());
            for id in report.missing_in_index.iter().take(10) {
                warn!("  chunk without vector: {}", id);
            }
            for id in report.orphaned_in_index.iter().take(10) {
                warn!("  vector without chunk: {}", id);
            }
        }

        Ok(report)
    }
}
