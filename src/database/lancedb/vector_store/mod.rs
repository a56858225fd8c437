
use super::VectorRecord;
use crate::QaError;
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray, UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, Table,
    query::{ExecutableQuery, QueryBase, Select},
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub const TABLE_NAME: &str = "chunk_vectors";

/// Vector database store using LanceDB for similarity search
pub struct VectorStore {
    connection: Connection,
    table_name: String,
}

/// A vector-index row matched by a similarity search
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub chunk_id: String,
    pub source_url: String,
    pub chunk_index: u32,
    pub similarity_score: f32,
    pub distance: f32,
}

impl VectorStore {
    /// Connect to the LanceDB directory at `db_path`, creating it if needed
    #[inline]
    pub async fn connect(db_path: &Path) -> Result<Self, QaError> {
        debug!("Initializing LanceDB at path: {:?}", db_path);

        std::fs::create_dir_all(db_path).map_err(|e| {
            QaError::Database(format!("Failed to create vector database directory: {}", e))
        })?;

        let uri = db_path.to_string_lossy();
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            table_name: TABLE_NAME.to_string(),
        })
    }

    /// Connect to a previously built index; a missing directory or table is an error
    #[inline]
    pub async fn open_existing(db_path: &Path) -> Result<Self, QaError> {
        if !db_path.exists() {
            return Err(QaError::Index(format!(
                "Vector index not found at {}",
                db_path.display()
            )));
        }

        let store = Self::connect(db_path).await?;
        if !store.table_exists().await? {
            return Err(QaError::Index(format!(
                "Vector table '{}' missing in {}",
                store.table_name,
                db_path.display()
            )));
        }

        Ok(store)
    }

    #[inline]
    pub async fn table_exists(&self) -> Result<bool, QaError> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to list tables: {}", e)))?;

        Ok(table_names.contains(&self.table_name))
    }

    async fn open_table(&self) -> Result<Table, QaError> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to open table: {}", e)))
    }

    /// Create schema with the specified vector dimension
    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("chunk_id", DataType::Utf8, false),
            Field::new("source_url", DataType::Utf8, false),
            Field::new("chunk_index", DataType::UInt32, false),
        ]))
    }

    /// Replace the whole table with `records`, returning the vector dimension.
    ///
    /// All records must share one dimension.
    #[inline]
    pub async fn replace_all(&self, records: &[VectorRecord]) -> Result<usize, QaError> {
        let vector_dim = records
            .first()
            .map(VectorRecord::dimension)
            .ok_or_else(|| QaError::Index("No vectors to store".to_string()))?;

        if vector_dim == 0 {
            return Err(QaError::Index("Vectors must not be empty".to_string()));
        }
        if let Some(bad) = records.iter().find(|r| r.dimension() != vector_dim) {
            return Err(QaError::Index(format!(
                "Vector for chunk {} has dimension {}, expected {}",
                bad.chunk_id,
                bad.dimension(),
                vector_dim
            )));
        }

        self.drop_table_if_exists().await?;

        let schema = Self::create_schema(vector_dim);
        let table = self
            .connection
            .create_empty_table(&self.table_name, Arc::clone(&schema))
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to create table: {}", e)))?;

        let record_batch = Self::create_record_batch(schema, vector_dim, records)?;
        let batch_schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), batch_schema);
        table
            .add(reader)
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to insert vectors: {}", e)))?;

        info!(
            "Stored {} vectors of dimension {} in '{}'",
            records.len(),
            vector_dim,
            self.table_name
        );
        Ok(vector_dim)
    }

    fn create_record_batch(
        schema: Arc<Schema>,
        vector_dim: usize,
        records: &[VectorRecord],
    ) -> Result<RecordBatch, QaError> {
        let len = records.len();

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);
        let mut chunk_ids = Vec::with_capacity(len);
        let mut source_urls = Vec::with_capacity(len);
        let mut chunk_indices = Vec::with_capacity(len);

        for record in records {
            ids.push(record.id.as_str());
            flat_values.extend_from_slice(&record.vector);
            chunk_ids.push(record.chunk_id.as_str());
            source_urls.push(record.source_url.as_str());
            chunk_indices.push(record.chunk_index);
        }

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, true));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| QaError::Database(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(chunk_ids)),
            Arc::new(StringArray::from(source_urls)),
            Arc::new(UInt32Array::from(chunk_indices)),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| QaError::Database(format!("Failed to create record batch: {}", e)))
    }

    /// Find the `limit` rows nearest to `query_vector`, closest first
    #[inline]
    pub async fn search_similar(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> Result<Vec<SearchHit>, QaError> {
        debug!("Searching for similar vectors with limit: {}", limit);

        let table = self.open_table().await?;

        let mut results = table
            .vector_search(query_vector)
            .map_err(|e| QaError::Database(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(limit)
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to execute search: {}", e)))?;

        let mut hits = Vec::new();
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| QaError::Database(format!("Failed to read result stream: {}", e)))?
        {
            hits.extend(Self::parse_search_batch(&batch)?);
        }

        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits.truncate(limit);

        debug!("Vector search returned {} hits", hits.len());
        Ok(hits)
    }

    fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray, QaError> {
        batch
            .column_by_name(name)
            .ok_or_else(|| QaError::Database(format!("Missing {} column", name)))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| QaError::Database(format!("Invalid {} column type", name)))
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<SearchHit>, QaError> {
        let chunk_ids = Self::string_column(batch, "chunk_id")?;
        let source_urls = Self::string_column(batch, "source_url")?;

        let chunk_indices = batch
            .column_by_name("chunk_index")
            .ok_or_else(|| QaError::Database("Missing chunk_index column".to_string()))?
            .as_any()
            .downcast_ref::<UInt32Array>()
            .ok_or_else(|| QaError::Database("Invalid chunk_index column type".to_string()))?;

        let distances = batch
            .column_by_name("_distance")
            .ok_or_else(|| QaError::Database("Missing _distance column".to_string()))?
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| QaError::Database("Invalid _distance column type".to_string()))?;

        (0..batch.num_rows())
            .map(|row| {
                if distances.is_null(row) {
                    return Err(QaError::Database(format!(
                        "Missing distance for chunk {}",
                        chunk_ids.value(row)
                    )));
                }
                let distance = distances.value(row);

                Ok(SearchHit {
                    chunk_id: chunk_ids.value(row).to_string(),
                    source_url: source_urls.value(row).to_string(),
                    chunk_index: chunk_indices.value(row),
                    similarity_score: 1.0 - distance,
                    distance,
                })
            })
            .collect()
    }

    /// Number of rows in the vector table
    #[inline]
    pub async fn count(&self) -> Result<usize, QaError> {
        let table = self.open_table().await?;
        table
            .count_rows(None)
            .await
            .map_err(|e| QaError::Database(format!("Failed to count rows: {}", e)))
    }

    /// Every chunk id stored in the vector table
    #[inline]
    pub async fn list_chunk_ids(&self) -> Result<Vec<String>, QaError> {
        let table = self.open_table().await?;
        let total = table
            .count_rows(None)
            .await
            .map_err(|e| QaError::Database(format!("Failed to count rows: {}", e)))?;

        if total == 0 {
            return Ok(Vec::new());
        }

        let mut results = table
            .query()
            .select(Select::Columns(vec!["chunk_id".to_string()]))
            .limit(total)
            .execute()
            .await
            .map_err(|e| QaError::Database(format!("Failed to scan table: {}", e)))?;

        let mut chunk_ids = Vec::with_capacity(total);
        while let Some(batch) = results
            .try_next()
            .await
            .map_err(|e| QaError::Database(format!("Failed to read result stream: {}", e)))?
        {
            let column = Self::string_column(&batch, "chunk_id")?;
            chunk_ids.extend((0..column.len()).map(|row| column.value(row).to_string()));
        }

        Ok(chunk_ids)
    }

    /// Vector dimension of the stored table
    #[inline]
    pub async fn dimension(&self) -> Result<usize, QaError> {
        let table = self.open_table().await?;
        let schema = table
            .schema()
            .await
            .map_err(|e| QaError::Database(format!("Failed to get table schema: {}", e)))?;

        schema
            .fields()
            .iter()
            .find(|field| field.name() == "vector")
            .and_then(|field| match field.data_type() {
                DataType::FixedSizeList(_, size) => Some(*size as usize),
                _ => None,
            })
            .ok_or_else(|| {
                QaError::Database("Could not find vector column or determine dimension".to_string())
            })
    }

    /// Drop the vector table if it exists
    #[inline]
    pub async fn drop_table_if_exists(&self) -> Result<(), QaError> {
        if self.table_exists().await? {
            info!("Dropping existing vector table");
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| QaError::Database(format!("Failed to drop table: {}", e)))?;
        }

        Ok(())
    }
}
