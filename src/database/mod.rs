// Dual store: SQLite docstore for chunk text and builds, LanceDB for vectors

pub mod lancedb;
pub mod sqlite;

pub use self::lancedb::{SearchHit, VectorRecord, VectorStore};
pub use sqlite::*;
