//! LanceDB connection and housekeeping helpers.

use arrow_array::RecordBatchIterator;
use lancedb::{connect, Connection};
use std::sync::Arc;

use repodex_core::{Error, Result};

use crate::schema::build_chunk_schema;

fn unavailable(e: impl std::fmt::Display) -> Error {
    Error::BackendUnavailable {
        backend: "vector",
        message: e.to_string(),
    }
}

pub async fn open_db(uri: &str) -> Result<Connection> {
    connect(uri).execute().await.map_err(unavailable)
}

/// Create the chunk table with an empty batch if it does not exist yet.
pub async fn ensure_chunk_table(conn: &Connection, name: &str, dim: i32) -> Result<()> {
    let names = conn.table_names().execute().await.map_err(unavailable)?;
    if names.contains(&name.to_string()) {
        return Ok(());
    }
    let schema: Arc<arrow_schema::Schema> = build_chunk_schema(dim);
    let iter = RecordBatchIterator::new(vec![].into_iter(), schema);
    conn.create_table(name, Box::new(iter))
        .execute()
        .await
        .map_err(unavailable)?;
    Ok(())
}
