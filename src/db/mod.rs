pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use sqlite_vec::sqlite3_vec_init;
use std::sync::Once;

use crate::index::knn::DistanceMetric;

static SQLITE_VEC_INIT: Once = Once::new();

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Open an in-memory database holding an empty `reference_vec` table sized
/// for `dimensions`-wide vectors.
pub fn open_vector_store(dimensions: usize, metric: DistanceMetric) -> Result<Connection> {
    load_sqlite_vec();
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    schema::init_schema(&conn, dimensions, metric).context("failed to initialize schema")?;
    tracing::debug!(dimensions, metric = %metric, "vector store initialized");
    Ok(conn)
}

/// Version string reported by the loaded sqlite-vec extension.
pub fn vec_version() -> Result<String> {
    load_sqlite_vec();
    let conn = Connection::open_in_memory()?;
    let version = conn.query_row("SELECT vec_version()", [], |r| r.get(0))?;
    Ok(version)
}

/// Convert an f32 embedding slice to raw bytes for sqlite-vec.
pub fn embedding_to_bytes(embedding: &[f32]) -> &[u8] {
    unsafe {
        std::slice::from_raw_parts(
            embedding.as_ptr() as *const u8,
            embedding.len() * std::mem::size_of::<f32>(),
        )
    }
}
