//! Exact k-nearest-neighbor search over the reference table via sqlite-vec.

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

use super::ReferenceTable;
use crate::db::{self, embedding_to_bytes};
use crate::error::{RecommendError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Euclidean distance.
    L2,
    Cosine,
}

impl std::fmt::Display for DistanceMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::L2 => "l2",
            Self::Cosine => "cosine",
        })
    }
}

/// One search hit: position in the reference table and its distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row: usize,
    pub distance: f64,
}

/// Immutable neighbor index holding a copy of every reference vector.
pub struct NeighborIndex {
    conn: Mutex<Connection>,
    k: usize,
    dimensions: usize,
    metric: DistanceMetric,
}

impl NeighborIndex {
    /// Load `table` into a fresh vector store. Fails when the table is empty
    /// or holds fewer than `k` rows.
    pub fn new(table: &ReferenceTable, k: usize, metric: DistanceMetric) -> Result<Self> {
        if table.is_empty() {
            return Err(RecommendError::artifact("reference table", "table is empty"));
        }
        if k == 0 || k > table.len() {
            return Err(RecommendError::artifact(
                "reference table",
                format!("k = {k} but the table has {} rows", table.len()),
            ));
        }

        let dimensions = table.dimensions();
        let mut conn = db::open_vector_store(dimensions, metric)
            .map_err(|e| RecommendError::artifact("vector store", format!("{e:#}")))?;

        let tx = conn.transaction()?;
        {
            let mut stmt =
                tx.prepare("INSERT INTO reference_vec (rowid, embedding) VALUES (?1, ?2)")?;
            for row in 0..table.len() {
                let vector = table.vector(row).to_vec();
                stmt.execute(params![row as i64 + 1, embedding_to_bytes(&vector)])?;
            }
        }
        tx.commit()?;

        tracing::info!(rows = table.len(), dimensions, k, metric = %metric, "neighbor index ready");

        Ok(Self {
            conn: Mutex::new(conn),
            k,
            dimensions,
            metric,
        })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    pub fn metric(&self) -> DistanceMetric {
        self.metric
    }

    /// The `k` closest reference rows to `query`, nearest first.
    pub fn neighbors(&self, query: &[f32]) -> Result<Vec<Neighbor>> {
        if query.len() != self.dimensions {
            return Err(RecommendError::DimensionMismatch {
                expected: self.dimensions,
                actual: query.len(),
            });
        }

        // The store is never written after construction, so a poisoned lock is harmless.
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());

        let mut stmt = conn.prepare_cached(
            "SELECT rowid, distance FROM reference_vec \
             WHERE embedding MATCH ?1 AND k = ?2 ORDER BY distance",
        )?;
        let neighbors = stmt
            .query_map(params![embedding_to_bytes(query), self.k as i64], |row| {
                let rowid: i64 = row.get(0)?;
                Ok(Neighbor {
                    row: (rowid - 1) as usize,
                    distance: row.get(1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(neighbors)
    }
}
