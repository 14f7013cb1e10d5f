//! DDL for the reference vector table.
//!
//! `reference_vec` is a sqlite-vec `vec0` table whose rowid is the 1-based
//! position of the row in the reference table.

use rusqlite::Connection;

use crate::index::knn::DistanceMetric;

/// vec0 DDL for the given width and metric.
pub fn vec_table_sql(dimensions: usize, metric: DistanceMetric) -> String {
    let metric_clause = match metric {
        DistanceMetric::L2 => String::new(),
        DistanceMetric::Cosine => " distance_metric=cosine".to_string(),
    };
    format!(
        "CREATE VIRTUAL TABLE IF NOT EXISTS reference_vec USING vec0(\n    \
         embedding FLOAT[{dimensions}]{metric_clause}\n);"
    )
}

/// Create the vector table. Idempotent (uses IF NOT EXISTS).
pub fn init_schema(
    conn: &Connection,
    dimensions: usize,
    metric: DistanceMetric,
) -> rusqlite::Result<()> {
    conn.execute_batch(&vec_table_sql(dimensions, metric))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ddl_carries_width_and_metric() {
        let l2 = vec_table_sql(512, DistanceMetric::L2);
        assert!(l2.contains("FLOAT[512]"));
        assert!(!l2.contains("distance_metric"));

        let cosine = vec_table_sql(3, DistanceMetric::Cosine);
        assert!(cosine.contains("FLOAT[3] distance_metric=cosine"));
    }

    #[test]
    fn schema_is_idempotent() {
        crate::db::load_sqlite_vec();
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn, 4, DistanceMetric::L2).unwrap();
        init_schema(&conn, 4, DistanceMetric::L2).unwrap();

        let version: String = conn
            .query_row("SELECT vec_version()", [], |r| r.get(0))
            .unwrap();
        assert!(!version.is_empty());
    }
}
