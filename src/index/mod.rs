//! Reference embedding table.
//!
//! Two parallel, position-keyed arrays: per-row metadata ([`IndexEntry`],
//! read from the `index`/`tipo` CSV) and the vectors themselves (an
//! `N x D` matrix read from a headerless CSV). Both are loaded once and never
//! mutated.

pub mod build;
pub mod knn;

use ndarray::{Array2, ArrayView1};
use serde::Deserialize;
use std::path::Path;

use crate::catalog::{Catalogs, MediaType};
use crate::error::{RecommendError, Result};

/// Where a reference row points: row `source_index` of the `media_type` catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    pub source_index: usize,
    pub media_type: MediaType,
}

#[derive(Debug, Deserialize)]
struct IndexRow {
    index: usize,
    tipo: String,
}

#[derive(Debug, Clone)]
pub struct ReferenceTable {
    entries: Vec<IndexEntry>,
    vectors: Array2<f32>,
}

impl ReferenceTable {
    /// Pair metadata with vectors. Both must have the same number of rows.
    pub fn new(entries: Vec<IndexEntry>, vectors: Array2<f32>) -> Result<Self> {
        if entries.len() != vectors.nrows() {
            return Err(RecommendError::artifact(
                "reference table",
                format!(
                    "{} index rows but {} vectors",
                    entries.len(),
                    vectors.nrows()
                ),
            ));
        }
        Ok(Self { entries, vectors })
    }

    /// Load the `index`/`tipo` table and the matching vectors file.
    pub fn load(index_path: &Path, vectors_path: &Path) -> Result<Self> {
        let entries = read_entries(index_path)?;
        let vectors = read_vectors(vectors_path)?;
        let table = Self::new(entries, vectors)?;
        tracing::info!(
            rows = table.len(),
            dimensions = table.dimensions(),
            "reference table loaded"
        );
        Ok(table)
    }

    /// Check every row points at an existing catalog entry with a non-blank title.
    pub fn validate_against(&self, catalogs: &Catalogs) -> Result<()> {
        for (row, entry) in self.entries.iter().enumerate() {
            let catalog = catalogs.catalog(entry.media_type);
            match catalog.get(entry.source_index) {
                None => {
                    return Err(RecommendError::artifact(
                        "reference table",
                        format!(
                            "row {row} points at {} row {} but the catalog has {} rows",
                            entry.media_type,
                            entry.source_index,
                            catalog.len()
                        ),
                    ));
                }
                Some(title) if title.trim().is_empty() => {
                    return Err(RecommendError::artifact(
                        "reference table",
                        format!(
                            "row {row} points at blank {} title {}; rebuild with `mediarec index build`",
                            entry.media_type, entry.source_index
                        ),
                    ));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Write both files, overwriting any previous contents.
    pub fn write(&self, index_path: &Path, vectors_path: &Path) -> anyhow::Result<()> {
        use anyhow::Context;

        for path in [index_path, vectors_path] {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create directory {}", parent.display()))?;
            }
        }

        let mut index = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_path(index_path)
            .with_context(|| format!("failed to create {}", index_path.display()))?;
        index.write_record(["index", "tipo"])?;
        for entry in &self.entries {
            index.write_record([entry.source_index.to_string(), entry.media_type.to_string()])?;
        }
        index.flush()?;

        let mut vectors = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_path(vectors_path)
            .with_context(|| format!("failed to create {}", vectors_path.display()))?;
        for row in self.vectors.rows() {
            vectors.write_record(row.iter().map(|v| v.to_string()))?;
        }
        vectors.flush()?;

        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn dimensions(&self) -> usize {
        self.vectors.ncols()
    }

    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    pub fn entry(&self, row: usize) -> Option<IndexEntry> {
        self.entries.get(row).copied()
    }

    pub fn vector(&self, row: usize) -> ArrayView1<'_, f32> {
        self.vectors.row(row)
    }

    /// Row counts per media type, in [`MediaType::ALL`] order.
    pub fn counts(&self) -> [(MediaType, usize); 3] {
        MediaType::ALL.map(|media_type| {
            let count = self
                .entries
                .iter()
                .filter(|e| e.media_type == media_type)
                .count();
            (media_type, count)
        })
    }
}

fn read_entries(path: &Path) -> Result<Vec<IndexEntry>> {
    let artifact = format!("reference index {}", path.display());
    let mut reader =
        csv::Reader::from_path(path).map_err(|e| RecommendError::artifact(&artifact, e))?;

    let mut entries = Vec::new();
    for row in reader.deserialize::<IndexRow>() {
        let row = row.map_err(|e| RecommendError::artifact(&artifact, e))?;
        entries.push(IndexEntry {
            source_index: row.index,
            media_type: row.tipo.parse()?,
        });
    }
    Ok(entries)
}

fn read_vectors(path: &Path) -> Result<Array2<f32>> {
    let artifact = format!("reference vectors {}", path.display());
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .map_err(|e| RecommendError::artifact(&artifact, e))?;

    let mut flat = Vec::new();
    let mut rows = 0usize;
    let mut width = None;
    for record in reader.records() {
        let record = record.map_err(|e| RecommendError::artifact(&artifact, e))?;
        match width {
            None => width = Some(record.len()),
            Some(w) if w != record.len() => {
                return Err(RecommendError::artifact(
                    &artifact,
                    format!("row {rows} has {} values, expected {w}", record.len()),
                ));
            }
            Some(_) => {}
        }
        for field in record.iter() {
            let value: f32 = field.trim().parse().map_err(|e| {
                RecommendError::artifact(&artifact, format!("row {rows}: {field:?}: {e}"))
            })?;
            flat.push(value);
        }
        rows += 1;
    }

    Array2::from_shape_vec((rows, width.unwrap_or(0)), flat)
        .map_err(|e| RecommendError::artifact(&artifact, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use ndarray::array;

    fn entry(source_index: usize, media_type: MediaType) -> IndexEntry {
        IndexEntry {
            source_index,
            media_type,
        }
    }

    #[test]
    fn new_rejects_length_mismatch() {
        let err = ReferenceTable::new(
            vec![entry(0, MediaType::Game)],
            array![[0.0, 1.0], [1.0, 0.0]],
        )
        .unwrap_err();
        assert!(err.to_string().contains("1 index rows but 2 vectors"));
    }

    #[test]
    fn validate_against_catches_dangling_rows() {
        let catalogs = Catalogs::new(
            Catalog::new(MediaType::Game, vec!["Catan".into()]),
            Catalog::new(MediaType::Book, vec![]),
            Catalog::new(MediaType::Movie, vec!["Alien".into()]),
        );
        let ok = ReferenceTable::new(
            vec![entry(0, MediaType::Game), entry(0, MediaType::Movie)],
            array![[0.0], [1.0]],
        )
        .unwrap();
        ok.validate_against(&catalogs).unwrap();

        let dangling =
            ReferenceTable::new(vec![entry(0, MediaType::Book)], array![[0.0]]).unwrap();
        let err = dangling.validate_against(&catalogs).unwrap_err();
        assert!(err.to_string().contains("libro row 0"));
    }

    #[test]
    fn validate_against_rejects_blank_titles() {
        let catalogs = Catalogs::new(
            Catalog::new(MediaType::Game, vec!["Catan".into()]),
            Catalog::new(MediaType::Book, vec!["  ".into(), "Emma".into()]),
            Catalog::new(MediaType::Movie, vec![]),
        );
        let table = ReferenceTable::new(
            vec![entry(0, MediaType::Game), entry(0, MediaType::Book)],
            array![[0.0], [1.0]],
        )
        .unwrap();
        let err = table.validate_against(&catalogs).unwrap_err();
        assert!(matches!(err, RecommendError::ArtifactLoad { .. }));
        assert!(err.to_string().contains("blank libro title 0"), "got {err}");
    }

    #[test]
    fn write_then_load_preserves_rows() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index_path = tmp.path().join("idx.csv");
        let vectors_path = tmp.path().join("vec.csv");

        let table = ReferenceTable::new(
            vec![entry(3, MediaType::Book), entry(0, MediaType::Movie)],
            array![[0.5, -1.25], [2.0, 0.0]],
        )
        .unwrap();
        table.write(&index_path, &vectors_path).unwrap();

        let header = std::fs::read_to_string(&index_path).unwrap();
        assert!(header.starts_with("index,tipo\n3,libro\n"));

        let loaded = ReferenceTable::load(&index_path, &vectors_path).unwrap();
        assert_eq!(loaded.entries(), table.entries());
        assert_eq!(loaded.dimensions(), 2);
        assert_eq!(loaded.vector(0).to_vec(), vec![0.5, -1.25]);
    }

    #[test]
    fn load_rejects_unknown_tag() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index_path = tmp.path().join("idx.csv");
        let vectors_path = tmp.path().join("vec.csv");
        std::fs::write(&index_path, "index,tipo\n0,podcast\n").unwrap();
        std::fs::write(&vectors_path, "0.1,0.2\n").unwrap();

        let err = ReferenceTable::load(&index_path, &vectors_path).unwrap_err();
        assert!(matches!(err, RecommendError::UnresolvedCatalogEntry(_)));
    }

    #[test]
    fn load_rejects_ragged_vectors() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index_path = tmp.path().join("idx.csv");
        let vectors_path = tmp.path().join("vec.csv");
        std::fs::write(&index_path, "index,tipo\n0,juego\n1,juego\n").unwrap();
        std::fs::write(&vectors_path, "0.1,0.2\n0.3\n").unwrap();

        let err = ReferenceTable::load(&index_path, &vectors_path).unwrap_err();
        assert!(matches!(err, RecommendError::ArtifactLoad { .. }));
    }

    #[test]
    fn extra_index_columns_are_ignored() {
        let tmp = tempfile::TempDir::new().unwrap();
        let index_path = tmp.path().join("idx.csv");
        let vectors_path = tmp.path().join("vec.csv");
        std::fs::write(&index_path, ",index,tipo,texto\n0,4,pelicula,Alien\n").unwrap();
        std::fs::write(&vectors_path, "1,2,3\n").unwrap();

        let table = ReferenceTable::load(&index_path, &vectors_path).unwrap();
        assert_eq!(table.entry(0), Some(entry(4, MediaType::Movie)));
        assert_eq!(table.counts()[2], (MediaType::Movie, 1));
    }
}
