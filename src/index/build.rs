//! Offline construction of the reference table from the three catalogs.

use anyhow::{Context, Result};
use ndarray::Array2;

use super::{IndexEntry, ReferenceTable};
use crate::catalog::{Catalogs, MediaType};
use crate::embedding::EmbeddingProvider;

/// Texts embedded per provider call.
pub const BATCH_SIZE: usize = 32;

/// Every catalog row as `(entry, text to embed)`, games then books then movies.
/// Rows with a blank title are left out so they can never be recommended.
pub fn collect_rows(catalogs: &Catalogs) -> Vec<(IndexEntry, String)> {
    MediaType::ALL
        .iter()
        .flat_map(|&media_type| {
            catalogs
                .catalog(media_type)
                .titles()
                .iter()
                .enumerate()
                .filter(|(_, title)| !title.trim().is_empty())
                .map(move |(source_index, title)| {
                    (
                        IndexEntry {
                            source_index,
                            media_type,
                        },
                        title.clone(),
                    )
                })
        })
        .collect()
}

/// Embed every catalog title. `progress` is called with the number of rows
/// finished after each batch.
pub fn build_reference_table(
    catalogs: &Catalogs,
    provider: &dyn EmbeddingProvider,
    mut progress: impl FnMut(usize),
) -> Result<ReferenceTable> {
    let rows = collect_rows(catalogs);
    let dimensions = provider.dimensions();
    let mut flat = Vec::with_capacity(rows.len() * dimensions);

    for chunk in rows.chunks(BATCH_SIZE) {
        let texts: Vec<&str> = chunk.iter().map(|(_, text)| text.as_str()).collect();
        let embeddings = provider
            .embed_batch(&texts)
            .context("embedding batch failed")?;
        anyhow::ensure!(
            embeddings.len() == chunk.len(),
            "provider returned {} vectors for {} texts",
            embeddings.len(),
            chunk.len()
        );
        for embedding in embeddings {
            anyhow::ensure!(
                embedding.len() == dimensions,
                "provider returned {} dimensions, declared {dimensions}",
                embedding.len()
            );
            flat.extend(embedding);
        }
        progress(chunk.len());
    }

    let entries: Vec<IndexEntry> = rows.into_iter().map(|(entry, _)| entry).collect();
    let vectors = Array2::from_shape_vec((entries.len(), dimensions), flat)?;
    Ok(ReferenceTable::new(entries, vectors)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;

    struct LengthProvider;

    impl EmbeddingProvider for LengthProvider {
        fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![text.len() as f32, 1.0])
        }

        fn dimensions(&self) -> usize {
            2
        }
    }

    fn catalogs() -> Catalogs {
        Catalogs::new(
            Catalog::new(MediaType::Game, vec!["Go".into()]),
            Catalog::new(MediaType::Book, vec!["Emma".into(), "Ulysses".into()]),
            Catalog::new(MediaType::Movie, vec!["Jaws".into()]),
        )
    }

    #[test]
    fn rows_follow_catalog_order() {
        let rows = collect_rows(&catalogs());
        let tags: Vec<(MediaType, usize)> = rows
            .iter()
            .map(|(e, _)| (e.media_type, e.source_index))
            .collect();
        assert_eq!(
            tags,
            vec![
                (MediaType::Game, 0),
                (MediaType::Book, 0),
                (MediaType::Book, 1),
                (MediaType::Movie, 0),
            ]
        );
    }

    #[test]
    fn build_embeds_every_title() {
        let mut done = 0;
        let table = build_reference_table(&catalogs(), &LengthProvider, |n| done += n).unwrap();
        assert_eq!(done, 4);
        assert_eq!(table.len(), 4);
        assert_eq!(table.vector(2).to_vec(), vec![7.0, 1.0]);
        table.validate_against(&catalogs()).unwrap();
    }

    #[test]
    fn blank_titles_are_not_indexed() {
        let catalogs = Catalogs::new(
            Catalog::new(MediaType::Game, vec!["Go".into()]),
            Catalog::new(MediaType::Book, vec!["".into(), "Emma".into(), " ".into()]),
            Catalog::new(MediaType::Movie, vec![]),
        );
        let rows = collect_rows(&catalogs);
        let kept: Vec<(MediaType, usize)> = rows
            .iter()
            .map(|(e, _)| (e.media_type, e.source_index))
            .collect();
        assert_eq!(kept, vec![(MediaType::Game, 0), (MediaType::Book, 1)]);

        let table = build_reference_table(&catalogs, &LengthProvider, |_| {}).unwrap();
        assert_eq!(table.len(), 2);
        table.validate_against(&catalogs).unwrap();
    }
}
