//! CLI `doctor` command: check every artifact and print a health report.

use anyhow::Result;
use std::path::Path;

use crate::catalog::{Catalog, MediaType};
use crate::config::AppConfig;
use crate::index::ReferenceTable;
use crate::mood::MoodClassifier;

/// Inspect configured artifacts without loading the embedding model.
pub fn doctor(config: &AppConfig) -> Result<()> {
    println!("mediarec Health Report");
    println!("======================");
    println!();

    println!("Catalogs:");
    let columns = [
        (MediaType::Game, config.data.games_path(), &config.data.game_title_column),
        (MediaType::Book, config.data.books_path(), &config.data.book_title_column),
        (MediaType::Movie, config.data.movies_path(), &config.data.movie_title_column),
    ];
    let mut catalogs = Vec::new();
    for (media_type, path, column) in &columns {
        print_file(media_type.as_str(), path);
        match Catalog::load(*media_type, path, column) {
            Ok(catalog) => {
                println!("    rows: {} (column {column:?})", catalog.len());
                catalogs.push(catalog);
            }
            Err(e) if path.exists() => println!("    ERROR: {e}"),
            Err(_) => {}
        }
    }
    println!();

    println!("Reference table:");
    let index_path = config.data.reference_index_path();
    let vectors_path = config.data.reference_vectors_path();
    print_file("index", &index_path);
    print_file("vectors", &vectors_path);
    match ReferenceTable::load(&index_path, &vectors_path) {
        Ok(table) => {
            println!("    rows: {}  dimensions: {}", table.len(), table.dimensions());
            for (media_type, count) in table.counts() {
                println!("    {media_type:<9} {count}");
            }
            if table.dimensions() != config.embedding.dimensions {
                println!(
                    "    WARNING: configured embedding dimension is {}. Run `mediarec index build`.",
                    config.embedding.dimensions
                );
            }
            if table.len() < config.retrieval.k {
                println!(
                    "    WARNING: fewer rows than k = {}",
                    config.retrieval.k
                );
            }
            if let [games, books, movies] = catalogs.as_slice() {
                let catalogs = crate::catalog::Catalogs::new(
                    games.clone(),
                    books.clone(),
                    movies.clone(),
                );
                match table.validate_against(&catalogs) {
                    Ok(()) => println!("    Catalog links:   OK"),
                    Err(e) => println!("    Catalog links:   FAILED ({e})"),
                }
            }
        }
        Err(e) => println!("    ERROR: {e}"),
    }
    println!();

    println!("Embedding model:");
    println!("  Configured:      {} ({} dims)", config.embedding.model, config.embedding.dimensions);
    let cache_dir = crate::config::expand_tilde(&config.embedding.cache_dir);
    print_file("model.onnx", &cache_dir.join("model.onnx"));
    print_file("tokenizer.json", &cache_dir.join("tokenizer.json"));
    if config.embedding.has_dense_head() {
        let dense_dir = cache_dir.join(crate::embedding::local::DENSE_DIR);
        print_file("2_Dense config", &dense_dir.join(crate::embedding::dense::CONFIG_FILE));
        print_file("2_Dense weights", &dense_dir.join(crate::embedding::dense::WEIGHTS_FILE));
    }
    println!();

    println!("Mood model:");
    let mood_path = config.resolved_classifier_path();
    print_file("model", &mood_path);
    if mood_path.exists() {
        match MoodClassifier::load(&mood_path) {
            Ok(classifier) => println!("    labels: {}", classifier.labels().join(", ")),
            Err(e) => println!("    ERROR: {e}"),
        }
    }
    println!();

    match crate::db::vec_version() {
        Ok(version) => println!("sqlite-vec:        {version}"),
        Err(e) => println!("sqlite-vec:        unavailable ({e})"),
    }

    Ok(())
}

fn print_file(label: &str, path: &Path) {
    match std::fs::metadata(path) {
        Ok(meta) => {
            let modified = meta
                .modified()
                .map(|t| {
                    chrono::DateTime::<chrono::Local>::from(t)
                        .format("%Y-%m-%d %H:%M")
                        .to_string()
                })
                .unwrap_or_else(|_| "unknown".into());
            println!(
                "  {label:<16} {} ({}, modified {modified})",
                path.display(),
                format_bytes(meta.len())
            );
        }
        Err(_) => println!("  {label:<16} {} (missing)", path.display()),
    }
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{bytes} B")
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bytes_are_humanized() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(3 * 1024 * 1024), "3.0 MB");
    }
}
