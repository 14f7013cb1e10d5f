#![allow(dead_code)]

use mediarec::catalog::{Catalog, Catalogs, MediaType};
use mediarec::config::AppConfig;
use mediarec::embedding::EmbeddingProvider;
use std::path::Path;
use tempfile::TempDir;

/// Words counted by [`KeywordProvider`], one dimension each.
pub const KEYWORDS: [&str; 4] = ["feliz", "triste", "miedo", "aventura"];

/// Deterministic embedding: one dimension per keyword occurrence plus a
/// constant bias dimension, so no text maps to the zero vector.
pub struct KeywordProvider;

impl EmbeddingProvider for KeywordProvider {
    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = KEYWORDS
            .iter()
            .map(|k| lower.matches(k).count() as f32)
            .collect();
        v.push(1.0);
        Ok(v)
    }

    fn dimensions(&self) -> usize {
        KEYWORDS.len() + 1
    }
}

/// Provider that declares a width the fixture table does not have.
pub struct WideProvider;

impl EmbeddingProvider for WideProvider {
    fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        Ok(vec![0.5; 16])
    }

    fn dimensions(&self) -> usize {
        16
    }
}

pub const GAMES: [&str; 3] = ["Aventura feliz", "Miedo en la mansion", "Catan"];
pub const BOOKS: [&str; 3] = ["Cuento triste", "Aventura en el mar", "Diario feliz"];
pub const MOVIES: [&str; 3] = ["Feliz navidad", "Terror: miedo total", "Aventura triste"];

pub fn fixture_catalogs() -> Catalogs {
    let owned = |titles: &[&str]| titles.iter().map(|t| t.to_string()).collect();
    Catalogs::new(
        Catalog::new(MediaType::Game, owned(&GAMES)),
        Catalog::new(MediaType::Book, owned(&BOOKS)),
        Catalog::new(MediaType::Movie, owned(&MOVIES)),
    )
}

fn write_catalog(path: &Path, column: &str, extra: &str, titles: &[&str]) {
    let mut body = format!("{column},{extra}\n");
    for (i, title) in titles.iter().enumerate() {
        body.push_str(&format!("{title},{i}\n"));
    }
    std::fs::write(path, body).unwrap();
}

/// Write the three catalog CSVs into `dir` under the default file names and
/// return a config pointing at them.
pub fn fixture_data_dir(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.data.dir = dir.path().to_string_lossy().into_owned();
    config.classifier.model_path = dir
        .path()
        .join("mood.json")
        .to_string_lossy()
        .into_owned();

    write_catalog(&config.data.games_path(), "game_name", "rank", &GAMES);
    write_catalog(&config.data.books_path(), "Titulo Principal", "N° Ref", &BOOKS);
    write_catalog(&config.data.movies_path(), "Title", "Year", &MOVIES);
    config
}
