use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::index::knn::DistanceMetric;
use crate::recommend::QueryStyle;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub data: DataConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub classifier: ClassifierConfig,
    pub scraper: ScraperConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

/// Locations of the catalog and reference-table artifacts.
///
/// File names are resolved against `dir` unless they are absolute.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DataConfig {
    pub dir: String,
    pub games_file: String,
    pub books_file: String,
    pub movies_file: String,
    pub reference_index_file: String,
    pub reference_vectors_file: String,
    pub game_title_column: String,
    pub book_title_column: String,
    pub movie_title_column: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub provider: String,
    pub model: String,
    pub cache_dir: String,
    pub dimensions: usize,
    pub max_seq_len: usize,
    pub normalize: bool,
    pub token_type_ids: bool,
    pub model_url: String,
    pub tokenizer_url: String,
    /// `2_Dense/config.json` of the sentence-transformers repo. Empty when the
    /// model has no projection head after pooling.
    pub dense_config_url: String,
    /// `2_Dense/model.safetensors`, paired with `dense_config_url`.
    pub dense_weights_url: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub k: usize,
    pub metric: DistanceMetric,
    pub query_style: QueryStyle,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ClassifierConfig {
    pub model_path: String,
    pub alpha: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ScraperConfig {
    pub url: String,
    /// Defaults to the books catalog path when unset.
    pub output_path: Option<String>,
    pub accept_invalid_certs: bool,
    pub include_summary: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            host: "127.0.0.1".into(),
            port: 8787,
            log_level: "info".into(),
        }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            dir: "data".into(),
            games_file: "bgg_database.csv".into(),
            books_file: "dataset_libros.csv".into(),
            movies_file: "IMDB-Movie-Data.csv".into(),
            reference_index_file: "embedings_totales.csv".into(),
            reference_vectors_file: "embedings_vectores.csv".into(),
            game_title_column: "game_name".into(),
            book_title_column: "Titulo Principal".into(),
            movie_title_column: "Title".into(),
        }
    }
}

const DEFAULT_MODEL_REPO: &str =
    "https://huggingface.co/sentence-transformers/distiluse-base-multilingual-cased/resolve/main";

impl Default for EmbeddingConfig {
    fn default() -> Self {
        let cache_dir = default_app_dir()
            .join("models")
            .to_string_lossy()
            .into_owned();
        Self {
            provider: "local".into(),
            model: "sentence-transformers/distiluse-base-multilingual-cased".into(),
            cache_dir,
            // 768-wide DistilBERT pooled output, projected by 2_Dense
            dimensions: 512,
            max_seq_len: 128,
            normalize: false,
            token_type_ids: false,
            model_url: format!("{DEFAULT_MODEL_REPO}/onnx/model.onnx"),
            tokenizer_url: format!("{DEFAULT_MODEL_REPO}/tokenizer.json"),
            dense_config_url: format!("{DEFAULT_MODEL_REPO}/2_Dense/config.json"),
            dense_weights_url: format!("{DEFAULT_MODEL_REPO}/2_Dense/model.safetensors"),
        }
    }
}

impl EmbeddingConfig {
    /// Whether a dense projection head follows pooling.
    pub fn has_dense_head(&self) -> bool {
        !self.dense_config_url.is_empty() || !self.dense_weights_url.is_empty()
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 5,
            metric: DistanceMetric::L2,
            query_style: QueryStyle::Tuple,
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            model_path: "models/modelo_estado_animo.json".into(),
            alpha: 1.0,
        }
    }
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            url: "https://www.gutenberg.org/browse/scores/top1000.php#books-last1".into(),
            output_path: None,
            accept_invalid_certs: false,
            include_summary: false,
        }
    }
}

/// Returns `~/.mediarec/`
pub fn default_app_dir() -> PathBuf {
    dirs::home_dir()
        .expect("home directory must exist")
        .join(".mediarec")
}

/// Returns the default config file path: `~/.mediarec/config.toml`
pub fn default_config_path() -> PathBuf {
    default_app_dir().join("config.toml")
}

impl AppConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            AppConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    /// (MEDIAREC_LOG_LEVEL, MEDIAREC_DATA_DIR, MEDIAREC_MODEL_DIR, MEDIAREC_SCRAPE_URL).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("MEDIAREC_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("MEDIAREC_DATA_DIR") {
            self.data.dir = val;
        }
        if let Ok(val) = std::env::var("MEDIAREC_MODEL_DIR") {
            self.embedding.cache_dir = val;
        }
        if let Ok(val) = std::env::var("MEDIAREC_SCRAPE_URL") {
            self.scraper.url = val;
        }
    }

    /// Where the scraper writes its CSV. Falls back to the books catalog so a
    /// fresh scrape feeds the next index build directly.
    pub fn resolved_scrape_output(&self) -> PathBuf {
        match &self.scraper.output_path {
            Some(path) => expand_tilde(path),
            None => self.data.books_path(),
        }
    }

    pub fn resolved_classifier_path(&self) -> PathBuf {
        expand_tilde(&self.classifier.model_path)
    }
}

impl DataConfig {
    fn resolve(&self, file: &str) -> PathBuf {
        let file_path = expand_tilde(file);
        if file_path.is_absolute() {
            file_path
        } else {
            expand_tilde(&self.dir).join(file_path)
        }
    }

    pub fn games_path(&self) -> PathBuf {
        self.resolve(&self.games_file)
    }

    pub fn books_path(&self) -> PathBuf {
        self.resolve(&self.books_file)
    }

    pub fn movies_path(&self) -> PathBuf {
        self.resolve(&self.movies_file)
    }

    pub fn reference_index_path(&self) -> PathBuf {
        self.resolve(&self.reference_index_file)
    }

    pub fn reference_vectors_path(&self) -> PathBuf {
        self.resolve(&self.reference_vectors_file)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .expect("home directory must exist")
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}
