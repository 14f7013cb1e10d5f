//! Error taxonomy for the recommendation core and the scraper.
//!
//! Command-level code wraps these in `anyhow` with extra context; nothing in
//! the library recovers from them locally.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecommendError {
    /// A startup artifact (catalog, reference table, model) is missing or malformed.
    #[error("failed to load {artifact}: {reason}")]
    ArtifactLoad { artifact: String, reason: String },

    /// The scraper's HTTP request failed or returned a non-success status.
    #[error("failed to fetch {url}: {reason}")]
    NetworkFetch { url: String, reason: String },

    /// Query vector width disagrees with the reference table.
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Unknown media-type tag, or a row index outside its catalog.
    #[error("unresolved catalog entry: {0}")]
    UnresolvedCatalogEntry(String),

    #[error("embedding failed: {0:#}")]
    Embedding(anyhow::Error),

    #[error("neighbor search failed: {0}")]
    Search(#[from] rusqlite::Error),
}

impl RecommendError {
    pub(crate) fn artifact(artifact: impl std::fmt::Display, reason: impl ToString) -> Self {
        Self::ArtifactLoad {
            artifact: artifact.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, RecommendError>;
