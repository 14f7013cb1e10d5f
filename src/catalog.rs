//! Media catalogs and title resolution.
//!
//! Each reference-table row points into one of three flat catalogs. The
//! catalog is chosen by [`MediaType`], a closed set parsed from the wire tags
//! `juego`, `libro` and `pelicula`; anything else is rejected at the boundary.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::DataConfig;
use crate::error::{RecommendError, Result};

/// The three media kinds a recommendation can point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum MediaType {
    Game,
    Book,
    Movie,
}

impl MediaType {
    pub const ALL: [MediaType; 3] = [MediaType::Game, MediaType::Book, MediaType::Movie];

    /// Tag stored in the reference index's `tipo` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Game => "juego",
            Self::Book => "libro",
            Self::Movie => "pelicula",
        }
    }
}

impl std::fmt::Display for MediaType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

impl std::str::FromStr for MediaType {
    type Err = RecommendError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "juego" => Ok(Self::Game),
            "libro" => Ok(Self::Book),
            "pelicula" => Ok(Self::Movie),
            _ => Err(RecommendError::UnresolvedCatalogEntry(format!(
                "unknown media type tag: {s:?}"
            ))),
        }
    }
}

impl TryFrom<String> for MediaType {
    type Error = RecommendError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<MediaType> for String {
    fn from(value: MediaType) -> Self {
        value.as_str().to_string()
    }
}

/// Display titles of one catalog, in file row order.
#[derive(Debug, Clone)]
pub struct Catalog {
    media_type: MediaType,
    titles: Vec<String>,
}

impl Catalog {
    pub fn new(media_type: MediaType, titles: Vec<String>) -> Self {
        Self { media_type, titles }
    }

    /// Read `column` from a headered CSV file.
    pub fn load(media_type: MediaType, path: &Path, column: &str) -> Result<Self> {
        let artifact = format!("{media_type} catalog {}", path.display());
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| RecommendError::artifact(&artifact, e))?;

        let headers = reader
            .headers()
            .map_err(|e| RecommendError::artifact(&artifact, e))?
            .clone();
        let position = headers.iter().position(|h| h == column).ok_or_else(|| {
            RecommendError::artifact(
                &artifact,
                format!(
                    "missing column {column:?}; available: {:?}",
                    headers.iter().collect::<Vec<_>>()
                ),
            )
        })?;

        let mut titles = Vec::new();
        for record in reader.records() {
            let record = record.map_err(|e| RecommendError::artifact(&artifact, e))?;
            titles.push(record.get(position).unwrap_or_default().to_string());
        }

        tracing::info!(
            media_type = %media_type,
            rows = titles.len(),
            path = %path.display(),
            "catalog loaded"
        );
        Ok(Self::new(media_type, titles))
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }

    pub fn titles(&self) -> &[String] {
        &self.titles
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.titles.get(index).map(String::as_str)
    }
}

/// The three catalogs, one per [`MediaType`].
#[derive(Debug, Clone)]
pub struct Catalogs {
    games: Catalog,
    books: Catalog,
    movies: Catalog,
}

impl Catalogs {
    pub fn new(games: Catalog, books: Catalog, movies: Catalog) -> Self {
        Self {
            games,
            books,
            movies,
        }
    }

    pub fn load(config: &DataConfig) -> Result<Self> {
        Ok(Self::new(
            Catalog::load(MediaType::Game, &config.games_path(), &config.game_title_column)?,
            Catalog::load(MediaType::Book, &config.books_path(), &config.book_title_column)?,
            Catalog::load(MediaType::Movie, &config.movies_path(), &config.movie_title_column)?,
        ))
    }

    pub fn catalog(&self, media_type: MediaType) -> &Catalog {
        match media_type {
            MediaType::Game => &self.games,
            MediaType::Book => &self.books,
            MediaType::Movie => &self.movies,
        }
    }

    /// Display title for row `source_index` of the `media_type` catalog.
    pub fn resolve(&self, media_type: MediaType, source_index: usize) -> Result<&str> {
        let catalog = self.catalog(media_type);
        catalog.get(source_index).ok_or_else(|| {
            RecommendError::UnresolvedCatalogEntry(format!(
                "{media_type} row {source_index} out of range (catalog has {} rows)",
                catalog.len()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn catalogs() -> Catalogs {
        Catalogs::new(
            Catalog::new(MediaType::Game, vec!["Catan".into(), "Azul".into()]),
            Catalog::new(MediaType::Book, vec!["Frankenstein".into()]),
            Catalog::new(MediaType::Movie, vec!["Alien".into(), "Up".into()]),
        )
    }

    #[test]
    fn tags_round_trip() {
        for media_type in MediaType::ALL {
            assert_eq!(media_type.as_str().parse::<MediaType>().unwrap(), media_type);
        }
    }

    #[test]
    fn unknown_tag_is_a_hard_error() {
        let err = "serie".parse::<MediaType>().unwrap_err();
        assert!(matches!(err, RecommendError::UnresolvedCatalogEntry(_)));
        // tags are exact-match
        assert!("Libro".parse::<MediaType>().is_err());
    }

    #[test]
    fn resolve_dispatches_per_type() {
        let catalogs = catalogs();
        assert_eq!(catalogs.resolve(MediaType::Game, 1).unwrap(), "Azul");
        assert_eq!(catalogs.resolve(MediaType::Book, 0).unwrap(), "Frankenstein");
        assert_eq!(catalogs.resolve(MediaType::Movie, 0).unwrap(), "Alien");
    }

    #[test]
    fn resolve_out_of_range_fails() {
        let err = catalogs().resolve(MediaType::Book, 3).unwrap_err();
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn load_reads_named_column() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "Rank,Title,Genre").unwrap();
        writeln!(file, "1,Guardians of the Galaxy,\"Action,Adventure\"").unwrap();
        writeln!(file, "2,Prometheus,Sci-Fi").unwrap();

        let catalog = Catalog::load(MediaType::Movie, file.path(), "Title").unwrap();
        assert_eq!(catalog.titles(), ["Guardians of the Galaxy", "Prometheus"]);
    }

    #[test]
    fn load_missing_column_is_artifact_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name,year").unwrap();
        writeln!(file, "Catan,1995").unwrap();

        let err = Catalog::load(MediaType::Game, file.path(), "game_name").unwrap_err();
        assert!(matches!(err, RecommendError::ArtifactLoad { .. }));
        assert!(err.to_string().contains("game_name"));
    }
}
