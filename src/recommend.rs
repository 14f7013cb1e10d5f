//! Query → recommendation pipeline.
//!
//! [`Recommender`] is the explicit context built once at startup: embedding
//! provider, catalogs, reference table and neighbor index. A request composes
//! the query text, embeds it, takes the `k` nearest reference rows and
//! resolves each to a catalog title, keeping retrieval order.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};

use crate::catalog::{Catalogs, MediaType};
use crate::config::{AppConfig, RetrievalConfig};
use crate::embedding::{self, EmbeddingProvider};
use crate::error::{RecommendError, Result};
use crate::index::knn::NeighborIndex;
use crate::index::ReferenceTable;

/// How `(mood, phrase)` becomes the text that gets embedded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryStyle {
    /// `('<phrase>', {'<mood>'})`: the string the deployed demo produced,
    /// a stringified tuple holding the phrase and a one-element set.
    #[default]
    Tuple,
    /// `<mood> <phrase>`
    Plain,
}

/// Build the query text for `mood` and `phrase`. Neither input is validated.
pub fn compose_query(mood: &str, phrase: &str, style: QueryStyle) -> String {
    match style {
        QueryStyle::Tuple => format!("({}, {{{}}})", quote_literal(phrase), quote_literal(mood)),
        QueryStyle::Plain => format!("{mood} {phrase}"),
    }
}

/// Characters written as escapes: controls, format, private-use and
/// unassigned code points, and every separator except the ASCII space.
static NON_PRINTABLE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[\p{Cc}\p{Cf}\p{Co}\p{Cn}\p{Zl}\p{Zp}\p{Zs}&&[^ ]]")
        .expect("non-printable class")
});

/// Quote `s` as a string literal. Double quotes when `s` has a `'` and no `"`,
/// single quotes otherwise. Backslash, the chosen quote and non-printable
/// characters are escaped.
fn quote_literal(s: &str) -> String {
    let quote = if s.contains('\'') && !s.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(s.len() + 2);
    out.push(quote);
    let mut buf = [0u8; 4];
    for ch in s.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if NON_PRINTABLE.is_match(c.encode_utf8(&mut buf)) => {
                let code = c as u32;
                let escaped = if code <= 0xff {
                    format!("\\x{code:02x}")
                } else if code <= 0xffff {
                    format!("\\u{code:04x}")
                } else {
                    format!("\\U{code:08x}")
                };
                out.push_str(&escaped);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// One ranked recommendation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub title: String,
    pub distance: f64,
    pub media_type: MediaType,
}

pub struct Recommender {
    embedding: Arc<dyn EmbeddingProvider>,
    catalogs: Catalogs,
    table: ReferenceTable,
    index: NeighborIndex,
    query_style: QueryStyle,
}

impl Recommender {
    /// Assemble the context from already-loaded parts.
    ///
    /// Checks that every reference row resolves, and that the provider's
    /// output width matches the table.
    pub fn new(
        embedding: Arc<dyn EmbeddingProvider>,
        catalogs: Catalogs,
        table: ReferenceTable,
        retrieval: &RetrievalConfig,
    ) -> Result<Self> {
        table.validate_against(&catalogs)?;
        if embedding.dimensions() != table.dimensions() {
            return Err(RecommendError::DimensionMismatch {
                expected: table.dimensions(),
                actual: embedding.dimensions(),
            });
        }
        let index = NeighborIndex::new(&table, retrieval.k, retrieval.metric)?;
        Ok(Self {
            embedding,
            catalogs,
            table,
            index,
            query_style: retrieval.query_style,
        })
    }

    /// Load catalogs and the reference table from the configured paths.
    pub fn load(config: &AppConfig, embedding: Arc<dyn EmbeddingProvider>) -> Result<Self> {
        let catalogs = Catalogs::load(&config.data)?;
        let table = ReferenceTable::load(
            &config.data.reference_index_path(),
            &config.data.reference_vectors_path(),
        )?;
        Self::new(embedding, catalogs, table, &config.retrieval)
    }

    pub fn catalogs(&self) -> &Catalogs {
        &self.catalogs
    }

    pub fn table(&self) -> &ReferenceTable {
        &self.table
    }

    pub fn query_style(&self) -> QueryStyle {
        self.query_style
    }

    /// Recommend for a mood and a free-text phrase.
    pub fn recommend(&self, mood: &str, phrase: &str) -> Result<Vec<Recommendation>> {
        let query = compose_query(mood, phrase, self.query_style);
        self.recommend_text(&query)
    }

    /// Recommend for an already-composed query string.
    pub fn recommend_text(&self, query: &str) -> Result<Vec<Recommendation>> {
        let encoding =
            embedding::embed_query(self.embedding.as_ref(), query).map_err(RecommendError::Embedding)?;
        let row = encoding.row(0).to_vec();
        let neighbors = self.index.neighbors(&row)?;

        let mut recommendations = Vec::with_capacity(neighbors.len());
        for (rank, neighbor) in neighbors.iter().enumerate() {
            let entry = self.table.entry(neighbor.row).ok_or_else(|| {
                RecommendError::UnresolvedCatalogEntry(format!(
                    "search returned row {} outside the reference table",
                    neighbor.row
                ))
            })?;
            let title = self.catalogs.resolve(entry.media_type, entry.source_index)?;
            tracing::debug!(
                rank = rank + 1,
                title,
                distance = neighbor.distance,
                media_type = %entry.media_type,
                "neighbor"
            );
            recommendations.push(Recommendation {
                title: title.to_string(),
                distance: neighbor.distance,
                media_type: entry.media_type,
            });
        }

        tracing::info!(
            query_len = query.len(),
            results = recommendations.len(),
            "recommendations ready"
        );
        Ok(recommendations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuple_style_wraps_phrase_and_mood() {
        assert_eq!(
            compose_query("feliz", "quiero reir", QueryStyle::Tuple),
            "('quiero reir', {'feliz'})"
        );
    }

    #[test]
    fn tuple_style_quotes_like_repr() {
        assert_eq!(
            compose_query("", "", QueryStyle::Tuple),
            "('', {''})"
        );
        assert_eq!(
            compose_query("sad", "it's late", QueryStyle::Tuple),
            "(\"it's late\", {'sad'})"
        );
        assert_eq!(
            compose_query("a\"b", "c'd\"e", QueryStyle::Tuple),
            "('c\\'d\"e', {'a\"b'})"
        );
        assert_eq!(
            compose_query("x", "line\nbreak\\", QueryStyle::Tuple),
            "('line\\nbreak\\\\', {'x'})"
        );
    }

    #[test]
    fn tuple_style_escapes_non_printable_characters() {
        assert_eq!(
            compose_query("feliz\u{2028}", "triste\u{a0}hoy", QueryStyle::Tuple),
            "('triste\\xa0hoy', {'feliz\\u2028'})"
        );
        assert_eq!(
            compose_query("\u{85}\u{7f}", "a\u{200b}b\u{e0001}", QueryStyle::Tuple),
            "('a\\u200bb\\U000e0001', {'\\x85\\x7f'})"
        );
        assert_eq!(
            compose_query("\u{1b}", "\u{3000}\u{e000}\u{378}", QueryStyle::Tuple),
            "('\\u3000\\ue000\\u0378', {'\\x1b'})"
        );
    }

    #[test]
    fn tuple_style_keeps_printable_unicode() {
        assert_eq!(
            compose_query("añoranza 🎲", "canción de otoño", QueryStyle::Tuple),
            "('canción de otoño', {'añoranza 🎲'})"
        );
    }

    #[test]
    fn plain_style_joins_with_space() {
        assert_eq!(
            compose_query("tranquilo", "una tarde de lluvia", QueryStyle::Plain),
            "tranquilo una tarde de lluvia"
        );
    }

    #[test]
    fn query_style_parses_from_config_names() {
        #[derive(Deserialize)]
        struct Holder {
            style: QueryStyle,
        }
        let holder: Holder = toml::from_str("style = \"plain\"").unwrap();
        assert_eq!(holder.style, QueryStyle::Plain);
    }
}
