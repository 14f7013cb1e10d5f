//! Book listing scraper.
//!
//! One linear pass: fetch a single page, take the text of every `li` inside
//! every `ol`, split each entry into title/subtitle/author/reference with four
//! independent patterns, drop exact duplicate rows, and overwrite a CSV.

use anyhow::Context;
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::ScraperConfig;
use crate::error::{RecommendError, Result};

/// CSV header, in column order. `Resumen` is appended when summaries are kept.
pub const HEADERS: [&str; 4] = ["Titulo Principal", "Titulo Secundario", "Autor", "N° Ref"];
pub const SUMMARY_HEADER: &str = "Resumen";

/// One parsed listing entry. Unmatched fields are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct ScrapedBook {
    pub main_title: String,
    pub secondary_title: String,
    pub author: String,
    pub reference: String,
    /// Listing pages carry no summary; filled in by later enrichment.
    pub summary: Option<String>,
}

/// The four extraction patterns. Each runs against the whole entry text.
pub struct EntryPatterns {
    main_title: Regex,
    secondary_title: Regex,
    author: Regex,
    reference: Regex,
}

impl EntryPatterns {
    pub fn new() -> Self {
        Self {
            // everything before "; Or,", " by" or " ("
            main_title: Regex::new(r"^(.*?)(?:;?\s?Or,|\sby|\s\()").expect("main title pattern"),
            // text between "Or," and " by"
            secondary_title: Regex::new(r";?\s?Or,?\s(.*?)\sby").expect("secondary title pattern"),
            // text between "by " and " ("
            author: Regex::new(r"by\s(.*?)\s\(").expect("author pattern"),
            reference: Regex::new(r"\((\d+)\)").expect("reference pattern"),
        }
    }

    pub fn parse_entry(&self, entry: &str) -> ScrapedBook {
        ScrapedBook {
            main_title: first_group(&self.main_title, entry),
            secondary_title: first_group(&self.secondary_title, entry),
            author: first_group(&self.author, entry),
            reference: first_group(&self.reference, entry),
            summary: None,
        }
    }
}

impl Default for EntryPatterns {
    fn default() -> Self {
        Self::new()
    }
}

fn first_group(pattern: &Regex, text: &str) -> String {
    pattern
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

/// Text of every `li` under every `ol`, in document order.
pub fn extract_entries(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let lists = Selector::parse("ol").expect("ol selector");
    let items = Selector::parse("li").expect("li selector");

    let mut entries = Vec::new();
    for list in document.select(&lists) {
        for item in list.select(&items) {
            entries.push(item.text().collect::<String>());
        }
    }
    entries
}

/// Parse every non-empty entry of a listing page.
pub fn parse_listing(html: &str) -> Vec<ScrapedBook> {
    let patterns = EntryPatterns::new();
    extract_entries(html)
        .iter()
        .filter(|entry| !entry.is_empty())
        .map(|entry| patterns.parse_entry(entry))
        .collect()
}

/// Drop exact duplicate rows, keeping the first occurrence.
pub fn dedup(books: Vec<ScrapedBook>) -> Vec<ScrapedBook> {
    let mut seen = HashSet::new();
    books
        .into_iter()
        .filter(|book| seen.insert(book.clone()))
        .collect()
}

/// Overwrite `path` with the dataset. Writes a sibling `.tmp` file and renames
/// it over `path`, so a failed write leaves the previous dataset in place.
pub fn write_csv(books: &[ScrapedBook], path: &Path, include_summary: bool) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
    }

    let tmp_path = path.with_extension("tmp");
    if let Err(e) = write_records(books, &tmp_path, include_summary) {
        let _ = std::fs::remove_file(&tmp_path);
        return Err(e);
    }
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to replace {}", path.display()))?;
    Ok(())
}

fn write_records(books: &[ScrapedBook], path: &Path, include_summary: bool) -> anyhow::Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .terminator(csv::Terminator::Any(b'\n'))
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    let mut header: Vec<&str> = HEADERS.to_vec();
    if include_summary {
        header.push(SUMMARY_HEADER);
    }
    writer.write_record(&header)?;

    for book in books {
        let mut record = vec![
            book.main_title.as_str(),
            book.secondary_title.as_str(),
            book.author.as_str(),
            book.reference.as_str(),
        ];
        if include_summary {
            record.push(book.summary.as_deref().unwrap_or_default());
        }
        writer.write_record(&record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Fetch `url` once. No retry, no timeout.
///
/// Certificate verification stays on unless `accept_invalid_certs` is set.
pub async fn fetch(url: &str, accept_invalid_certs: bool) -> Result<String> {
    let network = |reason: String| RecommendError::NetworkFetch {
        url: url.to_string(),
        reason,
    };

    if accept_invalid_certs {
        tracing::warn!(url, "TLS certificate verification disabled");
    }
    let client = reqwest::Client::builder()
        .danger_accept_invalid_certs(accept_invalid_certs)
        .build()
        .map_err(|e| network(e.to_string()))?;

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| network(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(network(format!("HTTP {status}")));
    }
    response.text().await.map_err(|e| network(e.to_string()))
}

/// Counts from one scrape run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScrapeReport {
    pub entries: usize,
    pub records: usize,
    pub duplicates: usize,
    pub output: PathBuf,
}

/// Fetch → parse → dedup → persist.
pub async fn run(config: &ScraperConfig, output: &Path) -> anyhow::Result<ScrapeReport> {
    tracing::info!(url = %config.url, "fetching listing");
    let html = fetch(&config.url, config.accept_invalid_certs).await?;

    let entries = extract_entries(&html).len();
    let parsed = parse_listing(&html);
    let parsed_count = parsed.len();
    let books = dedup(parsed);
    tracing::info!(
        entries,
        parsed = parsed_count,
        records = books.len(),
        "listing parsed"
    );

    write_csv(&books, output, config.include_summary)?;
    tracing::info!(path = %output.display(), "dataset written");

    Ok(ScrapeReport {
        entries,
        records: books.len(),
        duplicates: parsed_count - books.len(),
        output: output.to_path_buf(),
    })
}
