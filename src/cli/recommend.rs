use anyhow::{Context, Result};
use std::io::{BufRead, Write};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::recommend::{Recommendation, Recommender};

/// Run one recommendation from the terminal.
///
/// Missing inputs are read from stdin. Rows print as title, media type and
/// distance rounded to two decimals.
pub async fn recommend(
    config: &AppConfig,
    mood: Option<String>,
    phrase: Option<String>,
    json: bool,
) -> Result<()> {
    let mood = match mood {
        Some(m) => m,
        None => prompt("Estado de ánimo: ")?,
    };
    let phrase = match phrase {
        Some(p) => p,
        None => prompt("Ingrese frase: ")?,
    };

    let provider = crate::embedding::create_provider(&config.embedding)?;
    let embedding_provider: Arc<dyn crate::embedding::EmbeddingProvider> = Arc::from(provider);

    let recommender = Recommender::load(config, embedding_provider)
        .context("failed to load recommender artifacts")?;

    let recommendations =
        tokio::task::spawn_blocking(move || recommender.recommend(&mood, &phrase)).await??;

    if json {
        println!("{}", serde_json::to_string_pretty(&recommendations)?);
    } else {
        print!("{}", render_table(&recommendations));
    }
    Ok(())
}

fn prompt(label: &str) -> Result<String> {
    let mut stdout = std::io::stdout();
    write!(stdout, "{label}")?;
    stdout.flush()?;

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Plain-text rows: title, media type, distance to two decimals.
pub fn render_table(recommendations: &[Recommendation]) -> String {
    let width = recommendations
        .iter()
        .map(|r| r.title.chars().count())
        .max()
        .unwrap_or(0);

    let mut out = String::new();
    for (i, r) in recommendations.iter().enumerate() {
        let pad = width - r.title.chars().count();
        out.push_str(&format!(
            "  {}. {}{}  {:<8}  {:.2}\n",
            i + 1,
            r.title,
            " ".repeat(pad),
            r.media_type.as_str(),
            r.distance
        ));
    }
    out
}
