//! CLI `index build` command: embed every catalog title into the reference table.

use anyhow::{Context, Result};
use indicatif::ProgressBar;
use std::sync::Arc;

use crate::catalog::Catalogs;
use crate::config::AppConfig;
use crate::embedding;
use crate::index::build;

/// Rebuild the reference index and vectors files from the catalogs.
pub async fn build(config: &AppConfig) -> Result<()> {
    let catalogs = Catalogs::load(&config.data).context("failed to load catalogs")?;

    let provider: Arc<dyn embedding::EmbeddingProvider> = Arc::from(
        embedding::create_provider(&config.embedding)
            .context("failed to create embedding provider")?,
    );

    let total = build::collect_rows(&catalogs).len();
    if total == 0 {
        println!("Catalogs are empty, nothing to index.");
        return Ok(());
    }

    println!(
        "Embedding {total} titles with model '{}'...",
        config.embedding.model
    );

    let pb = ProgressBar::new(total as u64);
    pb.set_style(super::bar_style("  {bar:40.cyan/blue} {pos}/{len} ({eta})"));

    let progress = pb.clone();
    let table = tokio::task::spawn_blocking(move || {
        build::build_reference_table(&catalogs, provider.as_ref(), |n| progress.inc(n as u64))
    })
    .await??;

    pb.finish_and_clear();

    let index_path = config.data.reference_index_path();
    let vectors_path = config.data.reference_vectors_path();
    table.write(&index_path, &vectors_path)?;

    for (media_type, count) in table.counts() {
        println!("  {media_type:<9} {count}");
    }
    println!("Index written to {}", index_path.display());
    println!("Vectors written to {}", vectors_path.display());
    Ok(())
}
