use anyhow::Result;
use std::path::PathBuf;

use crate::config::AppConfig;

/// Scrape the configured listing page into the books dataset.
pub async fn scrape(config: &AppConfig, url: Option<String>, output: Option<PathBuf>) -> Result<()> {
    let mut scraper_config = config.scraper.clone();
    if let Some(url) = url {
        scraper_config.url = url;
    }
    let output = output.unwrap_or_else(|| config.resolved_scrape_output());

    let report = crate::scrape::run(&scraper_config, &output).await?;

    println!("Scrape complete:");
    println!("  List entries:       {}", report.entries);
    println!("  Records written:    {}", report.records);
    println!("  Duplicates dropped: {}", report.duplicates);
    println!("  Output:             {}", report.output.display());
    Ok(())
}
