mod config;
mod error;
mod fetch;
mod parse;
mod scrape;
mod store;

use std::time::Instant;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use crate::config::Settings;
use crate::scrape::RegardScraper;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let settings = match Settings::from_file("config.json") {
        Ok(settings) => settings,
        Err(err) => {
            tracing::warn!("Failed to load config file: {}. Using default settings.", err);
            Settings::default()
        }
    };

    let start = Instant::now();
    tracing::info!("Starting regard.ru catalog scrape");

    let mut scraper = RegardScraper::new(settings)?;
    scraper.run().await?;

    tracing::info!(
        added = scraper.added(),
        failed = scraper.failed(),
        total_duration = ?start.elapsed(),
        "Scraping process completed"
    );
    Ok(())
}
