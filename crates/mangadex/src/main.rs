//! MangaDex downloader CLI.
//!
//! Searches a title, picks the exact (case-insensitive) match and downloads
//! one chapter or all of them.

use anyhow::{Context, Result};
use clap::Parser;
use mangadex::{MangaChapters, MangaSearch, RateLimitedClient};
use shared::{Config, ImageQuality, LogConfig};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Manga title to search for
    title: String,

    /// Download only the chapter with this number
    #[arg(long)]
    chapter: Option<String>,

    /// Download compressed page images
    #[arg(long)]
    data_saver: bool,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::from_file(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Initialize logging
    let mut log_config = LogConfig::from_config(&config, "mangadex");
    if args.verbose {
        log_config.default_level = tracing::Level::DEBUG;
    }
    shared::logging::init(log_config)?;

    info!(config_file = %args.config.display(), "MangaDex downloader starting");

    let client = RateLimitedClient::from_config(&config.mangadex)
        .context("Failed to create MangaDex client")?;
    let language = config.mangadex.preferred_language.clone();

    let search = MangaSearch::new(client.clone(), language.as_str());
    let results = search
        .by_title(&args.title, &[])
        .await
        .with_context(|| format!("Search for `{}` failed", args.title))?;

    let Some(manga) = results
        .into_iter()
        .find(|manga| manga.title.to_lowercase() == args.title.to_lowercase())
    else {
        warn!(title = %args.title, "No manga with a matching title");
        return Ok(());
    };

    info!(manga_id = %manga.id, title = %manga.title, "Matched manga");

    let quality = if args.data_saver {
        ImageQuality::DataSaver
    } else {
        ImageQuality::Data
    };
    let chapters = MangaChapters::for_manga(client.clone(), manga, &language, config.download_dir());

    match &args.chapter {
        Some(number) => {
            chapters.download_by_number(number, quality).await?;
        }
        None => {
            let stats = chapters.download_all(quality).await?;
            info!("=== Download Complete ===");
            info!("Chapters listed: {}", stats.total_chapters);
            info!("Chapters downloaded: {}", stats.chapters_downloaded);
            info!("Pages downloaded: {}", stats.pages_downloaded);
            info!("Errors: {}", stats.errors);
        }
    }

    let (used, budget) = client.budget_usage().await;
    info!(used = used, budget = budget, "Rate budget usage in current window");

    Ok(())
}
