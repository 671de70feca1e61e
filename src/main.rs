use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vk_video_publisher::catalog::{Catalog, RecordFilter};
use vk_video_publisher::config::Config;
use vk_video_publisher::export::export_catalog;
use vk_video_publisher::publisher::{publish_pending, PublishOptions, RetryPolicy, VkPublisher};
use vk_video_publisher::scanner::Scanner;
use vk_video_publisher::titles::{Caption, TitleEngine, TitleRequest};
use vk_video_publisher::video::discover_exports;

#[derive(Parser)]
#[command(name = "vk-publisher")]
#[command(version, about = "Title Telegram course videos and publish them to VK")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to vk-publisher.toml, config/vk-publisher.toml, config/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Catalog file, overrides the configured path
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan Telegram export folders into the catalog
    Scan {
        /// Export folders, or directories containing them
        #[arg(required = true)]
        exports: Vec<PathBuf>,
        /// Keep videos whose content is already cataloged under another path
        #[arg(long)]
        no_skip_duplicates: bool,
    },
    /// Print the title for one caption and file name
    Title {
        #[arg(long, default_value = "")]
        caption: String,
        #[arg(long)]
        file: String,
        #[arg(long)]
        channel: Option<String>,
    },
    /// Regenerate titles of cataloged videos
    Retitle {
        #[arg(long)]
        channel: Option<String>,
    },
    /// Upload pending videos to VK
    Publish {
        #[arg(long)]
        channel: Option<String>,
        /// Export folder name
        #[arg(long)]
        source: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        dry_run: bool,
    },
    /// List cataloged videos
    List {
        #[arg(long)]
        channel: Option<String>,
        #[arg(long, default_value_t = 1)]
        start: u64,
        #[arg(long, default_value_t = 50)]
        count: usize,
    },
    /// Show catalog statistics
    Stats,
    /// Export the catalog as JSON, or as a spreadsheet for `.xlsx` paths
    Export {
        output: PathBuf,
        #[arg(long)]
        channel: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::from_file(path)?,
        None => Config::load()?,
    };
    if let Some(catalog) = &cli.catalog {
        config.catalog.path = catalog.clone();
    }

    init_logging(&config, cli.verbose);
    config.validate()?;

    let engine = TitleEngine::new(config.titles.clone());

    match cli.command {
        Commands::Title { caption, file, channel } => {
            let caption = Caption::new(caption);
            let request = TitleRequest {
                caption: &caption,
                file_name: &file,
                channel: channel.as_deref(),
                date: None,
            };
            println!("{}", engine.title(&request));
        }

        Commands::Scan { exports, no_skip_duplicates } => {
            let mut folders = Vec::new();
            for root in &exports {
                if !root.exists() {
                    return Err(anyhow!("Export path not found: {}", root.display()));
                }
                let found = discover_exports(root);
                if found.is_empty() {
                    warn!("⚠️ No Telegram export found under {}", root.display());
                }
                folders.extend(found);
            }

            let catalog = open_catalog(&config).await?;
            let skip_duplicates = config.scan.skip_duplicates && !no_skip_duplicates;
            let scanner = Scanner::new(catalog, engine, config.scan.clone());
            let stats = scanner.scan_and_add(&folders, skip_duplicates).await?;

            info!("📊 Scan results:");
            info!("  ➕ Added: {}", stats.added);
            info!("  🔄 Updated: {}", stats.updated);
            info!("  ⏭️ Duplicates: {}", stats.duplicates);
            info!("  ❌ Failed: {}", stats.failed);
        }

        Commands::Retitle { channel } => {
            let catalog = open_catalog(&config).await?;
            let scanner = Scanner::new(catalog, engine, config.scan.clone());
            let filter = RecordFilter { channel, source_folder: None };
            let changed = scanner.retitle(&filter).await?;
            info!("✅ {} titles updated", changed);
        }

        Commands::Publish { channel, source, limit, dry_run } => {
            let filter = RecordFilter { channel, source_folder: source };
            let options = PublishOptions {
                limit,
                dry_run,
                retry: RetryPolicy::from_config(&config.publisher),
            };
            let publisher = VkPublisher::new(config.publisher.clone())?;
            let catalog = open_catalog(&config).await?;
            let report = publish_pending(&catalog, &publisher, &filter, &options).await?;

            info!("🎉 Published {} of {} videos", report.published, report.attempted);
            for (id, url) in &report.urls {
                info!("  #{} {}", id, url);
            }
            if report.failed > 0 {
                warn!("❌ {} uploads failed; they stay pending", report.failed);
            }
        }

        Commands::List { channel, start, count } => {
            let filter = RecordFilter { channel, source_folder: None };
            let catalog = open_catalog(&config).await?;
            let records = catalog.range(start, count, &filter).await;
            if records.is_empty() {
                info!("📭 No videos found");
                return Ok(());
            }
            for record in records {
                let status = match record.video_url {
                    Some(url) => format!("✅ {}", url),
                    None if record.error_message.is_some() => "❌ failed".to_string(),
                    None => "⏳ pending".to_string(),
                };
                println!("{:>5}  {}  {}", record.id, record.title, status);
            }
        }

        Commands::Stats => {
            let catalog = open_catalog(&config).await?;
            let stats = catalog.statistics().await;
            info!("📊 Catalog Statistics:");
            info!("  Total videos: {}", stats.total);
            info!("  Published: {}", stats.published);
            info!("  Pending: {}", stats.pending);
            info!("  Failed: {}", stats.failed);
            info!("  Channels: {}", stats.channels);
            info!("  Source folders: {}", stats.source_folders);
        }

        Commands::Export { output, channel } => {
            let filter = RecordFilter { channel, source_folder: None };
            let catalog = open_catalog(&config).await?;
            export_catalog(&catalog, &filter, &output).await?;
        }
    }

    Ok(())
}

async fn open_catalog(config: &Config) -> Result<Catalog> {
    Catalog::open(&config.catalog.path)
        .await
        .with_context(|| format!("Failed to open catalog {}", config.catalog.path.display()))
}

fn init_logging(config: &Config, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("vk_video_publisher=debug,vk_publisher=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
