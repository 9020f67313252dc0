//! CLI parser and command dispatch.

mod config_cmd;
mod generate;
mod icons;
mod scrape;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use cliche::config::{Overrides, Settings};

#[derive(Parser)]
#[command(name = "cliche")]
#[command(about = "Scrape documentation sites and merge them into topic guides")]
#[command(version)]
pub struct Cli {
    /// Config file path (overrides auto-discovery)
    #[arg(long, global = true, env = "CLICHE_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory (overrides config file and environment)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a site and save the extracted pages as records
    Scrape {
        /// Page to start from
        url: String,
        /// Keep only pages relevant to this topic
        #[arg(short, long)]
        topic: Option<String>,
        /// Follow links this many levels deep (0 = seed page only)
        #[arg(short, long)]
        depth: Option<u32>,
        /// Maximum pages to visit
        #[arg(short, long)]
        max_pages: Option<usize>,
        /// Pages fetched at once
        #[arg(short, long)]
        concurrency: Option<usize>,
        /// Collect and download images
        #[arg(short, long)]
        images: bool,
        /// Maximum images per page
        #[arg(long)]
        max_images: Option<usize>,
        /// Minimum declared image width and height in pixels (0 = any)
        #[arg(long)]
        min_image_size: Option<u32>,
        /// Skip LLM enhancement of records
        #[arg(long)]
        no_llm: bool,
        /// Retry transient fetch failures up to N times
        #[arg(long)]
        retries: Option<u32>,
        /// Write records here instead of the data directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Merge the records scraped for a topic into one markdown document
    Generate {
        /// Topic used when scraping
        topic: String,
        /// Skip LLM polishing of the merged document
        #[arg(long)]
        raw: bool,
        /// Write the document here instead of the data directory
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the resolved settings
    Show,
    /// Show the config file in use
    Path,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut overrides = Overrides {
        config_path: cli.config,
        data_dir: cli.data_dir,
        ..Overrides::default()
    };
    if let Commands::Scrape {
        depth,
        max_pages,
        concurrency,
        max_images,
        min_image_size,
        no_llm,
        retries,
        ..
    } = &cli.command
    {
        overrides.max_depth = *depth;
        overrides.max_pages = *max_pages;
        overrides.max_concurrent = *concurrency;
        overrides.max_images = *max_images;
        overrides.min_image_size = *min_image_size;
        overrides.max_retries = *retries;
        overrides.no_llm = *no_llm;
    }
    let settings = Settings::load(overrides).await?;

    match cli.command {
        Commands::Scrape {
            url,
            topic,
            images,
            output,
            ..
        } => {
            scrape::cmd_scrape(
                &settings,
                &url,
                topic.as_deref(),
                images,
                output.as_deref(),
            )
            .await
        }
        Commands::Generate { topic, raw, output } => {
            generate::cmd_generate(&settings, &topic, raw, output.as_deref()).await
        }
        Commands::Config { command } => match command {
            ConfigCommands::Show => config_cmd::cmd_config_show(&settings),
            ConfigCommands::Path => config_cmd::cmd_config_path(&settings),
        },
    }
}
