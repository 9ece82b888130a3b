//! 危机信号管道命令行入口
//!
//! ```text
//! crisis run --platform all
//! crisis process --input data/raw/tweets.csv --name tweets
//! crisis render --input data/processed/geocoded_tweets.csv --name twitter
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use crisis_etl::extract::CsvSource;
use crisis_etl::storage::csv::read_geocoded;
use crisis_etl::{
    CrisisPipelineBuilder, DatasetPaths, ETLConfig, ETLError, GeocodedPost, Platform, PostSource,
};
use crisis_viz::render_outputs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "crisis")]
#[command(about = "Crisis signal pipeline for social media posts", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data directory (raw / processed)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Output directory (maps / reports)
    #[arg(long, global = true)]
    output_dir: Option<PathBuf>,

    /// JSON file with custom risk rules
    #[arg(long, global = true)]
    rules: Option<PathBuf>,

    /// Maximum posts per query (0 = as many as the API returns)
    #[arg(long, global = true)]
    limit: Option<usize>,

    /// Skip location extraction and geocoding
    #[arg(long, global = true)]
    no_geocode: bool,

    /// Persistent geocode cache, e.g. sqlite:data/geocode_cache.db
    #[arg(long, global = true)]
    geocode_cache: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract posts from the platform APIs and run every stage
    Run {
        #[arg(short, long, value_enum, default_value = "all")]
        platform: PlatformArg,
    },

    /// Clean, tag and geocode an existing raw CSV file
    Process {
        #[arg(short, long)]
        input: PathBuf,

        /// Dataset name used for output files (defaults to the file stem)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Render maps and a report from a geocoded CSV file
    Render {
        #[arg(short, long)]
        input: PathBuf,

        /// Prefix for the output files
        #[arg(short, long)]
        name: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum PlatformArg {
    Twitter,
    Reddit,
    All,
}

impl PlatformArg {
    fn platforms(self) -> Vec<Platform> {
        match self {
            PlatformArg::Twitter => vec![Platform::Twitter],
            PlatformArg::Reddit => vec![Platform::Reddit],
            PlatformArg::All => vec![Platform::Twitter, Platform::Reddit],
        }
    }
}

impl Cli {
    /// 环境变量配置 + 命令行覆盖
    fn config(&self) -> ETLConfig {
        let mut config = ETLConfig::from_env();

        if let Some(dir) = &self.data_dir {
            config.data_dir = dir.clone();
        }
        if let Some(dir) = &self.output_dir {
            config.output_dir = dir.clone();
        }
        if let Some(rules) = &self.rules {
            config.rules_path = Some(rules.clone());
        }
        if let Some(limit) = self.limit {
            config.limit_per_query = limit;
        }
        if let Some(url) = &self.geocode_cache {
            config.geocode_cache_url = Some(url.clone());
        }
        if self.no_geocode {
            config.enable_geocoding = false;
        }

        config
    }
}

fn render(label: &str, posts: &[GeocodedPost], config: &ETLConfig) -> Result<()> {
    let outputs = render_outputs(label, posts, &config.maps_dir(), &config.reports_dir())
        .with_context(|| format!("failed to render outputs for {}", label))?;

    info!("Maps saved to {}", config.maps_dir().display());
    info!("Report saved to {}", outputs.report.display());
    Ok(())
}

async fn run_platform(platform: Platform, config: &ETLConfig, skip_unconfigured: bool) -> Result<()> {
    info!("=== Analyzing {} data ===", platform);

    let built = CrisisPipelineBuilder::new()
        .with_config(config.clone())
        .with_platform(platform)
        .build()
        .await;

    let mut pipeline = match built {
        Ok(pipeline) => pipeline,
        Err(ETLError::Config(msg)) if skip_unconfigured => {
            warn!("Skipping {}: {}", platform, msg);
            return Ok(());
        }
        Err(e) => return Err(e).with_context(|| format!("failed to set up {} pipeline", platform)),
    };

    let posts = pipeline
        .run(platform.dataset_name())
        .await
        .with_context(|| format!("{} pipeline failed", platform))?;

    if posts.is_empty() {
        warn!("No {} posts to visualize", platform);
        return Ok(());
    }

    render(&platform.to_string(), &posts, config)
}

async fn process_file(input: &Path, name: Option<String>, config: ETLConfig) -> Result<()> {
    let dataset = match name {
        Some(name) => name,
        None => input
            .file_stem()
            .and_then(|s| s.to_str())
            .context("cannot derive dataset name from input path")?
            .to_string(),
    };

    config.ensure_directories()?;
    let paths = DatasetPaths::new(&config, &dataset);

    let posts = CsvSource::new(input)
        .fetch_posts(0)
        .await
        .with_context(|| format!("failed to read {}", input.display()))?;

    let mut pipeline = CrisisPipelineBuilder::new()
        .with_config(config.clone())
        .build()
        .await
        .context("failed to set up pipeline")?;

    let geocoded = pipeline.process(&posts, &paths).await?;
    info!("Processed {} posts into {}", geocoded.len(), paths.geocoded.display());

    render(&dataset, &geocoded, &config)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config();

    match cli.command {
        Commands::Run { platform } => {
            config.ensure_directories()?;
            let skip_unconfigured = matches!(platform, PlatformArg::All);
            for p in platform.platforms() {
                run_platform(p, &config, skip_unconfigured).await?;
            }
            info!("Analysis complete! Check {} for results.", config.output_dir.display());
        }
        Commands::Process { input, name } => {
            process_file(&input, name, config).await?;
        }
        Commands::Render { input, name } => {
            let posts = read_geocoded(&input)
                .with_context(|| format!("failed to read {}", input.display()))?;
            config.ensure_directories()?;
            render(&name, &posts, &config)?;
        }
    }

    Ok(())
}
