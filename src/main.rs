use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use trendpress::config::{process_env, Config};
use trendpress::pipeline::{Pipeline, PipelineError};

const USER_AGENT: &str = concat!("trendpress/", env!("CARGO_PKG_VERSION"));
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Exit code when the article was generated but at least one destination failed.
const EXIT_PARTIAL_FAILURE: i32 = 2;

#[derive(Parser, Debug)]
#[command(
    name = "trendpress",
    about = "Turns a GitHub Trending listing into an article and publishes it"
)]
struct Args {
    /// Config file (default: ~/.config/trendpress/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Language filter, e.g. "rust" (empty for all languages)
    #[arg(long)]
    language: Option<String>,

    /// Time range: daily, weekly or monthly
    #[arg(long)]
    since: Option<String>,

    /// Maximum number of repositories in the article
    #[arg(long)]
    limit: Option<usize>,

    /// Always fetch the listing, ignoring and not writing the local cache
    #[arg(long)]
    no_cache: bool,

    /// Generate the article and print it without publishing
    #[arg(long)]
    dry_run: bool,
}

/// File, then environment, then command line.
fn load_config(args: &Args) -> Result<Config> {
    let path = match &args.config {
        Some(path) => Some(path.clone()),
        None => Config::default_path(),
    };
    let mut config = match &path {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::default(),
    };

    config
        .apply_env(process_env())
        .context("Invalid environment override")?;

    if let Some(language) = &args.language {
        config.trending.language = language.clone();
    }
    if let Some(since) = &args.since {
        config.trending.since = since.to_ascii_lowercase();
    }
    if let Some(limit) = args.limit {
        config.trending.limit = limit;
    }
    if args.no_cache {
        config.cache.enabled = false;
    }
    tracing::debug!(config = ?config, "Effective configuration");
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;

    let client = reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .context("Failed to build HTTP client")?;

    let pipeline = Pipeline::from_config(&config, &client, args.dry_run)
        .context("Invalid configuration")?;

    let report = match pipeline.run().await {
        Ok(report) => report,
        Err(e @ PipelineError::EmptyListing { .. }) => {
            // Already alerted; an empty page is not a crash
            tracing::warn!(error = %e, "Run stopped before generating an article");
            return Ok(());
        }
        Err(e) => return Err(e).context("Run failed"),
    };

    if args.dry_run {
        if let Some(article) = &report.article {
            println!("{}", article.body);
        }
        return Ok(());
    }

    for result in &report.results {
        match (&result.url, &result.error) {
            (_, Some(error)) => eprintln!("{}: failed: {}", result.destination, error),
            (Some(url), None) => println!("{}: {}", result.destination, url),
            (None, None) => println!("{}: ok", result.destination),
        }
    }

    if report.results.iter().any(|r| !r.is_success()) {
        std::process::exit(EXIT_PARTIAL_FAILURE);
    }
    Ok(())
}
