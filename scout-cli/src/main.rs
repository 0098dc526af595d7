//! WebScout CLI
//!
//! Cost-aware web data collection: fetch, extract, then reason only when needed.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn, Level};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use scout_runtime::{LlmProvider, RuntimeConfig};

#[derive(Parser)]
#[command(name = "webscout")]
#[command(author, version, about = "WebScout: answer tasks about web pages, cheapest method first", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[command(flatten)]
    options: GlobalOptions,

    /// Verbosity level (0-3); RUST_LOG overrides it
    #[arg(short, long, default_value = "1", global = true)]
    verbose: u8,
}

#[derive(Args)]
struct GlobalOptions {
    /// TOML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Write the JSON result here instead of stdout
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// LLM provider: openai, openrouter, anthropic or local
    #[arg(long, global = true)]
    provider: Option<LlmProvider>,

    /// LLM model to use
    #[arg(short, long, global = true)]
    model: Option<String>,

    /// OpenAI API key (or set OPENAI_API_KEY env var)
    #[arg(long, env = "OPENAI_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    /// OpenRouter API key (or set OPENROUTER_API_KEY env var)
    #[arg(long, env = "OPENROUTER_API_KEY", global = true, hide_env_values = true)]
    openrouter_key: Option<String>,

    /// Anthropic API key (or set ANTHROPIC_API_KEY env var)
    #[arg(long, env = "ANTHROPIC_API_KEY", global = true, hide_env_values = true)]
    anthropic_key: Option<String>,

    /// Base URL of an OpenAI-compatible server
    #[arg(long, env = "WEBSCOUT_LLM_BASE_URL", global = true)]
    llm_base_url: Option<String>,

    /// Never call the LLM; return deterministic results only
    #[arg(long, global = true)]
    no_llm: bool,

    /// Maximum agent iterations before forced synthesis
    #[arg(long, global = true)]
    max_iterations: Option<usize>,

    /// Anti-bot bypass proxy endpoint (FlareSolverr-compatible)
    #[arg(long, env = "WEBSCOUT_BYPASS_PROXY_URL", global = true)]
    bypass_proxy: Option<String>,

    /// External crawler endpoint used for link discovery
    #[arg(long, env = "WEBSCOUT_CRAWLER_URL", global = true)]
    crawler_url: Option<String>,

    /// Bearer token for the external crawler
    #[arg(long, env = "WEBSCOUT_CRAWLER_API_KEY", global = true, hide_env_values = true)]
    crawler_key: Option<String>,

    /// Skip the headless browser step
    #[arg(long, global = true)]
    no_render: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a task against one or more URLs
    Run {
        /// The task, in plain language
        #[arg(short, long)]
        task: String,

        /// URLs to process
        #[arg(required = true)]
        urls: Vec<String>,

        /// URLs processed concurrently
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Find contact emails and phone numbers across a site
    Contacts {
        url: String,

        #[arg(short, long, default_value = "find contact email and phone number")]
        task: String,

        /// Maximum pages to visit
        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Collect product listings across a site
    Products {
        url: String,

        #[arg(short, long, default_value = "list all products")]
        task: String,

        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Collect links to PDF, image and CSV files
    Assets {
        url: String,

        #[arg(short, long, default_value = "find downloadable documents")]
        task: String,

        #[arg(long)]
        max_pages: Option<usize>,
    },

    /// Save a full-page PNG screenshot
    Screenshot {
        url: String,

        /// PNG file (default: screenshot_<timestamp>.png)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = match &cli.options.config {
        Some(path) => RuntimeConfig::load(path)?,
        None => RuntimeConfig::default(),
    };
    apply_overrides(&mut config, &cli.options);

    match cli.command {
        Commands::Run { task, urls, concurrency } => {
            if let Some(n) = concurrency {
                config.concurrency = n.max(1);
            }
            if config.llm.enabled && config.llm.api_key.is_none() && config.llm.provider != LlmProvider::Local {
                warn!("No API key for {:?}; continuing without the LLM", config.llm.provider);
                config.llm.enabled = false;
            }

            let pipeline = config.build_pipeline()?;
            let mut results = pipeline.run_batch(&urls, &task).await;
            let succeeded = results.iter().filter(|r| r.success).count();
            info!("{}/{} URL(s) succeeded", succeeded, results.len());

            if results.len() == 1 {
                emit(&results.remove(0), cli.options.output.as_deref())?;
            } else {
                emit(&results, cli.options.output.as_deref())?;
            }
        }
        Commands::Contacts { url, task, max_pages } => {
            let pipeline = discovery_pipeline(&mut config, max_pages)?;
            let report = pipeline.discover_contacts(&url, &task).await;
            pipeline.shutdown().await;
            emit(&report, cli.options.output.as_deref())?;
        }
        Commands::Products { url, task, max_pages } => {
            let pipeline = discovery_pipeline(&mut config, max_pages)?;
            let report = pipeline.discover_products(&url, &task).await;
            pipeline.shutdown().await;
            emit(&report, cli.options.output.as_deref())?;
        }
        Commands::Assets { url, task, max_pages } => {
            let pipeline = discovery_pipeline(&mut config, max_pages)?;
            let report = pipeline.harvest_assets(&url, &task).await;
            pipeline.shutdown().await;
            emit(&report, cli.options.output.as_deref())?;
        }
        Commands::Screenshot { url, file } => {
            config.llm.enabled = false;
            let pipeline = config.build_pipeline()?;
            let shot = pipeline.screenshot(&url).await;
            pipeline.shutdown().await;

            let png = shot.with_context(|| format!("Screenshot of {} failed", url))?;
            let path = file.unwrap_or_else(|| {
                let timestamp = chrono::Utc::now().format("%Y-%m-%d_%H-%M-%S");
                PathBuf::from(format!("screenshot_{}.png", timestamp))
            });
            fs::write(&path, &png).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Screenshot saved to {} ({} bytes)", path.display(), png.len());
        }
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let builder = FmtSubscriber::builder()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact();

    if std::env::var_os("RUST_LOG").is_some() {
        builder.with_env_filter(EnvFilter::from_default_env()).init();
    } else {
        builder.with_max_level(log_level).init();
    }
}

/// Command-line flags win over the config file
fn apply_overrides(config: &mut RuntimeConfig, options: &GlobalOptions) {
    if let Some(provider) = options.provider {
        config.llm.provider = provider;
    }
    if let Some(model) = &options.model {
        config.llm.model = model.clone();
    }
    if let Some(base) = &options.llm_base_url {
        config.llm.base_url = Some(base.clone());
    }
    if let Some(max) = options.max_iterations {
        config.llm.max_iterations = max.max(1);
    }
    if options.no_llm {
        config.llm.enabled = false;
    }

    let key = match config.llm.provider {
        LlmProvider::OpenAI | LlmProvider::Local => &options.api_key,
        LlmProvider::OpenRouter => &options.openrouter_key,
        LlmProvider::Anthropic => &options.anthropic_key,
    };
    if key.is_some() {
        config.llm.api_key = key.clone();
    }

    if let Some(proxy) = &options.bypass_proxy {
        config.fetch.bypass_proxy_url = Some(proxy.clone());
    }
    if options.no_render {
        config.fetch.no_render = true;
    }
    if let Some(url) = &options.crawler_url {
        config.crawler.url = Some(url.clone());
    }
    if let Some(key) = &options.crawler_key {
        config.crawler.api_key = Some(key.clone());
    }
}

fn discovery_pipeline(config: &mut RuntimeConfig, max_pages: Option<usize>) -> Result<scout_runtime::Pipeline> {
    config.llm.enabled = false;
    if let Some(n) = max_pages {
        config.discovery.max_pages = n.max(1);
    }
    config.build_pipeline()
}

/// Pretty JSON to a file or stdout
fn emit<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            fs::write(path, &json).with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Result saved to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
