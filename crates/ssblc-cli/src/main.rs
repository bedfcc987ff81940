mod cli;

use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use url::Url;

use ssblc_client::{BrowserPool, PoolConfig, StaticServer};
use ssblc_core::config::CrawlConfig;
use ssblc_core::substitute;
use ssblc_core::summary::{EXIT_FATAL, RunSummary};
use ssblc_core::{CrawlService, TracingCrawlReporter};

use crate::cli::Cli;

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env if present
    let _ = dotenvy::dotenv();

    if let Err(e) = init_tracing() {
        eprintln!("Failed to set up logging: {e}");
        return ExitCode::from(EXIT_FATAL);
    }

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(EXIT_FATAL)
        }
    }
}

fn init_tracing() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("ssblc=info".parse()?))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

/// Serve the directory, crawl it and print the summary.
///
/// Returns the exit status of a completed crawl; errors are fatal.
async fn run(cli: Cli) -> Result<u8> {
    let config = cli.into_config().context("Invalid configuration")?;
    log_config(&config);

    let context = match config.context_file.as_deref() {
        Some(path) => {
            let context = substitute::Context::load(path)
                .with_context(|| format!("Failed to load context file {}", path.display()))?;
            tracing::info!("Loaded context variables from {}", path.display());
            Some(context)
        }
        None => None,
    };

    let server = StaticServer::start(&config.directory, config.port)
        .await
        .context("Failed to start static file server")?;

    let seed = config.seed();
    let site = Url::parse(&seed).context("Invalid base URL")?;

    let pool = match BrowserPool::launch(PoolConfig::from_crawl(&config, site.clone())).await {
        Ok(pool) => pool,
        Err(e) => {
            let _ = server.shutdown().await;
            return Err(e).context("Failed to launch headless browser");
        }
    };

    let service = CrawlService::new(pool, config.classify_policy(), site).with_context(context);
    let summary = service.run(&seed, &TracingCrawlReporter).await;
    service.into_fetcher().shutdown().await;

    print_summary(&summary, config.json)?;

    server
        .shutdown()
        .await
        .context("Failed to stop static file server")?;

    Ok(summary.exit_code(config.dry_run))
}

fn log_config(config: &CrawlConfig) {
    let context = config
        .context_file
        .as_ref()
        .map_or_else(|| "None".to_string(), |p| p.display().to_string());

    let mut ignored: Vec<u16> = config.ignore_statuses.iter().copied().collect();
    ignored.sort_unstable();
    let ignored = if ignored.is_empty() {
        "None".to_string()
    } else {
        ignored
            .iter()
            .map(u16::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    };

    tracing::info!("Directory: {}", config.directory.display());
    tracing::info!("Base URL: {}", config.base_url());
    tracing::info!("Max concurrent checks: {}", config.max_concurrent_checks);
    tracing::info!("Protocol timeout: {} ms", config.protocol_timeout.as_millis());
    tracing::info!("Page load timeout: {} ms", config.page_load_timeout.as_millis());
    tracing::info!("Context file: {context}");
    tracing::info!("Ignored statuses: {ignored}");
    tracing::info!(
        "Dry run: {}",
        if config.dry_run { "Enabled" } else { "Disabled" }
    );
}

fn print_summary(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        println!("{}", summary.to_json()?);
    } else {
        print!("{summary}");
    }
    Ok(())
}
