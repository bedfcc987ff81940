use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use ssblc_core::config::{
    CrawlConfig, DEFAULT_MAX_CONCURRENT_CHECKS, DEFAULT_PAGE_LOAD_TIMEOUT_MS,
    DEFAULT_PROTOCOL_TIMEOUT_MS, DEFAULT_PORT, parse_list, parse_status_list,
};
use ssblc_core::error::AppError;
use ssblc_core::SecondaryResourcePolicy;

#[derive(Debug, Parser)]
#[command(
    name = "ssblc",
    version,
    about = "Static Site Broken Link Checker: serves a directory and crawls it with headless Chromium"
)]
pub struct Cli {
    /// Directory to serve and check (defaults to the current directory)
    pub directory: Option<PathBuf>,

    /// JSON file with variables for `{{ vars.* }}` placeholders in links
    #[arg(short, long, env = "SSBLC_CONTEXT")]
    pub context: Option<PathBuf>,

    /// Number of links checked concurrently
    #[arg(
        short,
        long,
        env = "SSBLC_MAX_CONCURRENT_CHECKS",
        default_value_t = DEFAULT_MAX_CONCURRENT_CHECKS
    )]
    pub max_concurrent_checks: usize,

    /// Timeout in ms for a single browser protocol call
    #[arg(long, env = "SSBLC_PROTOCOL_TIMEOUT", default_value_t = DEFAULT_PROTOCOL_TIMEOUT_MS)]
    pub protocol_timeout: u64,

    /// Timeout in ms for loading one page
    #[arg(long, env = "SSBLC_PAGE_LOAD_TIMEOUT", default_value_t = DEFAULT_PAGE_LOAD_TIMEOUT_MS)]
    pub page_load_timeout: u64,

    /// Port of the local static file server
    #[arg(short, long, env = "SSBLC_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Comma-separated HTTP statuses reported as ignored instead of broken (e.g. "401,403")
    #[arg(short, long, env = "SSBLC_IGNORE_STATUSES")]
    pub ignore_statuses: Option<String>,

    /// Report broken links but exit with success
    #[arg(long, env = "SSBLC_DRY_RUN", default_value_t = false)]
    pub dry_run: bool,

    /// Print the summary as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Extensions of secondary documents checked under their own URL
    #[arg(long, value_delimiter = ',', default_value = "md")]
    pub secondary_ext: Vec<String>,

    /// File names never treated as secondary documents
    #[arg(long, value_delimiter = ',', default_value = "_sidebar.md")]
    pub secondary_exclude: Vec<String>,

    /// Chrome/Chromium binary to launch
    #[arg(long, env = "CHROME_BIN")]
    pub chrome_bin: Option<PathBuf>,
}

impl Cli {
    /// Build and validate the crawl configuration.
    pub fn into_config(self) -> Result<CrawlConfig, AppError> {
        let defaults = CrawlConfig::default();
        let ignore_statuses = match self.ignore_statuses.as_deref() {
            Some(raw) => parse_status_list(raw)?,
            None => defaults.ignore_statuses,
        };

        let config = CrawlConfig {
            directory: self.directory.unwrap_or(defaults.directory),
            max_concurrent_checks: self.max_concurrent_checks,
            protocol_timeout: Duration::from_millis(self.protocol_timeout),
            page_load_timeout: Duration::from_millis(self.page_load_timeout),
            idle_window: defaults.idle_window,
            port: self.port,
            ignore_statuses,
            dry_run: self.dry_run,
            context_file: self.context,
            secondary: SecondaryResourcePolicy::new(
                flatten(&self.secondary_ext),
                flatten(&self.secondary_exclude),
            ),
            json: self.json,
            chrome_bin: self.chrome_bin,
        };

        config.validate()?;
        Ok(config)
    }
}

fn flatten(values: &[String]) -> Vec<String> {
    values.iter().flat_map(|v| parse_list(v)).collect()
}
