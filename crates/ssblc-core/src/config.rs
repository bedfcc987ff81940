use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::classify::{ClassifyPolicy, SecondaryResourcePolicy};
use crate::error::AppError;

pub const DEFAULT_MAX_CONCURRENT_CHECKS: usize = 5;
pub const DEFAULT_PROTOCOL_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_PAGE_LOAD_TIMEOUT_MS: u64 = 60_000;
pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_IDLE_WINDOW_MS: u64 = 500;

/// Operator configuration for one crawl.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Directory served as the site root.
    pub directory: PathBuf,
    /// Size of the fetch pool, i.e. the maximum number of in-flight fetches.
    pub max_concurrent_checks: usize,
    /// Timeout for a single DevTools protocol call.
    pub protocol_timeout: Duration,
    /// Timeout for one navigation, settle window included.
    pub page_load_timeout: Duration,
    /// A page counts as settled after this long without new responses.
    pub idle_window: Duration,
    /// Local port of the static file server.
    pub port: u16,
    pub ignore_statuses: HashSet<u16>,
    /// Exit with success even if broken links were found.
    pub dry_run: bool,
    /// JSON file with variables for `{{ vars.* }}` placeholders.
    pub context_file: Option<PathBuf>,
    pub secondary: SecondaryResourcePolicy,
    /// Print the summary as JSON instead of text.
    pub json: bool,
    /// Chrome/Chromium binary to launch instead of the discovered one.
    pub chrome_bin: Option<PathBuf>,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            directory: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            max_concurrent_checks: DEFAULT_MAX_CONCURRENT_CHECKS,
            protocol_timeout: Duration::from_millis(DEFAULT_PROTOCOL_TIMEOUT_MS),
            page_load_timeout: Duration::from_millis(DEFAULT_PAGE_LOAD_TIMEOUT_MS),
            idle_window: Duration::from_millis(DEFAULT_IDLE_WINDOW_MS),
            port: DEFAULT_PORT,
            ignore_statuses: HashSet::new(),
            dry_run: false,
            context_file: None,
            secondary: SecondaryResourcePolicy::default(),
            json: false,
            chrome_bin: None,
        }
    }
}

impl CrawlConfig {
    /// Reject values the crawl cannot run with.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.max_concurrent_checks == 0 {
            return Err(AppError::ConfigError(
                "max concurrent checks must be at least 1".into(),
            ));
        }
        if self.protocol_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "protocol timeout must be greater than 0 ms".into(),
            ));
        }
        if self.page_load_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "page load timeout must be greater than 0 ms".into(),
            ));
        }
        if self.port == 0 {
            return Err(AppError::ConfigError("port must be between 1 and 65535".into()));
        }
        if !self.directory.is_dir() {
            return Err(AppError::ConfigError(format!(
                "{} is not a directory",
                self.directory.display()
            )));
        }
        Ok(())
    }

    /// Base URL of the locally served site, without trailing slash.
    pub fn base_url(&self) -> String {
        format!("http://localhost:{}", self.port)
    }

    /// The link the crawl starts from.
    pub fn seed(&self) -> String {
        format!("{}/", self.base_url())
    }

    pub fn classify_policy(&self) -> ClassifyPolicy {
        ClassifyPolicy::new(self.ignore_statuses.clone(), self.secondary.clone())
    }
}

/// Parse a comma-separated status list such as `"401, 403"`.
///
/// Empty segments are skipped.
pub fn parse_status_list(raw: &str) -> Result<HashSet<u16>, AppError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<u16>().map_err(|_| {
                AppError::ConfigError(format!("Invalid HTTP status '{s}' in ignore list"))
            })
        })
        .collect()
}

/// Split comma-separated values, dropping empty entries and leading dots.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('.'))
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
