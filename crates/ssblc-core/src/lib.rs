pub mod classify;
pub mod config;
pub mod crawl;
pub mod error;
pub mod frontier;
pub mod links;
pub mod models;
pub mod substitute;
pub mod summary;
pub mod traits;

#[cfg(test)]
pub mod testutil;

pub use classify::{ClassifyPolicy, SecondaryResourcePolicy};
pub use config::CrawlConfig;
pub use crawl::{CrawlEvent, CrawlReporter, CrawlService, TracingCrawlReporter};
pub use error::AppError;
pub use frontier::Frontier;
pub use models::{CrawlResult, Link, PageResponse, Verdict};
pub use substitute::Context;
pub use summary::RunSummary;
pub use traits::PageFetcher;
