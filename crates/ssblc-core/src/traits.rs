use std::future::Future;

use crate::models::CrawlResult;

/// A fixed pool of reusable fetch workers.
///
/// Implementations never fail as a whole: timeouts and transport errors are
/// reported through a [`CrawlResult`] without a primary response.
pub trait PageFetcher: Send + Sync {
    /// Number of workers in the pool.
    fn pool_size(&self) -> usize;

    /// Fetch `link` with worker `worker` (`0..pool_size()`).
    ///
    /// The caller guarantees no two concurrent calls share a worker.
    fn fetch_one(&self, worker: usize, link: &str) -> impl Future<Output = CrawlResult> + Send;
}
