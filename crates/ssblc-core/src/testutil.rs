//! Test utilities: a scripted in-memory site behind the fetcher trait.
//!
//! Handwritten mock in the same spirit as the rest of the crate's tests.
//! Shared state uses `Arc<Mutex<_>>` / atomics so tests can assert on the
//! recorded dispatches after a crawl.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::models::{CrawlResult, PageResponse};
use crate::traits::PageFetcher;

// ---------------------------------------------------------------------------
// MockPageFetcher
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum MockPage {
    Response {
        final_url: Option<String>,
        status: u16,
        body: Option<String>,
        side: Vec<PageResponse>,
    },
    Failure(String),
}

/// Mock fetch pool serving a fixed map of URL → page.
///
/// Unknown URLs answer 404 without a body.
#[derive(Clone)]
pub struct MockPageFetcher {
    pool_size: usize,
    delay: Duration,
    pages: Arc<HashMap<String, MockPage>>,
    /// Every dispatch as (worker, link), in completion order.
    pub calls: Arc<Mutex<Vec<(usize, String)>>>,
    in_flight: Arc<AtomicUsize>,
    /// Highest number of concurrent `fetch_one` calls observed.
    pub max_in_flight: Arc<AtomicUsize>,
}

impl MockPageFetcher {
    pub fn new(pool_size: usize) -> Self {
        Self {
            pool_size,
            delay: Duration::ZERO,
            pages: Arc::new(HashMap::new()),
            calls: Arc::new(Mutex::new(Vec::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            max_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Make every fetch take `delay` so rounds overlap in time.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Serve `url` with `status` and an HTML body.
    pub fn page(self, url: &str, status: u16, body: &str) -> Self {
        self.insert(
            url,
            MockPage::Response {
                final_url: None,
                status,
                body: Some(body.to_string()),
                side: Vec::new(),
            },
        )
    }

    /// Serve `url` with `status` and no body.
    pub fn status(self, url: &str, status: u16) -> Self {
        self.insert(
            url,
            MockPage::Response {
                final_url: None,
                status,
                body: None,
                side: Vec::new(),
            },
        )
    }

    /// Serve `url` as a 200 reached through a redirect to `final_url`.
    pub fn redirected(self, url: &str, final_url: &str, body: &str) -> Self {
        self.insert(
            url,
            MockPage::Response {
                final_url: Some(final_url.to_string()),
                status: 200,
                body: Some(body.to_string()),
                side: Vec::new(),
            },
        )
    }

    /// Make navigation to `url` fail without a response.
    pub fn failing(self, url: &str, error: &str) -> Self {
        self.insert(url, MockPage::Failure(error.to_string()))
    }

    /// Attach a side-effect response to an already configured page.
    pub fn side(mut self, url: &str, response: PageResponse) -> Self {
        let pages = Arc::make_mut(&mut self.pages);
        if let Some(MockPage::Response { side, .. }) = pages.get_mut(url) {
            side.push(response);
        }
        self
    }

    fn insert(mut self, url: &str, page: MockPage) -> Self {
        Arc::make_mut(&mut self.pages).insert(url.to_string(), page);
        self
    }

    /// Links dispatched so far, in completion order.
    pub fn dispatched(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, link)| link.clone())
            .collect()
    }

    pub fn peak_concurrency(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

impl PageFetcher for MockPageFetcher {
    fn pool_size(&self) -> usize {
        self.pool_size
    }

    async fn fetch_one(&self, worker: usize, link: &str) -> CrawlResult {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let result = match self.pages.get(link) {
            Some(MockPage::Response {
                final_url,
                status,
                body,
                side,
            }) => {
                let reached = final_url.as_deref().unwrap_or(link);
                let mut result = CrawlResult::new(link, PageResponse::new(reached, *status));
                result.body = body.clone();
                result.side_responses = side.clone();
                result
            }
            Some(MockPage::Failure(error)) => CrawlResult::failed(link, error.as_str()),
            None => CrawlResult::new(link, PageResponse::new(link, 404)),
        };

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.calls
            .lock()
            .unwrap()
            .push((worker, link.to_string()));
        result
    }
}
