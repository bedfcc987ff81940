//! Crawl driver: drains the frontier in rounds through a fetch pool.
//!
//! Each round pops at most `pool_size` links, fetches them concurrently
//! (one per worker), and only after every fetch of the round has completed
//! classifies the results and merges newly discovered links. The crawl ends
//! when a round leaves nothing to dispatch.

use std::time::Instant;

use futures::future::join_all;
use url::Url;

use crate::classify::{ClassifyPolicy, classify_navigation, classify_result};
use crate::frontier::Frontier;
use crate::links::{extract_hrefs, is_same_origin, resolve_links};
use crate::models::{CrawlResult, Verdict};
use crate::substitute::{Context, substitute};
use crate::summary::RunSummary;
use crate::traits::PageFetcher;

/// Events emitted by the driver for progress reporting.
#[derive(Debug, Clone)]
pub enum CrawlEvent<'a> {
    Started {
        seed: &'a str,
        pool_size: usize,
    },
    RoundStarted {
        round: usize,
        batch_size: usize,
        /// Links still waiting in the frontier after this batch was popped.
        pending: usize,
    },
    Checking {
        position: usize,
        found: usize,
        link: &'a str,
    },
    Broken {
        link: &'a str,
        status: Option<u16>,
        error: Option<&'a str>,
    },
    Ignored {
        link: &'a str,
        status: Option<u16>,
    },
    Discovered {
        page: &'a str,
        new_links: usize,
    },
    Drained {
        rounds: usize,
        checked: usize,
    },
}

/// Trait for receiving crawl events (decoupled logging).
pub trait CrawlReporter: Send + Sync {
    fn report(&self, event: CrawlEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCrawlReporter;

impl CrawlReporter for TracingCrawlReporter {
    fn report(&self, event: CrawlEvent<'_>) {
        match event {
            CrawlEvent::Started { seed, pool_size } => {
                tracing::info!(%seed, %pool_size, "Crawl started");
            }
            CrawlEvent::RoundStarted {
                round,
                batch_size,
                pending,
            } => {
                tracing::debug!(%round, %batch_size, %pending, "Round started");
            }
            CrawlEvent::Checking {
                position,
                found,
                link,
            } => {
                tracing::info!("{position}/{found} Checking link: {link}");
            }
            CrawlEvent::Broken {
                link,
                status: Some(status),
                ..
            } => {
                tracing::error!("Failed to load {link}: {status}");
            }
            CrawlEvent::Broken {
                link,
                status: None,
                error,
            } => {
                tracing::error!("Failed to load {link}: {}", error.unwrap_or("no response"));
            }
            CrawlEvent::Ignored { link, status } => match status {
                Some(status) => tracing::warn!("Ignored {link} with status {status}"),
                None => tracing::warn!("Ignored {link}"),
            },
            CrawlEvent::Discovered { page, new_links } => {
                tracing::debug!(%page, %new_links, "Discovered links");
            }
            CrawlEvent::Drained { rounds, checked } => {
                tracing::info!(%rounds, %checked, "Crawl finished");
            }
        }
    }
}

/// A reporter that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullReporter;

impl CrawlReporter for NullReporter {}

/// Drives a crawl of one site through a [`PageFetcher`].
pub struct CrawlService<F: PageFetcher> {
    fetcher: F,
    policy: ClassifyPolicy,
    context: Option<Context>,
    site: Url,
}

impl<F: PageFetcher> CrawlService<F> {
    /// Create a driver for the site rooted at `site`.
    pub fn new(fetcher: F, policy: ClassifyPolicy, site: Url) -> Self {
        Self {
            fetcher,
            policy,
            context: None,
            site,
        }
    }

    /// Resolve `{{ vars.* }}` placeholders against `context` before dispatch.
    pub fn with_context(mut self, context: Option<Context>) -> Self {
        self.context = context;
        self
    }

    /// Consume the driver, handing back the fetch pool for shutdown.
    pub fn into_fetcher(self) -> F {
        self.fetcher
    }

    /// Crawl from `seed` until the frontier is exhausted and summarise.
    pub async fn run<R: CrawlReporter>(&self, seed: &str, reporter: &R) -> RunSummary {
        let started = Instant::now();
        let frontier = self.crawl(seed, reporter).await;
        frontier.summarize(started.elapsed())
    }

    /// Crawl from `seed` and return the final frontier.
    pub async fn crawl<R: CrawlReporter>(&self, seed: &str, reporter: &R) -> Frontier {
        let pool_size = self.fetcher.pool_size().max(1);
        let mut frontier = Frontier::new(seed);
        let mut rounds = 0;

        reporter.report(CrawlEvent::Started { seed, pool_size });

        loop {
            let batch = frontier.pop_batch_with(pool_size, |raw| {
                substitute(raw, self.context.as_ref())
            });
            if batch.is_empty() {
                break;
            }

            rounds += 1;
            reporter.report(CrawlEvent::RoundStarted {
                round: rounds,
                batch_size: batch.len(),
                pending: frontier.discovered_count(),
            });

            let first_position = frontier.checked_count() - batch.len() + 1;
            let found = frontier.found_count();
            for (i, link) in batch.iter().enumerate() {
                reporter.report(CrawlEvent::Checking {
                    position: first_position + i,
                    found,
                    link: link.as_str(),
                });
            }

            let results = join_all(
                batch
                    .iter()
                    .enumerate()
                    .map(|(i, link)| self.fetcher.fetch_one(i % pool_size, link)),
            )
            .await;

            for result in results {
                self.absorb(&mut frontier, &result, reporter);
            }
        }

        reporter.report(CrawlEvent::Drained {
            rounds,
            checked: frontier.checked_count(),
        });

        frontier
    }

    /// Record the verdicts of one fetch and merge the links it discovered.
    fn absorb<R: CrawlReporter>(&self, frontier: &mut Frontier, result: &CrawlResult, reporter: &R) {
        for (link, verdict) in classify_result(result, &self.policy) {
            if !frontier.record(&link, verdict) {
                continue;
            }

            let status = if link == result.requested {
                result.status()
            } else {
                result
                    .side_responses
                    .iter()
                    .find(|r| r.url == link)
                    .map(|r| r.status)
            };

            match verdict {
                Verdict::Broken => reporter.report(CrawlEvent::Broken {
                    link: &link,
                    status,
                    error: result.error.as_deref(),
                }),
                Verdict::Ignored => reporter.report(CrawlEvent::Ignored {
                    link: &link,
                    status,
                }),
                Verdict::Ok => {}
            }
        }

        let (_, navigation) =
            classify_navigation(&result.requested, result.primary.as_ref(), &self.policy);
        if navigation != Verdict::Ok || !is_same_origin(&result.requested, &self.site) {
            return;
        }

        if let Some(body) = result.body.as_deref() {
            let hrefs = extract_hrefs(body);
            // Relative hrefs resolve against the final URL after redirects.
            let page = result
                .primary
                .as_ref()
                .map_or(result.requested.as_str(), |p| p.url.as_str());
            let links = resolve_links(page, hrefs.iter().map(String::as_str));
            let new_links = frontier.merge(links);
            if new_links > 0 {
                reporter.report(CrawlEvent::Discovered {
                    page: &result.requested,
                    new_links,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Mutex;
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::classify::SecondaryResourcePolicy;
    use crate::models::PageResponse;
    use crate::summary::{EXIT_BROKEN, EXIT_OK};
    use crate::testutil::MockPageFetcher;

    const SEED: &str = "http://x/";

    fn site() -> Url {
        Url::parse(SEED).unwrap()
    }

    fn service(fetcher: MockPageFetcher) -> CrawlService<MockPageFetcher> {
        CrawlService::new(fetcher, ClassifyPolicy::default(), site())
    }

    fn service_ignoring(fetcher: MockPageFetcher, statuses: &[u16]) -> CrawlService<MockPageFetcher> {
        let policy = ClassifyPolicy::new(
            statuses.iter().copied().collect(),
            SecondaryResourcePolicy::default(),
        );
        CrawlService::new(fetcher, policy, site())
    }

    /// Reporter recording broken/ignored events for assertions.
    #[derive(Default)]
    struct RecordingReporter {
        events: Mutex<Vec<String>>,
    }

    impl CrawlReporter for RecordingReporter {
        fn report(&self, event: CrawlEvent<'_>) {
            let line = match event {
                CrawlEvent::Broken { link, .. } => format!("broken {link}"),
                CrawlEvent::Ignored { link, .. } => format!("ignored {link}"),
                CrawlEvent::Drained { rounds, .. } => format!("drained {rounds}"),
                CrawlEvent::RoundStarted {
                    round,
                    batch_size,
                    pending,
                } => format!("round {round}: {batch_size} popped, {pending} pending"),
                _ => return,
            };
            self.events.lock().unwrap().push(line);
        }
    }

    #[tokio::test]
    async fn clean_site_has_no_broken_links() {
        let fetcher = MockPageFetcher::new(5)
            .page(SEED, 200, r#"<a href="page2.html">2</a><a href="page3.html">3</a>"#)
            .page("http://x/page2.html", 200, "<p>two</p>")
            .page("http://x/page3.html", 200, "<p>three</p>");

        let summary = service(fetcher).run(SEED, &NullReporter).await;

        assert!(summary.broken.is_empty());
        assert_eq!(summary.found, 3);
        assert_eq!(summary.checked, 3);
        assert_eq!(summary.exit_code(false), EXIT_OK);
    }

    #[tokio::test]
    async fn ignored_status_lands_in_ignored() {
        let fetcher = MockPageFetcher::new(5)
            .page(SEED, 200, r#"<a href="private.html">p</a>"#)
            .status("http://x/private.html", 403);

        let summary = service_ignoring(fetcher, &[403]).run(SEED, &NullReporter).await;

        assert_eq!(summary.ignored, vec!["http://x/private.html"]);
        assert!(summary.broken.is_empty());
        assert_eq!(summary.exit_code(false), EXIT_OK);
    }

    #[tokio::test]
    async fn broken_links_fail_the_run_unless_dry_run() {
        let fetcher = MockPageFetcher::new(2)
            .page(SEED, 200, r#"<a href="missing.html">m</a><a href="down.html">d</a>"#)
            .failing("http://x/down.html", "net::ERR_CONNECTION_REFUSED");

        let reporter = RecordingReporter::default();
        let summary = service(fetcher).run(SEED, &reporter).await;

        assert_eq!(summary.broken, vec!["http://x/down.html", "http://x/missing.html"]);
        assert_eq!(summary.exit_code(false), EXIT_BROKEN);
        assert_eq!(summary.exit_code(true), EXIT_OK);

        let events = reporter.events.lock().unwrap();
        assert!(events.contains(&"broken http://x/missing.html".to_string()));
        assert!(events.contains(&"broken http://x/down.html".to_string()));
    }

    #[tokio::test]
    async fn context_placeholders_are_resolved_before_dispatch() {
        let fetcher = MockPageFetcher::new(5)
            .page(
                SEED,
                200,
                r#"<a href="{{ vars.api.host }}/health">h</a><a href="{{ vars.api.nope }}/health">n</a>"#,
            )
            .status("http://x/health", 200);
        let context = Context::from_value(json!({"api": {"host": "http://x"}}));

        let svc = service(fetcher.clone()).with_context(Some(context));
        let summary = svc.run(SEED, &NullReporter).await;

        let dispatched = fetcher.dispatched();
        assert!(dispatched.contains(&"http://x/health".to_string()));
        assert!(dispatched.contains(&"%7B%7B%20vars.api.nope%20%7D%7D/health".to_string()));
        assert!(!dispatched.iter().any(|l| l.contains("{{")));
        assert_eq!(summary.broken, vec!["%7B%7B%20vars.api.nope%20%7D%7D/health"]);
    }

    #[tokio::test]
    async fn failing_secondary_document_is_reported_under_its_own_url() {
        let fetcher = MockPageFetcher::new(5)
            .page(SEED, 200, r##"<a href="#/guide">guide</a>"##)
            .side(SEED, PageResponse::new("http://x/_sidebar.md", 404))
            .side(SEED, PageResponse::new("http://x/partial.md", 404))
            .page("http://x/#/guide", 200, "<p>guide</p>");

        let summary = service(fetcher.clone()).run(SEED, &NullReporter).await;

        assert_eq!(summary.broken, vec!["http://x/partial.md"]);
        assert!(!fetcher.dispatched().contains(&"http://x/partial.md".to_string()));
    }

    #[tokio::test]
    async fn cyclic_links_terminate_without_duplicate_dispatch() {
        let fetcher = MockPageFetcher::new(3)
            .page(SEED, 200, r#"<a href="a.html">a</a><a href="b.html">b</a>"#)
            .page("http://x/a.html", 200, r#"<a href="b.html">b</a><a href="/">home</a>"#)
            .page("http://x/b.html", 200, r#"<a href="a.html">a</a><a href="a.html#top">a</a>"#)
            .page("http://x/a.html#top", 200, r#"<a href="b.html">b</a>"#);

        let summary = service(fetcher.clone()).run(SEED, &NullReporter).await;

        let dispatched = fetcher.dispatched();
        let unique: HashSet<_> = dispatched.iter().collect();
        assert_eq!(unique.len(), dispatched.len());
        assert_eq!(dispatched.len(), 4);
        assert_eq!(summary.checked, 4);
        assert!(summary.broken.is_empty());
    }

    #[tokio::test]
    async fn concurrency_never_exceeds_pool_size() {
        let body: String = (0..10)
            .map(|i| format!(r#"<a href="p{i}.html">{i}</a>"#))
            .collect();
        let mut fetcher = MockPageFetcher::new(3)
            .with_delay(Duration::from_millis(5))
            .page(SEED, 200, &body);
        for i in 0..10 {
            fetcher = fetcher.status(&format!("http://x/p{i}.html"), 200);
        }

        let reporter = RecordingReporter::default();
        let summary = service(fetcher.clone()).run(SEED, &reporter).await;

        assert_eq!(summary.checked, 11);
        assert!(fetcher.peak_concurrency() <= 3);
        assert!(fetcher.calls.lock().unwrap().iter().all(|(worker, _)| *worker < 3));
        // 1 seed round + ceil(10 / 3) rounds
        let events = reporter.events.lock().unwrap();
        assert!(events.contains(&"drained 5".to_string()));
        let rounds: Vec<&str> = events
            .iter()
            .filter(|e| e.starts_with("round"))
            .map(String::as_str)
            .collect();
        assert_eq!(
            rounds,
            vec![
                "round 1: 1 popped, 0 pending",
                "round 2: 3 popped, 7 pending",
                "round 3: 3 popped, 4 pending",
                "round 4: 3 popped, 1 pending",
                "round 5: 1 popped, 0 pending",
            ]
        );
    }

    #[tokio::test]
    async fn external_pages_are_checked_but_not_crawled() {
        let fetcher = MockPageFetcher::new(2)
            .page(SEED, 200, r#"<a href="https://example.com/">ext</a>"#)
            .page("https://example.com/", 200, r#"<a href="https://example.com/deep">deep</a>"#);

        let summary = service(fetcher.clone()).run(SEED, &NullReporter).await;

        assert_eq!(summary.checked, 2);
        assert!(!fetcher.dispatched().contains(&"https://example.com/deep".to_string()));
    }

    #[tokio::test]
    async fn broken_pages_are_not_crawled() {
        let fetcher = MockPageFetcher::new(2)
            .page(SEED, 200, r#"<a href="gone.html">g</a>"#)
            .page("http://x/gone.html", 404, r#"<a href="hidden.html">h</a>"#);

        let summary = service(fetcher.clone()).run(SEED, &NullReporter).await;

        assert_eq!(summary.broken, vec!["http://x/gone.html"]);
        assert!(!fetcher.dispatched().contains(&"http://x/hidden.html".to_string()));
    }

    #[tokio::test]
    async fn mailto_and_tel_links_are_never_dispatched() {
        let fetcher = MockPageFetcher::new(2).page(
            SEED,
            200,
            r#"<a href="mailto:a@b.c">m</a><a href="tel:+100">t</a>"#,
        );

        let summary = service(fetcher.clone()).run(SEED, &NullReporter).await;

        assert_eq!(fetcher.dispatched(), vec![SEED.to_string()]);
        assert_eq!(summary.found, 1);
    }

    #[tokio::test]
    async fn relative_links_resolve_against_redirect_target() {
        let fetcher = MockPageFetcher::new(2)
            .page(SEED, 200, r#"<a href="docs">docs</a>"#)
            .redirected("http://x/docs", "http://x/docs/", r#"<a href="intro.html">i</a>"#)
            .page("http://x/docs/intro.html", 200, "");

        let summary = service(fetcher.clone()).run(SEED, &NullReporter).await;

        assert!(!summary.has_broken());
        assert_eq!(summary.checked, 3);
        assert!(fetcher.dispatched().contains(&"http://x/docs/intro.html".to_string()));
        assert!(!fetcher.dispatched().contains(&"http://x/intro.html".to_string()));
    }

    #[tokio::test]
    async fn first_classification_wins_across_pages() {
        let fetcher = MockPageFetcher::new(1)
            .page(SEED, 200, r#"<a href="a.html">a</a><a href="b.html">b</a>"#)
            .page("http://x/a.html", 200, "")
            .side("http://x/a.html", PageResponse::new("http://x/missing.md", 404))
            .page("http://x/b.html", 200, "")
            .side("http://x/b.html", PageResponse::new("http://x/missing.md", 404));

        let reporter = RecordingReporter::default();
        let summary = service(fetcher).run(SEED, &reporter).await;

        assert_eq!(summary.broken, vec!["http://x/missing.md"]);
        let broken_events = reporter
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| e.starts_with("broken"))
            .count();
        assert_eq!(broken_events, 1);
    }
}
