use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::fetch::{
    EnableParams, EventRequestPaused, FailRequestParams, RequestPattern, RequestStage,
};
use chromiumoxide::cdp::browser_protocol::network::{
    ErrorReason, EventResponseReceived, ResourceType, SetCacheDisabledParams,
};
use chromiumoxide::cdp::browser_protocol::page::FrameId;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use ssblc_core::config::CrawlConfig;
use ssblc_core::error::AppError;
use ssblc_core::links::is_same_origin;
use ssblc_core::models::{CrawlResult, PageResponse};
use ssblc_core::traits::PageFetcher;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use url::Url;

/// Page a worker tab is reset to before every navigation.
const BLANK_PAGE: &str = "about:blank";

/// Sub-resource types a worker never downloads.
const BLOCKED_RESOURCES: [ResourceType; 3] =
    [ResourceType::Image, ResourceType::Stylesheet, ResourceType::Font];

/// Settings for a [`BrowserPool`].
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Number of workers (browser tabs).
    pub size: usize,
    /// Timeout for every DevTools protocol call.
    pub protocol_timeout: Duration,
    /// Upper bound for one navigation including the settle window.
    pub page_load_timeout: Duration,
    /// A page is settled once no response arrived for this long.
    pub idle_window: Duration,
    /// Root of the site under test; only same-origin pages return a body.
    pub site: Url,
    /// Explicit Chrome/Chromium binary.
    pub chrome_bin: Option<PathBuf>,
}

impl PoolConfig {
    pub fn from_crawl(config: &CrawlConfig, site: Url) -> Self {
        Self {
            size: config.max_concurrent_checks,
            protocol_timeout: config.protocol_timeout,
            page_load_timeout: config.page_load_timeout,
            idle_window: config.idle_window,
            site,
            chrome_bin: config.chrome_bin.clone(),
        }
    }
}

/// A fixed pool of headless-Chromium tabs driven over the DevTools protocol.
///
/// One Chromium process is launched per pool; each worker is a long-lived
/// tab reused for every link it is handed. Workers have the HTTP cache
/// disabled and fail image, stylesheet and font requests up front, so a
/// navigation only loads what can contain or reference links.
///
/// # Example
///
/// ```rust,no_run
/// use ssblc_client::{BrowserPool, PoolConfig};
/// use ssblc_core::config::CrawlConfig;
/// use ssblc_core::traits::PageFetcher;
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let config = CrawlConfig::default();
/// let site = url::Url::parse(&config.seed())?;
/// let pool = BrowserPool::launch(PoolConfig::from_crawl(&config, site)).await?;
/// let result = pool.fetch_one(0, "http://localhost:3000/").await;
/// println!("{:?}", result.status());
/// pool.shutdown().await;
/// # Ok(())
/// # }
/// ```
pub struct BrowserPool {
    browser: Browser,
    workers: Vec<Page>,
    background: Vec<JoinHandle<()>>,
    config: PoolConfig,
}

impl BrowserPool {
    /// Launch Chromium and open `config.size` prepared worker tabs.
    ///
    /// Requires a Chromium / Chrome binary, see [`find_chrome_binary`].
    pub async fn launch(config: PoolConfig) -> Result<Self, AppError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .disable_default_args()
            .request_timeout(config.protocol_timeout);

        if let Some(bin) = find_chrome_binary(config.chrome_bin.as_ref()) {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        let browser_config = builder
            .arg("--headless=new")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--disable-popup-blocking")
            .arg("--disable-translate")
            .arg("--no-first-run")
            .build()
            .map_err(|e| AppError::BrowserError(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to launch browser: {e}")))?;

        // The CDP handler must be polled continuously for the connection to work.
        let mut background = vec![tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser CDP handler error: {e}");
                }
            }
        })];

        let mut workers = Vec::with_capacity(config.size);
        for worker in 0..config.size {
            let page = browser.new_page(BLANK_PAGE).await.map_err(|e| {
                AppError::BrowserError(format!("Failed to open worker {worker}: {e}"))
            })?;
            background.push(prepare_worker(&page).await?);
            workers.push(page);
        }

        tracing::debug!(workers = workers.len(), "Browser pool ready");

        Ok(Self {
            browser,
            workers,
            background,
            config,
        })
    }

    /// Close every worker tab and the browser.
    pub async fn shutdown(mut self) {
        for task in &self.background[1..] {
            task.abort();
        }
        for page in self.workers.drain(..) {
            if let Err(e) = page.close().await {
                tracing::debug!("Failed to close worker tab: {e}");
            }
        }
        if let Err(e) = self.browser.close().await {
            tracing::warn!("Failed to close browser: {e}");
        }
        let _ = self.browser.wait().await;
        for task in &self.background {
            task.abort();
        }
    }

    async fn navigate(&self, page: &Page, link: &str) -> Result<CrawlResult, AppError> {
        let timeout = self.config.page_load_timeout;
        let deadline = Instant::now() + timeout;

        // Start from a blank document so a link differing from the previous
        // one only by fragment still loads a new document.
        match tokio::time::timeout_at(deadline, page.goto(BLANK_PAGE)).await {
            Err(_) => return Err(AppError::Timeout(timeout.as_millis() as u64)),
            Ok(Err(e)) => {
                return Err(AppError::BrowserError(format!("Failed to reset worker tab: {e}")));
            }
            Ok(Ok(_)) => {}
        }

        let mut events = page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(|e| AppError::BrowserError(format!("Failed to observe responses: {e}")))?;

        match tokio::time::timeout_at(deadline, page.goto(link)).await {
            Err(_) => return Err(AppError::Timeout(timeout.as_millis() as u64)),
            Ok(Err(e)) => return Err(AppError::NavigationError(e.to_string())),
            Ok(Ok(_)) => {}
        }

        // Client-side rendering keeps fetching after `load`; wait until the
        // network has been quiet for one idle window.
        let mut seen: Vec<Arc<EventResponseReceived>> = Vec::new();
        loop {
            let idle_deadline = (Instant::now() + self.config.idle_window).min(deadline);
            match tokio::time::timeout_at(idle_deadline, events.next()).await {
                Ok(Some(event)) => seen.push(event),
                Ok(None) | Err(_) => break,
            }
        }

        let main_frame = page.mainframe().await.ok().flatten();
        let observed: Vec<ObservedResponse> = seen
            .iter()
            .map(|event| ObservedResponse::from_event(event, main_frame.as_ref()))
            .collect();

        let mut result = collect_result(link, &observed);

        let succeeded = result.status().is_some_and(|s| (200..=299).contains(&s));
        if succeeded && is_same_origin(link, &self.config.site) {
            match page.content().await {
                Ok(html) => result.body = Some(html),
                Err(e) => tracing::warn!(%link, "Failed to read page content: {e}"),
            }
        }

        Ok(result)
    }
}

impl PageFetcher for BrowserPool {
    fn pool_size(&self) -> usize {
        self.workers.len()
    }

    async fn fetch_one(&self, worker: usize, link: &str) -> CrawlResult {
        let page = &self.workers[worker % self.workers.len()];
        match self.navigate(page, link).await {
            Ok(result) => result,
            Err(e) => {
                if e.is_fatal() {
                    tracing::error!(%link, "Worker {worker} failed: {e}");
                }
                CrawlResult::failed(link, e.to_string())
            }
        }
    }
}

/// Disable the cache and fail heavy sub-resource requests for `page`.
///
/// Returns the task answering the paused requests.
async fn prepare_worker(page: &Page) -> Result<JoinHandle<()>, AppError> {
    page.execute(SetCacheDisabledParams::new(true))
        .await
        .map_err(|e| AppError::BrowserError(format!("Failed to disable cache: {e}")))?;

    let mut paused = page
        .event_listener::<EventRequestPaused>()
        .await
        .map_err(|e| AppError::BrowserError(format!("Failed to intercept requests: {e}")))?;

    let patterns: Vec<RequestPattern> = BLOCKED_RESOURCES
        .iter()
        .map(|resource| {
            RequestPattern::builder()
                .url_pattern("*")
                .resource_type(resource.clone())
                .request_stage(RequestStage::Request)
                .build()
        })
        .collect();

    page.execute(EnableParams::builder().patterns(patterns).build())
        .await
        .map_err(|e| AppError::BrowserError(format!("Failed to enable interception: {e}")))?;

    let page = page.clone();
    Ok(tokio::spawn(async move {
        while let Some(event) = paused.next().await {
            let fail = FailRequestParams::new(event.request_id.clone(), ErrorReason::BlockedByClient);
            if let Err(e) = page.execute(fail).await {
                tracing::debug!(url = %event.request.url, "Failed to block request: {e}");
            }
        }
    }))
}

/// The parts of a `Network.responseReceived` event the pool looks at.
#[derive(Debug, Clone, PartialEq)]
struct ObservedResponse {
    url: String,
    status: u16,
    /// The response is a document (page or frame), not a sub-resource.
    document: bool,
    /// Loaded by the tab's top-level frame.
    main_frame: bool,
    /// Identifies the document load the response belongs to.
    loader: String,
}

impl ObservedResponse {
    fn from_event(event: &EventResponseReceived, main_frame: Option<&FrameId>) -> Self {
        Self {
            url: event.response.url.clone(),
            status: u16::try_from(event.response.status).unwrap_or_default(),
            document: event.r#type == ResourceType::Document,
            main_frame: main_frame.is_none_or(|frame| event.frame_id.as_ref() == Some(frame)),
            loader: event.loader_id.inner().clone(),
        }
    }

    fn to_page_response(&self) -> PageResponse {
        PageResponse::new(self.url.clone(), self.status)
    }
}

/// Build the fetch result of `link` from the responses seen while it loaded.
///
/// The primary response is the last top-level document response; side
/// responses are the others loaded by that same document. A navigation that
/// committed without any document response stayed in the current document
/// (only the fragment changed) and counts as a successful load.
fn collect_result(link: &str, observed: &[ObservedResponse]) -> CrawlResult {
    let Some(index) = observed.iter().rposition(|r| r.document && r.main_frame) else {
        let mut result = CrawlResult::new(link, PageResponse::new(link, 200));
        result.side_responses = observed.iter().map(ObservedResponse::to_page_response).collect();
        return result;
    };

    let primary = &observed[index];
    let mut result = CrawlResult::new(link, primary.to_page_response());
    // Responses of an earlier document in this tab carry another loader.
    result.side_responses = observed
        .iter()
        .enumerate()
        .filter(|(i, r)| *i != index && r.loader == primary.loader)
        .map(|(_, r)| r.to_page_response())
        .collect();
    result
}

/// Tries to locate the real Chrome/Chromium binary.
///
/// An explicit path wins, then `$CHROME_BIN`. On systems where Chromium is
/// installed via **snap**, the wrapper at `/snap/bin/chromium` strips
/// unknown CLI flags, breaking headless mode, so the real binary inside the
/// snap is tried before well-known system paths. If nothing is found we
/// return `None` and let `chromiumoxide` do its own lookup.
pub fn find_chrome_binary(explicit: Option<&PathBuf>) -> Option<PathBuf> {
    let candidates: &[&str] = &[
        // Snap (Ubuntu default)
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        // Flatpak
        "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        // Common apt / manual installs
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ];

    if let Some(path) = explicit.filter(|p| p.exists()) {
        return Some(path.clone());
    }

    if let Ok(p) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(&p);
        if path.exists() {
            return Some(path);
        }
    }

    candidates
        .iter()
        .map(PathBuf::from)
        .find(|p| p.exists())
}
