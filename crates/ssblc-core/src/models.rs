use serde::Serialize;

/// An absolute URL, compared by exact string match.
///
/// Fragments are part of the identity: `/a.html` and `/a.html#x` are
/// distinct links.
pub type Link = String;

/// A single HTTP response observed while a page was loading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageResponse {
    /// URL the response was served for, as reported by the fetch engine.
    pub url: String,
    pub status: u16,
}

impl PageResponse {
    pub fn new(url: impl Into<String>, status: u16) -> Self {
        Self {
            url: url.into(),
            status,
        }
    }
}

/// Outcome of fetching one link.
///
/// The top-level navigation and the responses loaded as a side effect of
/// rendering are kept apart so a secondary failure can never be attributed
/// to the wrong requested link.
#[derive(Debug, Clone, Default)]
pub struct CrawlResult {
    /// The (already substituted) link that was dispatched.
    pub requested: Link,
    /// Response of the top-level navigation. `None` on timeout or
    /// transport failure.
    pub primary: Option<PageResponse>,
    /// Every other response seen while the page settled.
    pub side_responses: Vec<PageResponse>,
    /// Rendered markup; only present for same-origin pages.
    pub body: Option<String>,
    /// Why the navigation failed, when it did.
    pub error: Option<String>,
}

impl CrawlResult {
    /// A successful navigation without a body.
    pub fn new(requested: impl Into<Link>, primary: PageResponse) -> Self {
        Self {
            requested: requested.into(),
            primary: Some(primary),
            ..Default::default()
        }
    }

    /// A navigation that never produced a response.
    pub fn failed(requested: impl Into<Link>, error: impl Into<String>) -> Self {
        Self {
            requested: requested.into(),
            error: Some(error.into()),
            ..Default::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_side_response(mut self, response: PageResponse) -> Self {
        self.side_responses.push(response);
        self
    }

    /// Status of the top-level navigation, if any.
    pub fn status(&self) -> Option<u16> {
        self.primary.as_ref().map(|r| r.status)
    }
}

/// Classification assigned to a fetched link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Ok,
    Broken,
    Ignored,
}
