//! Link classification: decides whether a fetched link is OK, broken or
//! ignored.
//!
//! The top-level navigation of a requested link and the responses loaded
//! while the page renders are classified by different rules. A failing
//! secondary *document* (for instance a markdown partial fetched by a
//! client-side router) is reported under its own URL, while unrelated side
//! resources are not tracked at all.

use std::collections::HashSet;

use url::Url;

use crate::models::{CrawlResult, Link, PageResponse, Verdict};

/// Decides which side-effect responses count as secondary documents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecondaryResourcePolicy {
    /// File extensions (without the dot) of secondary documents.
    pub extensions: Vec<String>,
    /// File names that are never treated as secondary documents.
    pub excluded_files: Vec<String>,
}

impl SecondaryResourcePolicy {
    pub fn new(extensions: Vec<String>, excluded_files: Vec<String>) -> Self {
        Self {
            extensions,
            excluded_files,
        }
    }

    /// A policy that treats no side resource as a secondary document.
    pub fn disabled() -> Self {
        Self::new(Vec::new(), Vec::new())
    }

    /// Returns true if `url` points at a secondary document.
    pub fn matches(&self, url: &str) -> bool {
        let path = match Url::parse(url) {
            Ok(parsed) => parsed.path().to_string(),
            Err(_) => url.split(['?', '#']).next().unwrap_or_default().to_string(),
        };
        let file_name = path.rsplit('/').next().unwrap_or_default();

        if self.excluded_files.iter().any(|f| f == file_name) {
            return false;
        }

        self.extensions.iter().any(|ext| {
            file_name
                .strip_suffix(ext.as_str())
                .is_some_and(|stem| stem.ends_with('.') && stem.len() > 1)
        })
    }
}

impl Default for SecondaryResourcePolicy {
    /// Markdown partials, excluding the docsify sidebar.
    fn default() -> Self {
        Self::new(vec!["md".to_string()], vec!["_sidebar.md".to_string()])
    }
}

/// Operator-configured classification rules.
#[derive(Debug, Clone, Default)]
pub struct ClassifyPolicy {
    /// Statuses that mark a link as ignored instead of broken.
    pub ignore_statuses: HashSet<u16>,
    pub secondary: SecondaryResourcePolicy,
}

impl ClassifyPolicy {
    pub fn new(ignore_statuses: HashSet<u16>, secondary: SecondaryResourcePolicy) -> Self {
        Self {
            ignore_statuses,
            secondary,
        }
    }

    fn is_ignored(&self, status: u16) -> bool {
        self.ignore_statuses.contains(&status)
    }
}

/// Classifies the top-level navigation of `requested`.
///
/// A missing response (timeout, DNS or TLS failure) is broken. A status
/// outside 200-299 is broken unless it is in the ignore set.
pub fn classify_navigation(
    requested: &str,
    primary: Option<&PageResponse>,
    policy: &ClassifyPolicy,
) -> (Link, Verdict) {
    let verdict = match primary.map(|r| r.status) {
        None => Verdict::Broken,
        Some(status) if policy.is_ignored(status) => Verdict::Ignored,
        Some(status) if !(200..=299).contains(&status) => Verdict::Broken,
        Some(_) => Verdict::Ok,
    };
    (requested.to_string(), verdict)
}

/// Classifies one response observed while `requested` was loading.
///
/// Returns `None` for side resources that are not tracked.
pub fn classify_response(
    requested: &str,
    response: &PageResponse,
    policy: &ClassifyPolicy,
) -> Option<(Link, Verdict)> {
    if response.url != requested {
        if response.status > 399 && policy.secondary.matches(&response.url) {
            return Some((response.url.clone(), Verdict::Broken));
        }
        return None;
    }

    let verdict = if policy.is_ignored(response.status) {
        Verdict::Ignored
    } else if response.status > 399 {
        Verdict::Broken
    } else {
        Verdict::Ok
    };
    Some((requested.to_string(), verdict))
}

/// Classifies everything a fetch produced.
///
/// The navigation verdict comes first; side responses that resolve to OK or
/// are untracked are dropped.
pub fn classify_result(result: &CrawlResult, policy: &ClassifyPolicy) -> Vec<(Link, Verdict)> {
    let mut verdicts = vec![classify_navigation(
        &result.requested,
        result.primary.as_ref(),
        policy,
    )];

    verdicts.extend(
        result
            .side_responses
            .iter()
            .filter_map(|response| classify_response(&result.requested, response, policy))
            .filter(|(_, verdict)| *verdict != Verdict::Ok),
    );

    verdicts
}
