//! Crawl frontier: the worklist of discovered links plus the record of
//! outcomes for links already dispatched.
//!
//! The frontier is mutated only by the crawl driver between rounds, so it
//! needs no synchronisation of its own.

use std::collections::HashSet;
use std::time::Duration;

use crate::models::{Link, Verdict};
use crate::summary::RunSummary;

/// Set-based crawl state.
///
/// Invariants:
/// - `discovered` and `checked` are disjoint.
/// - a link enters `checked` at most once.
/// - `broken` and `ignored` are subsets of `checked`.
#[derive(Debug, Clone, Default)]
pub struct Frontier {
    discovered: HashSet<Link>,
    checked: HashSet<Link>,
    broken: HashSet<Link>,
    ignored: HashSet<Link>,
}

impl Frontier {
    /// Create a frontier holding a single seed link.
    pub fn new(seed: impl Into<Link>) -> Self {
        let mut frontier = Self::default();
        frontier.discovered.insert(seed.into());
        frontier
    }

    /// Add every link that is neither discovered nor checked yet.
    ///
    /// Returns how many links were new.
    pub fn merge(&mut self, links: impl IntoIterator<Item = Link>) -> usize {
        let mut added = 0;
        for link in links {
            if !self.checked.contains(&link) && self.discovered.insert(link) {
                added += 1;
            }
        }
        added
    }

    /// Remove up to `n` links from `discovered` and mark them checked.
    pub fn pop_batch(&mut self, n: usize) -> Vec<Link> {
        self.pop_batch_with(n, |link| link.to_string())
    }

    /// Like [`pop_batch`](Self::pop_batch), but maps every popped link
    /// through `resolve` first.
    ///
    /// The resolved form is what gets marked checked and returned. A link
    /// whose resolved form was already checked is dropped and the batch is
    /// topped up from the remaining discovered links.
    pub fn pop_batch_with<F>(&mut self, n: usize, mut resolve: F) -> Vec<Link>
    where
        F: FnMut(&str) -> Link,
    {
        let mut batch = Vec::with_capacity(n);

        while batch.len() < n {
            let Some(raw) = self.discovered.iter().next().cloned() else {
                break;
            };
            self.discovered.remove(&raw);

            let resolved = resolve(&raw);
            self.discovered.remove(&resolved);
            if self.checked.insert(resolved.clone()) {
                batch.push(resolved);
            } else {
                tracing::debug!(link = %raw, %resolved, "Already checked, skipping");
            }
        }

        batch
    }

    /// Record a classification. The first verdict for a link wins.
    ///
    /// Returns true if the frontier changed.
    pub fn record(&mut self, link: &str, verdict: Verdict) -> bool {
        match verdict {
            Verdict::Ok => false,
            Verdict::Broken => self.record_broken(link),
            Verdict::Ignored => self.record_ignored(link),
        }
    }

    /// Mark `link` broken unless it already has a verdict.
    pub fn record_broken(&mut self, link: &str) -> bool {
        if self.is_classified(link) {
            return false;
        }
        self.mark_checked(link);
        self.broken.insert(link.to_string())
    }

    /// Mark `link` ignored unless it already has a verdict.
    pub fn record_ignored(&mut self, link: &str) -> bool {
        if self.is_classified(link) {
            return false;
        }
        self.mark_checked(link);
        self.ignored.insert(link.to_string())
    }

    /// Side-resource verdicts may name links that were never dispatched;
    /// they are checked from now on so they are never fetched again.
    fn mark_checked(&mut self, link: &str) {
        self.discovered.remove(link);
        if !self.checked.contains(link) {
            self.checked.insert(link.to_string());
        }
    }

    fn is_classified(&self, link: &str) -> bool {
        self.broken.contains(link) || self.ignored.contains(link)
    }

    /// True once no work is left to dispatch.
    pub fn is_drained(&self) -> bool {
        self.discovered.is_empty()
    }

    pub fn discovered_count(&self) -> usize {
        self.discovered.len()
    }

    pub fn checked_count(&self) -> usize {
        self.checked.len()
    }

    /// Links found so far, dispatched or not.
    pub fn found_count(&self) -> usize {
        self.checked.len() + self.discovered.len()
    }

    pub fn is_checked(&self, link: &str) -> bool {
        self.checked.contains(link)
    }

    pub fn broken(&self) -> &HashSet<Link> {
        &self.broken
    }

    pub fn ignored(&self) -> &HashSet<Link> {
        &self.ignored
    }

    /// Freeze the final state into a summary.
    pub fn summarize(&self, elapsed: Duration) -> RunSummary {
        RunSummary::new(
            self.found_count(),
            self.checked_count(),
            self.broken.iter().cloned().collect(),
            self.ignored.iter().cloned().collect(),
            elapsed,
        )
    }
}
