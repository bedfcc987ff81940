//! Final run report and exit status.

use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::error::AppError;
use crate::models::Link;

/// Exit status when no broken links were found (or dry-run is on).
pub const EXIT_OK: u8 = 0;
/// Exit status when broken links were found.
pub const EXIT_BROKEN: u8 = 1;
/// Exit status for fatal configuration or infrastructure errors.
pub const EXIT_FATAL: u8 = 2;

/// Immutable summary of a finished crawl.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunSummary {
    pub found: usize,
    pub checked: usize,
    /// Sorted for stable output.
    pub broken: Vec<Link>,
    /// Sorted for stable output.
    pub ignored: Vec<Link>,
    #[serde(rename = "elapsed_secs", serialize_with = "serialize_secs")]
    pub elapsed: Duration,
}

fn serialize_secs<S: serde::Serializer>(elapsed: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(elapsed.as_secs_f64())
}

impl RunSummary {
    pub fn new(
        found: usize,
        checked: usize,
        mut broken: Vec<Link>,
        mut ignored: Vec<Link>,
        elapsed: Duration,
    ) -> Self {
        broken.sort();
        ignored.sort();
        Self {
            found,
            checked,
            broken,
            ignored,
            elapsed,
        }
    }

    pub fn has_broken(&self) -> bool {
        !self.broken.is_empty()
    }

    /// Pretty-printed JSON rendering of the summary.
    pub fn to_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Process exit status for this run.
    pub fn exit_code(&self, dry_run: bool) -> u8 {
        if self.has_broken() && !dry_run {
            EXIT_BROKEN
        } else {
            EXIT_OK
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Summary ===")?;
        writeln!(f, "Elapsed Time: {:.3} seconds", self.elapsed.as_secs_f64())?;
        writeln!(f, "Found Links: {}", self.found)?;
        writeln!(f, "Checked Links: {}", self.checked)?;
        writeln!(f, "Broken Links: {}", self.broken.len())?;
        writeln!(f, "Ignored Links (--ignore-statuses): {}", self.ignored.len())?;

        if !self.ignored.is_empty() {
            writeln!(f, "\nIgnored links:")?;
            for link in &self.ignored {
                writeln!(f, "- {link}")?;
            }
        }

        if self.has_broken() {
            writeln!(f, "\nBroken links were detected:")?;
            for link in &self.broken {
                writeln!(f, "- {link}")?;
            }
        } else {
            writeln!(f, "All checks passed, no broken links detected...")?;
        }

        Ok(())
    }
}
