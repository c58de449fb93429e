//! Run history scan: consecutive-pass streaks and the keepalive decision.

use std::ops::ControlFlow;
use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::{debug, info, warn};

use super::{fetch_run_status, CheckError, FetchError, Transport};
use crate::config::{CiConfig, JobUrls, TrackedVersion};

/// Source of run links for a tracked version, newest first.
#[async_trait::async_trait]
pub trait RunSource: Send + Sync {
    async fn list_runs(&self, version: &TrackedVersion) -> Result<Vec<String>, CheckError>;
}

/// [`RunSource`] that scrapes the CI directory listing page.
pub struct ListingRunSource {
    transport: Arc<dyn Transport>,
    ci: CiConfig,
}

impl ListingRunSource {
    pub fn new(transport: Arc<dyn Transport>, ci: CiConfig) -> Self {
        Self { transport, ci }
    }
}

#[async_trait::async_trait]
impl RunSource for ListingRunSource {
    async fn list_runs(&self, version: &TrackedVersion) -> Result<Vec<String>, CheckError> {
        let urls = self.ci.urls_for(version);
        let html = self
            .transport
            .get_text(urls.listing())
            .await
            .map_err(|source| CheckError::Listing {
                version: version.version.clone(),
                source,
            })?;
        let mut links =
            extract_run_links(&html, &self.ci.run_path_marker, &self.ci.latest_build_marker);
        sort_newest_first(&mut links);
        debug!(version = %version.version, runs = links.len(), "listed runs");
        Ok(links)
    }
}

fn anchor_href() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?is)<a\b[^>]*?\shref\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
            .expect("anchor pattern is valid")
    })
}

/// Every anchor `href` that points at a run directory.
///
/// Keeps links containing `run_marker` and drops those containing
/// `exclude_marker` (the latest-build pointer).
pub fn extract_run_links(html: &str, run_marker: &str, exclude_marker: &str) -> Vec<String> {
    anchor_href()
        .captures_iter(html)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|m| m.as_str())
        .filter(|href| href.contains(run_marker) && !href.contains(exclude_marker))
        .map(str::to_string)
        .collect()
}

/// Run identifiers sort as text, so descending order is newest first.
pub fn sort_newest_first(links: &mut [String]) {
    links.sort_unstable_by(|a, b| b.cmp(a));
}

/// Running count of leading passes in a newest-first walk.
///
/// `None` marks a run without a readable status document; it is skipped.
/// The first failure ends the streak.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Streak {
    passes: usize,
}

impl Streak {
    pub fn observe(&mut self, passed: Option<bool>) -> ControlFlow<()> {
        match passed {
            None => ControlFlow::Continue(()),
            Some(true) => {
                self.passes += 1;
                ControlFlow::Continue(())
            }
            Some(false) => ControlFlow::Break(()),
        }
    }

    pub fn passes(&self) -> usize {
        self.passes
    }
}

/// Count leading passes in an already-known sequence of outcomes.
pub fn count_leading_passes(outcomes: impl IntoIterator<Item = Option<bool>>) -> usize {
    let mut streak = Streak::default();
    for outcome in outcomes {
        if streak.observe(outcome).is_break() {
            break;
        }
    }
    streak.passes()
}

/// Walk `runs` in order, fetching each status document until the first
/// failure. Fetches stop at the failing run.
///
/// A run answering with an HTTP error status is skipped like an unreadable
/// document; only transport failures abort the walk.
pub async fn consecutive_passes(
    transport: &dyn Transport,
    urls: &JobUrls,
    runs: &[String],
) -> Result<usize, FetchError> {
    let mut streak = Streak::default();
    for href in runs {
        let status = match fetch_run_status(transport, &urls.run_finished(href)).await {
            Ok(status) => status,
            Err(e @ FetchError::Status { .. }) => {
                debug!(%href, error = %e, "status document unavailable");
                None
            }
            Err(e) => return Err(e),
        };
        match status {
            None => info!(%href, "finished.json has not been found"),
            Some(s) if s.passed => info!(%href, "job has passed, adding it to the streak"),
            Some(_) => info!(%href, "job has failed"),
        }
        if streak.observe(status.map(|s| s.passed)).is_break() {
            break;
        }
    }
    Ok(streak.passes())
}

/// Streak for one tracked version. Any listing or fetch failure counts as 0.
pub async fn version_streak(
    source: &dyn RunSource,
    transport: &dyn Transport,
    ci: &CiConfig,
    version: &TrackedVersion,
) -> usize {
    let runs = match source.list_runs(version).await {
        Ok(runs) => runs,
        Err(e) => {
            warn!(version = %version.version, error = %e, "failed to list runs");
            return 0;
        }
    };
    match consecutive_passes(transport, &ci.urls_for(version), &runs).await {
        Ok(count) => {
            info!(version = %version.version, streak = count, "consecutive passing runs");
            count
        }
        Err(e) => {
            warn!(version = %version.version, error = %e, "failed to walk run history");
            0
        }
    }
}

/// Keepalive is due when the smallest streak is a positive multiple of `period`.
pub fn keepalive_due(streaks: &[usize], period: usize) -> bool {
    match streaks.iter().min() {
        Some(&min) => period > 0 && min > 0 && min % period == 0,
        None => false,
    }
}
