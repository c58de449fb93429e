//! ci-reporter -- scheduled CI results reporter for Slack.
//!
//! Polls the CI results service for a fixed set of tracked release
//! branches, alerts a Slack channel when a branch's latest run failed, and
//! sends a periodic keepalive when every branch has stayed green.

pub mod ci;
pub mod config;
pub mod notify;
pub mod report;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use crate::ci::HttpTransport;
use crate::config::{Credentials, ReporterConfig};
use crate::notify::{DryRunNotifier, Notifier, SlackNotifier};
use crate::report::{ReportOutcome, Reporter};

/// Run one reporting pass against the live CI service.
///
/// With `dry_run` the composed message is printed instead of posted.
pub async fn run(
    config: ReporterConfig,
    credentials: &Credentials,
    dry_run: bool,
) -> Result<ReportOutcome> {
    let transport = Arc::new(HttpTransport::new(Duration::from_secs(
        config.ci.timeout_secs,
    ))?);
    let notifier: Arc<dyn Notifier> = if dry_run {
        Arc::new(DryRunNotifier::new())
    } else {
        Arc::new(SlackNotifier::new(&config.slack, credentials)?)
    };

    tracing::info!(
        versions = config.versions.len(),
        variant = ?config.variant,
        dry_run,
        "starting report"
    );
    let reporter = Reporter::new(config, credentials.group_id.clone(), transport, notifier);
    Ok(reporter.run().await)
}
