//! One reporting pass: check every tracked version, then post either a
//! failure alert or, when everything is green, a periodic keepalive.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::ci::history::{self, ListingRunSource, RunSource};
use crate::ci::results::{check_version, FailedRun, VersionOutcome};
use crate::ci::{CheckError, Transport};
use crate::config::ReporterConfig;
use crate::notify::{compose, deliver, Message, Notifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MessageKind {
    FailureAlert,
    Keepalive,
}

/// What a reporting pass did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ReportOutcome {
    /// At least one latest run failed and the alert was posted.
    FailureAlert { failed_versions: Vec<String> },
    /// Everything passed and the streak condition held.
    Keepalive { min_streak: usize },
    /// Nothing to send. `min_streak` is set when the history scan ran.
    Quiet { min_streak: Option<usize> },
    /// A message was due but could not be composed or posted.
    SendFailed { kind: MessageKind, error: String },
}

pub struct Reporter {
    config: ReporterConfig,
    group_id: Option<String>,
    transport: Arc<dyn Transport>,
    runs: Arc<dyn RunSource>,
    notifier: Arc<dyn Notifier>,
}

impl Reporter {
    pub fn new(
        config: ReporterConfig,
        group_id: Option<String>,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let runs = Arc::new(ListingRunSource::new(transport.clone(), config.ci.clone()));
        Self {
            config,
            group_id,
            transport,
            runs,
            notifier,
        }
    }

    /// Replace the listing scrape with another run source.
    pub fn with_run_source(mut self, runs: Arc<dyn RunSource>) -> Self {
        self.runs = runs;
        self
    }

    /// Run one pass. Per-version problems are logged and skipped; the pass
    /// itself never fails.
    pub async fn run(&self) -> ReportOutcome {
        let failed = self.check_latest_runs().await;

        if !failed.is_empty() {
            return self.send_failure_alert(&failed).await;
        }

        info!("all jobs passed, checking for keepalive message");
        if !self.config.keepalive_enabled() {
            return ReportOutcome::Quiet { min_streak: None };
        }
        self.maybe_send_keepalive().await
    }

    async fn check_latest_runs(&self) -> Vec<FailedRun> {
        let mut failed = Vec::new();
        for version in &self.config.versions {
            let result = check_version(
                self.transport.as_ref(),
                &self.config.ci,
                version,
                self.config.variant,
            )
            .await;
            match result {
                Ok(VersionOutcome::Passed { build }) => {
                    info!(version = %version.version, %build, "latest job passed");
                }
                Ok(VersionOutcome::Failed(run)) => {
                    warn!(
                        version = %run.version,
                        build = %run.run.build,
                        url = %run.run.url,
                        finished_at = %run.finished_at,
                        "latest job failed"
                    );
                    failed.push(run);
                }
                Err(e @ CheckError::StillRunning { .. }) => {
                    info!(version = %version.version, "{}", e);
                }
                Err(e) => {
                    warn!(version = %version.version, error = %e, "skipping version");
                }
            }
        }
        failed
    }

    async fn send_failure_alert(&self, failed: &[FailedRun]) -> ReportOutcome {
        let failed_versions: Vec<String> = failed.iter().map(|f| f.version.clone()).collect();
        let message = match compose::failure_alert(failed, self.group_id.as_deref()) {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, "failed to compose failure alert");
                return ReportOutcome::SendFailed {
                    kind: MessageKind::FailureAlert,
                    error: e.to_string(),
                };
            }
        };

        match self.post(MessageKind::FailureAlert, &message).await {
            Some(failure) => failure,
            None => ReportOutcome::FailureAlert { failed_versions },
        }
    }

    async fn maybe_send_keepalive(&self) -> ReportOutcome {
        let mut streaks = Vec::with_capacity(self.config.versions.len());
        for version in &self.config.versions {
            let streak = history::version_streak(
                self.runs.as_ref(),
                self.transport.as_ref(),
                &self.config.ci,
                version,
            )
            .await;
            streaks.push(streak);
        }
        let min_streak = streaks.iter().copied().min().unwrap_or(0);

        if !history::keepalive_due(&streaks, self.config.keepalive.period) {
            info!(min_streak, "condition for sending a keepalive message is not satisfied");
            return ReportOutcome::Quiet {
                min_streak: Some(min_streak),
            };
        }

        let pages: Vec<(String, String)> = self
            .config
            .versions
            .iter()
            .map(|v| {
                let urls = self.config.ci.urls_for(v);
                (v.version.clone(), urls.history_page().to_string())
            })
            .collect();
        let message = compose::keepalive(&pages, self.config.keepalive.period);

        match self.post(MessageKind::Keepalive, &message).await {
            Some(failure) => failure,
            None => ReportOutcome::Keepalive { min_streak },
        }
    }

    /// Deliver `message`; `Some` carries the failure outcome.
    async fn post(&self, kind: MessageKind, message: &Message) -> Option<ReportOutcome> {
        match deliver(self.notifier.as_ref(), message).await {
            Ok(_) => {
                info!(?kind, "successfully sent Slack message");
                None
            }
            Err(e) => {
                error!(?kind, error = %e, "failed to send Slack message");
                Some(ReportOutcome::SendFailed {
                    kind,
                    error: e.to_string(),
                })
            }
        }
    }
}
