//! Verdict for the latest run of a tracked version.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use super::{fetch_run_status, locator, CheckError, JobDocument, RunReference, Transport};
use crate::config::{CiConfig, TrackedVersion, Variant};

/// Result of checking one tracked version's latest run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum VersionOutcome {
    /// Latest run passed; nothing to report.
    Passed { build: String },
    Failed(FailedRun),
}

/// A tracked version whose latest run failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedRun {
    pub version: String,
    pub run: RunReference,
    pub finished_at: DateTime<Utc>,
}

/// Locate the latest run for `version` and decide whether it passed.
///
/// An unparseable or missing status document is reported according to the
/// variant: `StillRunning` for deploy, `MalformedStatus` for informing.
pub async fn check_version(
    transport: &dyn Transport,
    ci: &CiConfig,
    version: &TrackedVersion,
    variant: Variant,
) -> Result<VersionOutcome, CheckError> {
    let urls = ci.urls_for(version);
    let build = locator::latest_build(transport, &urls, version).await?;

    let status = fetch_run_status(transport, &urls.finished(&build))
        .await
        .map_err(|source| CheckError::Status {
            version: version.version.clone(),
            source,
        })?;

    let Some(status) = status else {
        return Err(match variant {
            Variant::Deploy => CheckError::StillRunning {
                version: version.version.clone(),
            },
            Variant::Informing => CheckError::MalformedStatus {
                version: version.version.clone(),
                build,
            },
        });
    };

    if status.passed {
        return Ok(VersionOutcome::Passed { build });
    }

    let url = job_url(transport, &urls.prowjob(&build), version).await?;
    let finished_at = status.finished_at().unwrap_or_else(|| {
        warn!(
            version = %version.version,
            timestamp = status.timestamp,
            "completion timestamp out of range, reporting epoch"
        );
        DateTime::default()
    });
    Ok(VersionOutcome::Failed(FailedRun {
        version: version.version.clone(),
        run: RunReference { build, url },
        finished_at,
    }))
}

/// Read the run's canonical URL from its job document.
async fn job_url(
    transport: &dyn Transport,
    url: &str,
    version: &TrackedVersion,
) -> Result<String, CheckError> {
    let job_url_error = |reason: String| CheckError::JobUrl {
        version: version.version.clone(),
        reason,
    };
    let body = transport
        .get_text(url)
        .await
        .map_err(|e| job_url_error(e.to_string()))?;
    let doc: JobDocument =
        serde_json::from_str(&body).map_err(|e| job_url_error(e.to_string()))?;
    Ok(doc.status.url)
}
