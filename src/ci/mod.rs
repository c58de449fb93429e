//! Access to the CI results service: latest-build pointers, run status
//! documents, job documents and run listings.

pub mod history;
pub mod locator;
pub mod memory;
pub mod results;

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Transport-level failure while talking to the CI service.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: StatusCode },
    #[error("failed to read body of {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    /// The resource does not exist (yet).
    pub fn is_not_found(&self) -> bool {
        matches!(self, FetchError::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

/// Why a tracked version produced no verdict this invocation.
///
/// Every variant is non-fatal: the version is logged and skipped.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("failed to fetch latest build for {version}: {source}")]
    LatestBuild {
        version: String,
        #[source]
        source: FetchError,
    },
    #[error("failed to fetch finished.json for {version}: {source}")]
    Status {
        version: String,
        #[source]
        source: FetchError,
    },
    #[error("{version} latest job is still running")]
    StillRunning { version: String },
    #[error("failed to parse finished.json for {version} build {build}")]
    MalformedStatus { version: String, build: String },
    #[error("failed to get job url for {version}: {reason}")]
    JobUrl { version: String, reason: String },
    #[error("failed to fetch run listing for {version}: {source}")]
    Listing {
        version: String,
        #[source]
        source: FetchError,
    },
}

/// Contents of a run's `finished.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStatus {
    /// Absent on aborted runs; absent means not passed.
    #[serde(default)]
    pub passed: bool,
    /// Completion time, UTC epoch seconds.
    #[serde(default)]
    pub timestamp: i64,
}

impl RunStatus {
    /// Parse a status document. `None` when the body is not a JSON object.
    pub fn parse(body: &str) -> Option<Self> {
        serde_json::from_str(body.trim()).ok()
    }

    pub fn finished_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp(self.timestamp, 0)
    }
}

/// The subset of `prowjob.json` the reporter reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobDocument {
    #[serde(default)]
    pub status: JobDocumentStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobDocumentStatus {
    #[serde(default)]
    pub url: String,
}

/// A run identifier plus its human-facing URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReference {
    pub build: String,
    pub url: String,
}

/// Fetch text documents from the CI service.
#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` and return the whitespace-trimmed body.
    async fn get_text(&self, url: &str) -> Result<String, FetchError>;
}

/// [`Transport`] over a shared `reqwest` client with a request timeout.
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("ci-reporter/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(FetchError::Client)?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        tracing::debug!(%url, "GET");
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let body = resp.text().await.map_err(|source| FetchError::Body {
            url: url.to_string(),
            source,
        })?;
        Ok(body.trim().to_string())
    }
}

/// Fetch and parse a status document.
///
/// `Ok(None)` covers both a missing document (HTTP 404) and a body that is
/// not valid status JSON; callers decide what that means.
pub async fn fetch_run_status(
    transport: &dyn Transport,
    url: &str,
) -> Result<Option<RunStatus>, FetchError> {
    match transport.get_text(url).await {
        Ok(body) => Ok(RunStatus::parse(&body)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
