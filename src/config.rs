//! TOML configuration for the CI reporter.
//!
//! A layered model: compiled-in defaults that match the production job set,
//! an optional TOML file (explicit path, `CI_REPORTER_CONFIG`, or the system
//! location), and credentials read once from the environment at startup.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Environment variable naming an alternative config file.
pub const CONFIG_ENV: &str = "CI_REPORTER_CONFIG";
/// Standard system location for the config file.
pub const SYSTEM_CONFIG_PATH: &str = "/etc/ci-reporter/ci-reporter.toml";

pub const TOKEN_ENV: &str = "HCO_REPORTER_SLACK_TOKEN";
pub const CHANNEL_ENV: &str = "HCO_CHANNEL_ID";
pub const GROUP_ENV: &str = "HCO_GROUP_ID";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Root configuration for one reporter invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReporterConfig {
    #[serde(default)]
    pub variant: Variant,
    #[serde(default)]
    pub ci: CiConfig,
    #[serde(default = "default_versions")]
    pub versions: Vec<TrackedVersion>,
    #[serde(default)]
    pub keepalive: KeepaliveConfig,
    #[serde(default)]
    pub slack: SlackConfig,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            variant: Variant::default(),
            ci: CiConfig::default(),
            versions: default_versions(),
            keepalive: KeepaliveConfig::default(),
            slack: SlackConfig::default(),
        }
    }
}

impl ReporterConfig {
    /// Load configuration from a TOML file at `path`.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Self = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        config.validate()?;
        info!(path = %path.display(), "loaded reporter configuration");
        Ok(config)
    }

    /// Resolve the configuration for this invocation.
    ///
    /// An explicit path must load; otherwise `CI_REPORTER_CONFIG`, then
    /// the system path, then compiled-in defaults are tried in order.
    pub fn resolve(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        if let Ok(env_path) = std::env::var(CONFIG_ENV) {
            let path = PathBuf::from(env_path);
            match Self::load(&path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "CI_REPORTER_CONFIG set but file could not be loaded, trying fallback"
                    );
                }
            }
        }

        let system_path = Path::new(SYSTEM_CONFIG_PATH);
        if system_path.exists() {
            match Self::load(system_path) {
                Ok(cfg) => return Ok(cfg),
                Err(e) => {
                    warn!(
                        path = %system_path.display(),
                        error = %e,
                        "system config file exists but could not be loaded, using defaults"
                    );
                }
            }
        }

        debug!("no config file found, using compiled-in defaults");
        Ok(Self::default())
    }

    fn validate(&self) -> Result<()> {
        if self.versions.is_empty() {
            anyhow::bail!("config must track at least one version");
        }
        if self.keepalive.period == 0 {
            anyhow::bail!("keepalive.period must be greater than zero");
        }
        Ok(())
    }

    /// Whether this variant runs the history scan and keepalive path.
    pub fn keepalive_enabled(&self) -> bool {
        self.variant == Variant::Deploy && self.keepalive.enabled
    }
}

// ---------------------------------------------------------------------------
// Variant
// ---------------------------------------------------------------------------

/// Which reporter flavour this invocation behaves as.
///
/// The two flavours disagree on what an unparseable status document means;
/// both skip the version, but they report it differently.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Unparseable status means the run is still in progress. Enables the
    /// history scan and keepalive message.
    #[default]
    Deploy,
    /// Unparseable status is a plain parse failure. No keepalive.
    Informing,
}

// ---------------------------------------------------------------------------
// CI service
// ---------------------------------------------------------------------------

/// Location of the CI results service and its URL layout.
///
/// Templates accept `{host}`, `{job}` and `{version}` placeholders.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CiConfig {
    pub host: String,
    /// Job name for a version when the version entry does not name one.
    pub job_template: String,
    /// Directory holding every run of a job; also the listing page.
    pub logs_url_template: String,
    /// Human-facing job history page linked from the keepalive message.
    pub history_url_template: String,
    /// Substring a listing href must contain to count as a run.
    pub run_path_marker: String,
    /// Substring that marks the latest-build pointer link in a listing.
    pub latest_build_marker: String,
    pub timeout_secs: u64,
}

impl Default for CiConfig {
    fn default() -> Self {
        Self {
            host: "https://gcsweb-ci.apps.ci.l2s4.p1.openshiftapps.com".to_string(),
            job_template:
                "periodic-ci-openshift-release-master-cnv-nightly-{version}-deploy-azure-kubevirt-ovn"
                    .to_string(),
            logs_url_template: "{host}/gcs/test-platform-results/logs/{job}/".to_string(),
            history_url_template:
                "https://prow.ci.openshift.org/job-history/gs/test-platform-results/logs/{job}"
                    .to_string(),
            run_path_marker: "/gcs/test-platform-results/logs/".to_string(),
            latest_build_marker: "latest-build".to_string(),
            timeout_secs: 30,
        }
    }
}

impl CiConfig {
    /// Every URL the pipeline needs for one tracked version.
    pub fn urls_for(&self, version: &TrackedVersion) -> JobUrls {
        let job = version.job.clone().unwrap_or_else(|| {
            self.job_template.replace("{version}", &version.version)
        });
        let render = |template: &str| {
            template
                .replace("{host}", &self.host)
                .replace("{job}", &job)
                .replace("{version}", &version.version)
        };
        let mut logs = render(&self.logs_url_template);
        if !logs.ends_with('/') {
            logs.push('/');
        }

        JobUrls {
            host: self.host.trim_end_matches('/').to_string(),
            logs,
            history: render(&self.history_url_template),
        }
    }
}

/// URLs for one tracked version, derived from [`CiConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobUrls {
    host: String,
    logs: String,
    history: String,
}

impl JobUrls {
    /// Directory listing of every run of this job.
    pub fn listing(&self) -> &str {
        &self.logs
    }

    /// Plain-text pointer to the newest build identifier.
    pub fn latest_build(&self) -> String {
        format!("{}latest-build.txt", self.logs)
    }

    pub fn finished(&self, build: &str) -> String {
        format!("{}{}/finished.json", self.logs, build)
    }

    pub fn prowjob(&self, build: &str) -> String {
        format!("{}{}/prowjob.json", self.logs, build)
    }

    pub fn history_page(&self) -> &str {
        &self.history
    }

    /// Status document for a run discovered through the listing page.
    pub fn run_finished(&self, href: &str) -> String {
        format!("{}{}/finished.json", self.host, href.trim_end_matches('/'))
    }
}

// ---------------------------------------------------------------------------
// Tracked versions
// ---------------------------------------------------------------------------

/// One release branch monitored independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedVersion {
    pub version: String,
    /// Explicit job name; derived from `ci.job_template` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job: Option<String>,
}

impl TrackedVersion {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            job: None,
        }
    }
}

fn default_versions() -> Vec<TrackedVersion> {
    ["4.16", "4.17", "4.18", "4.19", "4.20"]
        .into_iter()
        .map(TrackedVersion::new)
        .collect()
}

// ---------------------------------------------------------------------------
// Keepalive
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeepaliveConfig {
    pub enabled: bool,
    /// A keepalive goes out when the smallest streak is a positive multiple of this.
    pub period: usize,
}

impl Default for KeepaliveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            period: 7,
        }
    }
}

// ---------------------------------------------------------------------------
// Slack
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackConfig {
    /// `chat.postMessage` endpoint.
    pub api_url: String,
    pub timeout_secs: u64,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            api_url: "https://slack.com/api/chat.postMessage".to_string(),
            timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Log line format for the binary. Logging is set up before any config file
/// is read, so this is a command-line setting only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Secrets and Slack identifiers, read once from the environment.
#[derive(Clone)]
pub struct Credentials {
    pub token: String,
    pub channel_id: Option<String>,
    pub group_id: Option<String>,
}

impl Credentials {
    /// Read credentials from the process environment.
    ///
    /// A missing or empty token is fatal. Channel and group stay optional
    /// here and fail the send step instead.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let token = lookup(TOKEN_ENV)
            .filter(|t| !t.is_empty())
            .with_context(|| format!("{TOKEN_ENV} environment variable is required"))?;
        Ok(Self {
            token,
            channel_id: lookup(CHANNEL_ENV),
            group_id: lookup(GROUP_ENV),
        })
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("channel_id", &self.channel_id)
            .field("group_id", &self.group_id)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
