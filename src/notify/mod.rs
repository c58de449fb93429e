//! Chat notifications: message model, composition and delivery to Slack.

pub mod blocks;
pub mod compose;

use std::sync::Mutex;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use self::blocks::Block;
use crate::config::{Credentials, SlackConfig};

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("environment variable HCO_CHANNEL_ID not set")]
    MissingChannel,
    #[error("environment variable HCO_GROUP_ID not set")]
    MissingGroup,
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to post message: {0}")]
    Send(String),
}

/// An ordered list of blocks plus the plain-text notification fallback.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Message {
    pub text: String,
    pub blocks: Vec<Block>,
}

impl Message {
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

/// Delivers one message to the configured chat channel.
#[async_trait::async_trait]
pub trait Notifier: Send + Sync {
    async fn post(&self, message: &Message) -> Result<(), NotifyError>;
}

/// Post `message` unless it is empty. Returns whether a post was made.
pub async fn deliver(notifier: &dyn Notifier, message: &Message) -> Result<bool, NotifyError> {
    if message.is_empty() {
        tracing::debug!("empty message, nothing to send");
        return Ok(false);
    }
    notifier.post(message).await?;
    Ok(true)
}

// ---------------------------------------------------------------------------
// Slack Web API
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct PostMessageRequest<'a> {
    channel: &'a str,
    text: &'a str,
    blocks: &'a [Block],
}

#[derive(Deserialize)]
struct PostMessageResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
}

/// `chat.postMessage` over HTTPS with a bot token.
pub struct SlackNotifier {
    client: Client,
    api_url: String,
    token: String,
    channel_id: Option<String>,
}

impl SlackNotifier {
    pub fn new(config: &SlackConfig, credentials: &Credentials) -> Result<Self, NotifyError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(NotifyError::Client)?;
        Ok(Self {
            client,
            api_url: config.api_url.clone(),
            token: credentials.token.clone(),
            channel_id: credentials.channel_id.clone(),
        })
    }
}

#[async_trait::async_trait]
impl Notifier for SlackNotifier {
    async fn post(&self, message: &Message) -> Result<(), NotifyError> {
        let channel = self.channel_id.as_deref().ok_or(NotifyError::MissingChannel)?;
        let body = PostMessageRequest {
            channel,
            text: &message.text,
            blocks: &message.blocks,
        };

        let resp = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(|e| NotifyError::Send(e.to_string()))?
            .error_for_status()
            .map_err(|e| NotifyError::Send(e.to_string()))?;

        let reply: PostMessageResponse = resp
            .json()
            .await
            .map_err(|e| NotifyError::Send(format!("unreadable Slack response: {e}")))?;
        if !reply.ok {
            return Err(NotifyError::Send(
                reply.error.unwrap_or_else(|| "unknown Slack error".to_string()),
            ));
        }

        tracing::info!(%channel, blocks = message.blocks.len(), "posted Slack message");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Dry run
// ---------------------------------------------------------------------------

/// Prints messages as JSON instead of posting them, and keeps a copy.
#[derive(Default)]
pub struct DryRunNotifier {
    sent: Mutex<Vec<Message>>,
    quiet: bool,
}

impl DryRunNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record without printing.
    pub fn quiet() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            quiet: true,
        }
    }

    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl Notifier for DryRunNotifier {
    async fn post(&self, message: &Message) -> Result<(), NotifyError> {
        if !self.quiet {
            let json = serde_json::to_string_pretty(message)
                .map_err(|e| NotifyError::Send(e.to_string()))?;
            println!("{}", json);
        }
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(message.clone());
        }
        Ok(())
    }
}
