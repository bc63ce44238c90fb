//! Discord channel client — reads recent messages from channels over the
//! REST API (v10).
//!
//! The client knows nothing about domain semantics; it returns raw message
//! pages, newest first, and maps the platform's auth failures onto the
//! fetch error taxonomy.

use std::time::Duration;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::FetchError;

/// Messages fetched per request.
pub const FETCH_LIMIT: usize = 10;

/// Per-request timeout.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// ── Platform DTOs ───────────────────────────────────────────────────

/// One message as returned by the platform. Unknown fields are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct RawMessage {
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub embeds: Vec<Embed>,
}

/// Rich-content attachment on a message.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Embed {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<EmbedField>,
    pub footer: Option<EmbedFooter>,
    pub author: Option<EmbedAuthor>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbedField {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbedFooter {
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbedAuthor {
    pub name: Option<String>,
}

/// Channel metadata from `GET /channels/{id}`, used by the startup probe.
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelInfo {
    pub id: String,
    pub name: Option<String>,
}

// ── Client ──────────────────────────────────────────────────────────

/// Client for the Discord REST API.
#[derive(Clone)]
pub struct DiscordClient {
    api_base: String,
    bot_token: SecretString,
    client: reqwest::Client,
}

impl DiscordClient {
    /// Create a client against the given API base, e.g.
    /// `https://discord.com/api/v10` (tests point this at a local server).
    pub fn new(api_base: impl Into<String>, bot_token: SecretString) -> Self {
        Self {
            api_base: api_base.into(),
            bot_token,
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
        }
    }

    fn messages_url(&self, channel_id: &str) -> String {
        format!(
            "{}/channels/{}/messages?limit={}",
            self.api_base, channel_id, FETCH_LIMIT
        )
    }

    fn channel_url(&self, channel_id: &str) -> String {
        format!("{}/channels/{}", self.api_base, channel_id)
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.bot_token.expose_secret())
    }

    /// Fetch the most recent messages for a channel, newest first.
    ///
    /// When `since_id` is given, the page is truncated at (and excluding)
    /// the first message with that id, scanning newest to oldest. If the id
    /// does not appear in the page, the whole page is returned.
    pub async fn fetch(
        &self,
        channel_id: &str,
        since_id: Option<&str>,
    ) -> Result<Vec<RawMessage>, FetchError> {
        let resp = self
            .client
            .get(self.messages_url(channel_id))
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        triage_status(resp.status(), channel_id)?;
        let messages: Vec<RawMessage> = resp.json().await?;

        Ok(match since_id {
            Some(marker) => truncate_at(messages, marker),
            None => messages,
        })
    }

    /// Check that the bot can read a channel, returning its metadata.
    ///
    /// Used at startup to log per-channel access. Failures are reported,
    /// never fatal.
    pub async fn probe(&self, channel_id: &str) -> Result<ChannelInfo, FetchError> {
        let resp = self
            .client
            .get(self.channel_url(channel_id))
            .header("Authorization", self.auth_header())
            .send()
            .await?;

        triage_status(resp.status(), channel_id)?;
        Ok(resp.json().await?)
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a platform response status onto the fetch error taxonomy.
fn triage_status(status: StatusCode, channel_id: &str) -> Result<(), FetchError> {
    match status {
        status if status.is_success() => Ok(()),
        StatusCode::UNAUTHORIZED => Err(FetchError::Unauthorized),
        StatusCode::FORBIDDEN => Err(FetchError::AccessDenied {
            channel_id: channel_id.to_string(),
        }),
        StatusCode::NOT_FOUND => Err(FetchError::NotFound {
            channel_id: channel_id.to_string(),
        }),
        status => Err(FetchError::Transport(format!(
            "unexpected status {} from channel {}",
            status, channel_id
        ))),
    }
}

/// Truncate a newest-first page at the first occurrence of `marker`,
/// dropping the marker itself and everything older.
fn truncate_at(messages: Vec<RawMessage>, marker: &str) -> Vec<RawMessage> {
    match messages.iter().position(|m| m.id == marker) {
        Some(idx) => messages.into_iter().take(idx).collect(),
        None => messages,
    }
}

// ── Tests ───────────────────────────────────────────────────────────
