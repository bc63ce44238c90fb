//! Poll orchestrator — walks the configured channels, runs extraction on
//! unseen messages and aggregates the batch.
//!
//! Channels are polled sequentially and fail independently: a fetch error
//! is logged and the channel is skipped, never fatal to the pass. Only
//! messages that actually yield an event are recorded in the seen store,
//! so unparseable messages are retried on the next pass.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::discord::{DiscordClient, RawMessage};
use crate::error::FetchError;
use crate::extract::{DiscoveryEvent, extract};
use crate::store::SeenStore;

/// Messages shown by the channel debug view.
const DEBUG_MESSAGE_LIMIT: usize = 5;

/// Preview truncation length, in characters.
const PREVIEW_CHARS: usize = 100;

// ── Source seam ─────────────────────────────────────────────────────

/// Source of raw messages for a poll pass. Implemented by the Discord
/// client; tests inject scripted sources.
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn fetch(
        &self,
        channel_id: &str,
        since_id: Option<&str>,
    ) -> Result<Vec<RawMessage>, FetchError>;
}

#[async_trait]
impl MessageSource for DiscordClient {
    async fn fetch(
        &self,
        channel_id: &str,
        since_id: Option<&str>,
    ) -> Result<Vec<RawMessage>, FetchError> {
        DiscordClient::fetch(self, channel_id, since_id).await
    }
}

// ── Outcome types ───────────────────────────────────────────────────

/// Aggregated result of one poll pass.
#[derive(Debug)]
pub struct PollOutcome {
    /// Extracted events, newest first across all channels.
    pub events: Vec<DiscoveryEvent>,
    /// Channels that were fetched successfully this pass.
    pub processed_channels: usize,
    pub total_channels: usize,
}

/// Availability snapshot of one configured channel.
#[derive(Debug, Serialize)]
pub struct ChannelStatus {
    pub channel_id: String,
    pub status: &'static str,
    pub available_count: usize,
    pub processed_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Debug view of one channel: fetched page size plus the raw and extracted
/// view of its most recent messages.
#[derive(Debug, Serialize)]
pub struct ChannelDebug {
    pub total_messages: usize,
    pub messages: Vec<MessageDebug>,
}

/// Raw and extracted view of one recent message, for diagnosing pattern
/// misses without tailing the upstream bot.
#[derive(Debug, Serialize)]
pub struct MessageDebug {
    pub message_id: String,
    pub has_embeds: bool,
    pub content_preview: String,
    pub embed_title: Option<String>,
    pub embed_description: Option<String>,
    pub extracted: Option<DiscoveryEvent>,
}

// ── Orchestrator ────────────────────────────────────────────────────

/// Walks the configured channels and turns unseen messages into events.
pub struct Poller {
    source: Arc<dyn MessageSource>,
    store: Arc<SeenStore>,
    channel_ids: Vec<String>,
}

impl Poller {
    pub fn new(
        source: Arc<dyn MessageSource>,
        store: Arc<SeenStore>,
        channel_ids: Vec<String>,
    ) -> Self {
        Self {
            source,
            store,
            channel_ids,
        }
    }

    pub fn channel_ids(&self) -> &[String] {
        &self.channel_ids
    }

    /// Poll every configured channel once, sequentially.
    ///
    /// `watermarks` maps channel id to the client's last seen message id;
    /// channels without an entry get the default most-recent window.
    pub async fn poll(&self, watermarks: &HashMap<String, String>) -> PollOutcome {
        let mut events = Vec::new();
        let mut processed_channels = 0;

        for channel_id in &self.channel_ids {
            let since_id = watermarks.get(channel_id).map(String::as_str);
            let messages = match self.source.fetch(channel_id, since_id).await {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(channel_id = %channel_id, error = %e, "Channel fetch failed, skipping");
                    continue;
                }
            };

            let mut found = 0;
            for message in &messages {
                if !self.store.is_new(channel_id, &message.id) {
                    continue;
                }
                if let Some(event) = extract(message, channel_id) {
                    self.store.mark_seen(channel_id, &message.id);
                    events.push(event);
                    found += 1;
                }
            }

            debug!(
                channel_id = %channel_id,
                fetched = messages.len(),
                found,
                "Channel polled"
            );
            processed_channels += 1;
        }

        // Newest first across channels. Snowflake ids are equal-width decimal
        // strings in practice, so the lexical order tracks creation order.
        events.sort_by(|a, b| b.message_id.cmp(&a.message_id));

        info!(
            events = events.len(),
            processed = processed_channels,
            total = self.channel_ids.len(),
            "Poll pass complete"
        );

        PollOutcome {
            events,
            processed_channels,
            total_channels: self.channel_ids.len(),
        }
    }

    /// Fresh availability check of every configured channel.
    pub async fn channel_status(&self) -> Vec<ChannelStatus> {
        let mut statuses = Vec::with_capacity(self.channel_ids.len());

        for channel_id in &self.channel_ids {
            let status = match self.source.fetch(channel_id, None).await {
                Ok(messages) => ChannelStatus {
                    channel_id: channel_id.clone(),
                    status: "online",
                    available_count: messages.len(),
                    processed_count: self.store.seen_count(channel_id),
                    error: None,
                },
                Err(e) => ChannelStatus {
                    channel_id: channel_id.clone(),
                    status: "error",
                    available_count: 0,
                    processed_count: self.store.seen_count(channel_id),
                    error: Some(e.to_string()),
                },
            };
            statuses.push(status);
        }

        statuses
    }

    /// Raw and extracted view of the most recent messages of one channel.
    ///
    /// Never touches the seen store, so it is safe to call repeatedly while
    /// tuning patterns.
    pub async fn debug_channel(&self, channel_id: &str) -> Result<ChannelDebug, FetchError> {
        let messages = self.source.fetch(channel_id, None).await?;

        let views = messages
            .iter()
            .take(DEBUG_MESSAGE_LIMIT)
            .map(|message| {
                let first = message.embeds.first();
                MessageDebug {
                    message_id: message.id.clone(),
                    has_embeds: !message.embeds.is_empty(),
                    content_preview: preview(&message.content, PREVIEW_CHARS),
                    embed_title: first.and_then(|e| e.title.clone()),
                    embed_description: first
                        .and_then(|e| e.description.as_deref())
                        .map(|d| preview(d, PREVIEW_CHARS)),
                    extracted: extract(message, channel_id),
                }
            })
            .collect();

        Ok(ChannelDebug {
            total_messages: messages.len(),
            messages: views,
        })
    }
}

/// Truncate to `limit` characters, appending `...` when cut.
fn preview(text: &str, limit: usize) -> String {
    if text.chars().count() <= limit {
        text.to_string()
    } else {
        let cut: String = text.chars().take(limit).collect();
        format!("{}...", cut)
    }
}

// ── Tests ───────────────────────────────────────────────────────────
