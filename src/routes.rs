//! HTTP API surface — JSON endpoints consumed by the game client.
//!
//! Response field names are a compatibility contract: the client parses by
//! field name, not schema version. Every route answers HTTP 200; upstream
//! failures degrade inside the body (`success: false`, `status: "error"`)
//! so a broken channel never breaks the client's poll loop.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use tracing::info;

use crate::config::platform_info;
use crate::extract::DiscoveryEvent;
use crate::poller::Poller;
use crate::store::SeenStore;

/// Service name reported by the health and index endpoints.
const SERVICE: &str = "discord-scout";

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub poller: Arc<Poller>,
    pub store: Arc<SeenStore>,
    /// Listen port, used for the local fallback of platform detection.
    pub port: u16,
}

/// Build the Axum router with every API route.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/messages/new", get(new_messages))
        .route("/api/channels", get(channels))
        .route("/api/test", get(test_data))
        .route("/api/health", get(health))
        .route("/api/server", get(server))
        .route("/api/debug/messages", get(debug_messages))
        .route("/api/debug/clear-cache", get(clear_cache))
        .with_state(state)
}

// ── Poll ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct NewMessagesParams {
    /// `channel_id:message_id` pairs joined by commas.
    last_message_ids: Option<String>,
}

/// GET /api/messages/new — poll every channel for unseen notifications.
async fn new_messages(
    State(state): State<AppState>,
    Query(params): Query<NewMessagesParams>,
) -> impl IntoResponse {
    let watermarks = params
        .last_message_ids
        .as_deref()
        .map(parse_watermarks)
        .unwrap_or_default();

    let outcome = state.poller.poll(&watermarks).await;

    Json(serde_json::json!({
        "success": true,
        "new_messages": outcome.events,
        "processed_count": outcome.processed_channels,
        "total_channels": outcome.total_channels,
        "message": format!(
            "Processed {}/{} channels - {} new notifications",
            outcome.processed_channels,
            outcome.total_channels,
            outcome.events.len()
        ),
    }))
}

/// Parse the watermark query format: `channel_id:message_id` pairs joined
/// by commas. Pairs without a colon are skipped.
fn parse_watermarks(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let (channel_id, message_id) = pair.split_once(':')?;
            Some((channel_id.trim().to_string(), message_id.trim().to_string()))
        })
        .collect()
}

// ── Channel diagnostics ─────────────────────────────────────────────

/// GET /api/channels — fresh availability check of every channel.
async fn channels(State(state): State<AppState>) -> impl IntoResponse {
    let channels = state.poller.channel_status().await;
    let total = channels.len();

    Json(serde_json::json!({
        "success": true,
        "channels": channels,
        "total_channels": total,
        "message": format!("Monitoring {} Discord channels", total),
    }))
}

#[derive(Deserialize)]
struct DebugParams {
    channel_id: String,
}

/// GET /api/debug/messages — raw + extracted view of one channel's most
/// recent messages, for diagnosing pattern misses.
async fn debug_messages(
    State(state): State<AppState>,
    Query(params): Query<DebugParams>,
) -> impl IntoResponse {
    match state.poller.debug_channel(&params.channel_id).await {
        Ok(view) => Json(serde_json::json!({
            "success": true,
            "channel_id": params.channel_id,
            "total_messages": view.total_messages,
            "messages": view.messages,
        })),
        Err(e) => Json(serde_json::json!({
            "success": false,
            "message": format!("No messages from channel {}: {}", params.channel_id, e),
        })),
    }
}

#[derive(Deserialize)]
struct ClearCacheParams {
    channel_id: Option<String>,
}

/// GET /api/debug/clear-cache — reset the seen-message store, for one
/// channel or all of them. The manual relief valve for unbounded growth.
async fn clear_cache(
    State(state): State<AppState>,
    Query(params): Query<ClearCacheParams>,
) -> impl IntoResponse {
    let cleared_channels: Vec<String> = match params.channel_id {
        Some(channel_id) => {
            state.store.clear(Some(channel_id.as_str()));
            vec![channel_id]
        }
        None => {
            state.store.clear(None);
            state.poller.channel_ids().to_vec()
        }
    };

    info!(channels = cleared_channels.len(), "Seen-message cache cleared");

    Json(serde_json::json!({
        "success": true,
        "message": format!("Cache cleared for {} channels", cleared_channels.len()),
        "cleared_channels": cleared_channels,
    }))
}

// ── Service info ────────────────────────────────────────────────────

/// GET /api/test — fixed sample notifications in the client wire format,
/// for integrating the client without a live upstream.
async fn test_data(State(state): State<AppState>) -> impl IntoResponse {
    let channel_ids = state.poller.channel_ids();
    let channel = |i: usize| {
        channel_ids
            .get(i)
            .or_else(|| channel_ids.first())
            .cloned()
            .unwrap_or_else(|| "0".to_string())
    };

    let samples = vec![
        DiscoveryEvent {
            message_id: "test_123456789".to_string(),
            subject_name: "Los Tipi Tacos".to_string(),
            rate: "2M".to_string(),
            correlation_id: "5ab7c5e4-35a1-4552-8264-4cbdd6aab1f6".to_string(),
            channel_id: channel(0),
            observed_at: Utc::now(),
            occupancy: Some("7/8".to_string()),
            location_name: Some("Benzema12709".to_string()),
        },
        DiscoveryEvent {
            message_id: "test_123456790".to_string(),
            subject_name: "Bambu Bambu Sahur".to_string(),
            rate: "17M".to_string(),
            correlation_id: "6bc8d6f5-46b2-5663-9375-5dcee7bbcf27".to_string(),
            channel_id: channel(1),
            observed_at: Utc::now(),
            occupancy: Some("6/8".to_string()),
            location_name: Some("OtherBase".to_string()),
        },
    ];

    Json(serde_json::json!({
        "success": true,
        "new_messages": samples,
        "message": "Sample notifications in the client wire format",
    }))
}

/// GET /api/health — service health, monitored channels and cache sizes.
async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let channel_ids = state.poller.channel_ids();

    Json(serde_json::json!({
        "status": "online",
        "timestamp": Utc::now(),
        "service": SERVICE,
        "channels_monitored": channel_ids.len(),
        "channels": channel_ids,
        "cache_size": state.store.counts(),
        "server": platform_info(state.port),
    }))
}

/// GET /api/server — hosting platform details.
async fn server(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "success": true,
        "server": platform_info(state.port),
    }))
}

/// GET / — service index with the endpoint map.
async fn index(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "service": SERVICE,
        "status": "online",
        "channels": state.poller.channel_ids().len(),
        "server": platform_info(state.port),
        "endpoints": {
            "/api/messages/new": "Poll channels for new notifications",
            "/api/channels": "Per-channel availability",
            "/api/test": "Sample notifications",
            "/api/health": "Service health",
            "/api/server": "Hosting platform details",
            "/api/debug/messages": "Raw and extracted view of one channel",
            "/api/debug/clear-cache": "Reset the seen-message cache",
        },
    }))
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn watermarks_parse_pairs() {
        let parsed = parse_watermarks("111:900,222:800");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.get("111").map(String::as_str), Some("900"));
        assert_eq!(parsed.get("222").map(String::as_str), Some("800"));
    }

    #[test]
    fn watermarks_skip_pairs_without_colon() {
        let parsed = parse_watermarks("111:900,garbage,222:800");
        assert_eq!(parsed.len(), 2);
        assert!(!parsed.contains_key("garbage"));
    }

    #[test]
    fn watermarks_trim_whitespace() {
        let parsed = parse_watermarks(" 111 : 900 , 222:800");
        assert_eq!(parsed.get("111").map(String::as_str), Some("900"));
    }

    #[test]
    fn watermarks_keep_first_colon_split() {
        // Message ids never contain colons, but a stray one must not split
        // the channel id.
        let parsed = parse_watermarks("111:900:extra");
        assert_eq!(parsed.get("111").map(String::as_str), Some("900:extra"));
    }

    #[test]
    fn watermarks_empty_input() {
        assert!(parse_watermarks("").is_empty());
        assert!(parse_watermarks(",,,").is_empty());
    }
}
