//! Embed extraction — ordered fallback pattern tiers that turn message
//! embeds into structured discovery events.
//!
//! Only the first embed of a message is considered. Its title, description,
//! fields, footer and author are flattened into one labelled text blob, and
//! each output field is resolved by its own pattern table, evaluated in
//! order with first-match-wins semantics:
//! - keyword tier: `Best: <label> - <subject> - ($<rate>/s)`
//! - bullet tier: same triple prefixed by `•` or `-`
//! - bare-rate tier: `($<rate>/s)` and looser variants (rate only; the
//!   subject falls back to the embed title)
//!
//! A message becomes an event only when a subject was resolved and a
//! UUID-shaped correlation id was found. Anything else is `None`, an
//! expected outcome rather than an error.

use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use crate::discord::{Embed, RawMessage};

/// Embed title the upstream bot emits as a placeholder; never a subject.
const PLACEHOLDER_TITLE: &str = "Finder";

/// Rate recorded when no pattern yields one.
const DEFAULT_RATE: &str = "0";

// ── Pattern tables ──────────────────────────────────────────────────
//
// Subject/rate tables capture (label, subject, rate); the label group is
// discarded. New upstream formatting variants are appended here, never
// expressed as control flow.

/// Keyword tier: `Best: <label> - <subject> - ($<rate>/s)` lines.
static KEYWORD_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)Best:\s*([^-]+)-([^-]+)-\s*\(\$([\d.]+[MK]?)/s\)",
        r"(?i)Best:\s*([^-]+)\s*-\s*([^-]+)\s*-\s*\(\$([\d.]+[MK]?)/s\)",
    ])
});

/// Bullet tier: the same triple on a `•` or `-` list line.
static BULLET_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)[•\-]\s*([^-]+)-([^-]+)-\s*\(\$([\d.]+[MK]?)/s\)",
        r"(?i)[•\-]\s*([^-]+)\s*-\s*([^-]+)\s*-\s*\(\$([\d.]+[MK]?)/s\)",
    ])
});

/// Bare-rate tier, loosest last. Resolves the rate only.
static RATE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)\(\$([\d.]+[MK]?)/s\)",
        r"(?i)\$([\d.]+[MK]?)/s",
        r"(?i)([\d.]+[MK]?)/s",
    ])
});

/// Correlation id: a UUID, preferably labelled `Job ID`.
static CORRELATION_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)Job ID\s*([a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12})",
        r"(?i)Job ID:\s*([a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12})",
        r"(?i)([a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12})",
    ])
});

/// Occupancy: `Players: <n/m>` plus the localized label the bot also emits.
static OCCUPANCY_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"(?i)Players:\s*(\d+/\d+)",
        r"(?i)Players\s*(\d+/\d+)",
        r"(?i)Jogadores:\s*(\d+/\d+)",
    ])
});

/// Location: `Base: <name>` to end of line. Case-sensitive upstream label.
static LOCATION_PATTERNS: LazyLock<Vec<Regex>> =
    LazyLock::new(|| compile(&[r"Base:\s*(.+)", r"Base\s*(.+)"]));

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).unwrap()).collect()
}

// ── Domain event ────────────────────────────────────────────────────

/// Structured discovery event extracted from one message embed.
///
/// Field names are a compatibility contract with the consuming client.
/// Optional fields serialize as `null`, never as a placeholder string.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiscoveryEvent {
    pub message_id: String,
    pub subject_name: String,
    pub rate: String,
    pub correlation_id: String,
    pub channel_id: String,
    pub observed_at: DateTime<Utc>,
    pub occupancy: Option<String>,
    pub location_name: Option<String>,
}

// ── Extraction ──────────────────────────────────────────────────────

/// Attempt to extract a discovery event from one raw message.
///
/// Pure over the message content; `observed_at` is stamped at extraction
/// time. Returns `None` when the message has no embeds, no tier resolves a
/// subject, or no correlation id is present.
pub fn extract(message: &RawMessage, channel_id: &str) -> Option<DiscoveryEvent> {
    let embed = message.embeds.first()?;
    let text = flatten_embed(embed);

    let (subject, rate) = match subject_and_rate(&KEYWORD_PATTERNS, &text)
        .or_else(|| subject_and_rate(&BULLET_PATTERNS, &text))
    {
        Some((subject, rate)) => (Some(subject), Some(rate)),
        // No line-level pattern matched: take a bare rate if present and
        // fall back to the embed title for the subject.
        None => (title_subject(embed), first_capture(&RATE_PATTERNS, &text)),
    };

    let correlation_id = find_correlation_id(embed, &text);

    let (Some(subject_name), Some(correlation_id)) = (subject, correlation_id) else {
        debug!(id = %message.id, "No subject or correlation id resolved, skipping");
        return None;
    };

    Some(DiscoveryEvent {
        message_id: message.id.clone(),
        subject_name,
        rate: rate.unwrap_or_else(|| DEFAULT_RATE.to_string()),
        correlation_id,
        channel_id: channel_id.to_string(),
        observed_at: Utc::now(),
        occupancy: first_capture(&OCCUPANCY_PATTERNS, &text),
        location_name: first_capture(&LOCATION_PATTERNS, &text),
    })
}

/// Flatten an embed into one searchable blob, one labelled component per
/// line, in source order. Field names are searchable alongside values.
fn flatten_embed(embed: &Embed) -> String {
    let mut parts: Vec<String> = Vec::new();

    if let Some(title) = embed.title.as_deref().filter(|t| !t.is_empty()) {
        parts.push(format!("TITLE: {}", title));
    }
    if let Some(description) = embed.description.as_deref().filter(|d| !d.is_empty()) {
        parts.push(format!("DESCRIPTION: {}", description));
    }
    for field in &embed.fields {
        parts.push(format!("FIELD_{}: {}", field.name, field.value));
    }
    if let Some(text) = embed
        .footer
        .as_ref()
        .and_then(|f| f.text.as_deref())
        .filter(|t| !t.is_empty())
    {
        parts.push(format!("FOOTER: {}", text));
    }
    if let Some(name) = embed
        .author
        .as_ref()
        .and_then(|a| a.name.as_deref())
        .filter(|n| !n.is_empty())
    {
        parts.push(format!("AUTHOR: {}", name));
    }

    parts.join("\n")
}

/// Run one subject/rate tier. The first match with a non-empty subject
/// wins; groups are (label, subject, rate).
fn subject_and_rate(patterns: &[Regex], text: &str) -> Option<(String, String)> {
    for re in patterns {
        if let Some(caps) = re.captures(text) {
            let subject = caps[2].trim();
            if !subject.is_empty() {
                return Some((subject.to_string(), caps[3].trim().to_string()));
            }
        }
    }
    None
}

/// The embed title as a subject, unless empty or the bot's placeholder.
fn title_subject(embed: &Embed) -> Option<String> {
    embed
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty() && *t != PLACEHOLDER_TITLE)
        .map(String::from)
}

/// Locate a correlation id. Embed fields whose name mentions `job` or `id`
/// are searched first, then the whole flattened blob.
fn find_correlation_id(embed: &Embed, text: &str) -> Option<String> {
    for field in &embed.fields {
        let name = field.name.to_lowercase();
        if !(name.contains("job") || name.contains("id")) {
            continue;
        }
        if let Some(id) = match_correlation(&field.value) {
            return Some(id);
        }
    }
    match_correlation(text)
}

/// First UUID-shaped match, normalized to canonical lowercase form.
fn match_correlation(text: &str) -> Option<String> {
    for re in CORRELATION_PATTERNS.iter() {
        if let Some(caps) = re.captures(text) {
            if let Ok(id) = Uuid::parse_str(&caps[1]) {
                return Some(id.to_string());
            }
        }
    }
    None
}

/// First non-empty capture of an ordered pattern table.
fn first_capture(patterns: &[Regex], text: &str) -> Option<String> {
    for re in patterns {
        if let Some(caps) = re.captures(text) {
            let value = caps[1].trim();
            if !value.is_empty() {
                return Some(value.to_string());
            }
        }
    }
    None
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discord::{EmbedField, EmbedFooter};

    const JOB_ID: &str = "5ab7c5e4-35a1-4552-8264-4cbdd6aab1f6";

    fn embed_message(id: &str, embed: Embed) -> RawMessage {
        RawMessage {
            id: id.into(),
            content: String::new(),
            embeds: vec![embed],
        }
    }

    fn job_field(value: &str) -> EmbedField {
        EmbedField {
            name: "Job ID".into(),
            value: value.into(),
        }
    }

    /// The full shape the upstream bot usually posts.
    fn full_embed() -> Embed {
        Embed {
            title: Some("Finder".into()),
            description: Some("Best: Candy - Los Tipi Tacos - ($2M/s)".into()),
            fields: vec![
                job_field(JOB_ID),
                EmbedField {
                    name: "Players".into(),
                    value: "7/8".into(),
                },
            ],
            footer: Some(EmbedFooter {
                text: Some("Base: Benzema12709".into()),
            }),
            author: None,
        }
    }

    // ── Whole-embed extraction ──────────────────────────────────────

    #[test]
    fn no_embeds_extracts_nothing() {
        let msg = RawMessage {
            id: "1".into(),
            content: "plain chat message".into(),
            embeds: vec![],
        };
        assert!(extract(&msg, "ch").is_none());
    }

    #[test]
    fn keyword_embed_extracts_every_field() {
        let msg = embed_message("42", full_embed());
        let event = extract(&msg, "chan-1").unwrap();

        assert_eq!(event.message_id, "42");
        assert_eq!(event.subject_name, "Los Tipi Tacos");
        assert_eq!(event.rate, "2M");
        assert_eq!(event.correlation_id, JOB_ID);
        assert_eq!(event.channel_id, "chan-1");
        assert_eq!(event.occupancy.as_deref(), Some("7/8"));
        assert_eq!(event.location_name.as_deref(), Some("Benzema12709"));
    }

    #[test]
    fn bullet_line_resolves_subject_and_rate() {
        let embed = Embed {
            description: Some("• Candy - Bambu Bambu Sahur - ($17M/s)".into()),
            fields: vec![job_field(JOB_ID)],
            ..Default::default()
        };
        let event = extract(&embed_message("1", embed), "ch").unwrap();
        assert_eq!(event.subject_name, "Bambu Bambu Sahur");
        assert_eq!(event.rate, "17M");
    }

    #[test]
    fn keyword_tier_wins_over_bullet_tier() {
        let embed = Embed {
            description: Some("Best: A - Alpha One - ($1M/s)\n• B - Beta Two - ($9M/s)".into()),
            fields: vec![job_field(JOB_ID)],
            ..Default::default()
        };
        let event = extract(&embed_message("1", embed), "ch").unwrap();
        assert_eq!(event.subject_name, "Alpha One");
        assert_eq!(event.rate, "1M");
    }

    #[test]
    fn bare_rate_falls_back_to_title() {
        let embed = Embed {
            title: Some("Los Tipi Tacos".into()),
            description: Some(format!("($3.5K/s)\nJob ID: {}", JOB_ID)),
            ..Default::default()
        };
        let event = extract(&embed_message("1", embed), "ch").unwrap();
        assert_eq!(event.subject_name, "Los Tipi Tacos");
        assert_eq!(event.rate, "3.5K");
        assert_eq!(event.correlation_id, JOB_ID);
    }

    #[test]
    fn placeholder_title_is_never_a_subject() {
        let embed = Embed {
            title: Some("Finder".into()),
            description: Some("($2M/s)".into()),
            fields: vec![job_field(JOB_ID)],
            ..Default::default()
        };
        assert!(extract(&embed_message("1", embed), "ch").is_none());
    }

    #[test]
    fn title_alone_gives_default_rate() {
        let embed = Embed {
            title: Some("Strawberry Elephant".into()),
            fields: vec![job_field(JOB_ID)],
            ..Default::default()
        };
        let event = extract(&embed_message("1", embed), "ch").unwrap();
        assert_eq!(event.subject_name, "Strawberry Elephant");
        assert_eq!(event.rate, "0");
    }

    #[test]
    fn missing_correlation_id_invalidates_the_event() {
        let embed = Embed {
            description: Some("Best: A - Alpha - ($1M/s)".into()),
            ..Default::default()
        };
        assert!(extract(&embed_message("1", embed), "ch").is_none());
    }

    // ── Correlation id resolution ───────────────────────────────────

    #[test]
    fn correlation_id_is_lowercased() {
        let embed = Embed {
            title: Some("Alpha".into()),
            fields: vec![job_field("5AB7C5E4-35A1-4552-8264-4CBDD6AAB1F6")],
            ..Default::default()
        };
        let event = extract(&embed_message("1", embed), "ch").unwrap();
        assert_eq!(event.correlation_id, JOB_ID);
    }

    #[test]
    fn job_field_is_searched_before_the_blob() {
        let embed = Embed {
            title: Some("Alpha".into()),
            description: Some("Session 11111111-2222-3333-4444-555555555555".into()),
            fields: vec![job_field(JOB_ID)],
            ..Default::default()
        };
        let event = extract(&embed_message("1", embed), "ch").unwrap();
        assert_eq!(event.correlation_id, JOB_ID);
    }

    #[test]
    fn correlation_id_found_in_description_without_fields() {
        let embed = Embed {
            title: Some("Alpha".into()),
            description: Some(format!("Job ID: {}", JOB_ID)),
            ..Default::default()
        };
        let event = extract(&embed_message("1", embed), "ch").unwrap();
        assert_eq!(event.correlation_id, JOB_ID);
    }

    // ── Optional fields ─────────────────────────────────────────────

    #[test]
    fn occupancy_and_location_are_optional() {
        let embed = Embed {
            description: Some("Best: A - Alpha - ($1M/s)".into()),
            fields: vec![job_field(JOB_ID)],
            ..Default::default()
        };
        let event = extract(&embed_message("1", embed), "ch").unwrap();
        assert!(event.occupancy.is_none());
        assert!(event.location_name.is_none());
    }

    #[test]
    fn localized_occupancy_label_is_recognized() {
        let embed = Embed {
            description: Some("Best: A - Sahur Tim - ($17M/s)".into()),
            fields: vec![
                job_field(JOB_ID),
                EmbedField {
                    name: "Jogadores".into(),
                    value: "6/8".into(),
                },
            ],
            ..Default::default()
        };
        let event = extract(&embed_message("1", embed), "ch").unwrap();
        assert_eq!(event.occupancy.as_deref(), Some("6/8"));
    }

    #[test]
    fn location_label_is_case_sensitive() {
        let embed = Embed {
            description: Some("Best: A - Alpha - ($1M/s)".into()),
            fields: vec![job_field(JOB_ID)],
            footer: Some(EmbedFooter {
                text: Some("base: Hideout".into()),
            }),
            ..Default::default()
        };
        let event = extract(&embed_message("1", embed), "ch").unwrap();
        assert!(event.location_name.is_none());
    }

    // ── Determinism and wire shape ──────────────────────────────────

    #[test]
    fn extraction_is_deterministic_apart_from_timestamp() {
        let msg = embed_message("42", full_embed());
        let a = extract(&msg, "ch").unwrap();
        let mut b = extract(&msg, "ch").unwrap();
        b.observed_at = a.observed_at;
        assert_eq!(a, b);
    }

    #[test]
    fn event_serializes_with_contract_field_names() {
        let embed = Embed {
            description: Some("Best: A - Alpha - ($1M/s)".into()),
            fields: vec![job_field(JOB_ID)],
            ..Default::default()
        };
        let event = extract(&embed_message("9", embed), "chan-9").unwrap();
        let value = serde_json::to_value(&event).unwrap();

        assert_eq!(value["message_id"], "9");
        assert_eq!(value["subject_name"], "Alpha");
        assert_eq!(value["rate"], "1M");
        assert_eq!(value["correlation_id"], JOB_ID);
        assert_eq!(value["channel_id"], "chan-9");
        assert!(value["observed_at"].is_string());
        assert_eq!(value["occupancy"], serde_json::Value::Null);
        assert_eq!(value["location_name"], serde_json::Value::Null);
    }
}
