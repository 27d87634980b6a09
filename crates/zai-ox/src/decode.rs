//! Decoding of the upstream phase-tagged SSE lines.
//!
//! Each upstream line looks like
//! `data: {"data": {"phase": "...", "delta_content": "...", "edit_content": "...", "usage": {...}}}`.
//! The phase decides which field carries displayable text and how much of it
//! to keep.

use ai_ox_common::streaming::data_payload;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ZaiError;

/// Closes the thinking header of a reasoning block
pub const SUMMARY_END: &str = "</summary>\n";
/// Closes the collapsed reasoning block that precedes an edited answer
pub const DETAILS_END: &str = "</details>";

/// Phase tag of an upstream event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Thinking,
    Answer,
    Other,
    ToolCall,
    Done,
    #[serde(other)]
    Unknown,
}

/// Envelope of one upstream event, `{"data": {...}}`
#[derive(Debug, Deserialize)]
struct RawLine {
    /// Missing on keep-alive and status events
    #[serde(default)]
    data: Option<RawData>,
}

/// Payload of one upstream event
#[derive(Debug, Deserialize)]
struct RawData {
    /// Absent phase keeps the previous one
    #[serde(default)]
    phase: Option<Phase>,
    /// Incremental text
    #[serde(default)]
    delta_content: Option<String>,
    /// Replacement text, used when `delta_content` is absent
    #[serde(default)]
    edit_content: Option<String>,
    /// Token accounting, passed through untouched
    #[serde(default)]
    usage: Option<Value>,
}

/// One decoded upstream event with its display content
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamEvent {
    Thinking { content: String },
    Answer { content: String },
    Other { content: String, usage: Value },
    ToolCall { content: String },
    Done,
}

impl UpstreamEvent {
    #[must_use]
    pub fn phase(&self) -> Phase {
        match self {
            Self::Thinking { .. } => Phase::Thinking,
            Self::Answer { .. } => Phase::Answer,
            Self::Other { .. } => Phase::Other,
            Self::ToolCall { .. } => Phase::ToolCall,
            Self::Done => Phase::Done,
        }
    }
}

/// Text after the last `marker`, or all of `text` when the marker is absent
fn after_last<'a>(text: &'a str, marker: &str) -> &'a str {
    text.rsplit_once(marker).map_or(text, |(_, rest)| rest)
}

/// Reasoning text with the thinking header dropped
#[must_use]
pub fn thinking_content(delta: Option<&str>) -> String {
    let delta = delta.unwrap_or_default();
    if delta.contains(SUMMARY_END) {
        after_last(delta, SUMMARY_END).to_string()
    } else {
        delta.to_string()
    }
}

/// Answer text.
///
/// An edit is only recognized when it contains [`SUMMARY_END`], but the text
/// kept is whatever follows the last [`DETAILS_END`]. Without a usable edit the
/// delta is used, and with neither the content is empty.
#[must_use]
pub fn answer_content(edit: Option<&str>, delta: Option<&str>) -> String {
    match (edit, delta) {
        (Some(edit), _) if !edit.is_empty() && edit.contains(SUMMARY_END) => {
            after_last(edit, DETAILS_END).to_string()
        }
        (_, Some(delta)) if !delta.is_empty() => delta.to_string(),
        _ => String::new(),
    }
}

/// Decode one upstream line.
///
/// Returns `Ok(None)` for lines that carry no event: non-`data:` lines, empty
/// payloads, unknown phases. Malformed JSON is an error so the caller can
/// decide whether to skip it.
pub fn decode_line(line: &str) -> Result<Option<UpstreamEvent>, ZaiError> {
    let Some(payload) = data_payload(line) else {
        return Ok(None);
    };

    if payload.is_empty() {
        return Ok(None);
    }

    if payload == "[DONE]" {
        return Ok(Some(UpstreamEvent::Done));
    }

    let raw: RawLine = serde_json::from_str(payload)
        .map_err(|e| ZaiError::InvalidEventData(format!("malformed upstream line: {e}")))?;

    let Some(data) = raw.data else {
        return Ok(None);
    };

    let event = match data.phase {
        Some(Phase::Thinking) => UpstreamEvent::Thinking {
            content: thinking_content(data.delta_content.as_deref()),
        },
        Some(Phase::Answer) => UpstreamEvent::Answer {
            content: answer_content(data.edit_content.as_deref(), data.delta_content.as_deref()),
        },
        Some(Phase::Other) => UpstreamEvent::Other {
            content: data.delta_content.unwrap_or_default(),
            usage: data.usage.unwrap_or_else(|| Value::Object(Map::new())),
        },
        Some(Phase::ToolCall) => UpstreamEvent::ToolCall {
            content: data.edit_content.unwrap_or_default(),
        },
        Some(Phase::Done) => UpstreamEvent::Done,
        Some(Phase::Unknown) | None => return Ok(None),
    };

    Ok(Some(event))
}
