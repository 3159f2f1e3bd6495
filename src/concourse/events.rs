//! Concourse build events carried inside SSE frames.
//!
//! Each SSE `data` field holds a JSON envelope of the form
//! `{"event": "<type>", "data": {...}}`. Only `log` events are surfaced.

use super::sse::SseEvent;
use crate::model::LogEvent;
use serde_json::Value;
use thiserror::Error;

/// SSE event type the server sends once a build's event stream is exhausted.
pub const END_EVENT: &str = "end";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventParseError {
    #[error("Could not parse event: Input SSEEvent data is not valid JSON")]
    InvalidJson,
    #[error("Could read JSON data: Top-level 'data' field missing")]
    MissingData,
    #[error("Could read JSON data: 'event' descriptor field missing")]
    MissingEventType,
    #[error("Unsupported event type: '{0}'")]
    UnsupportedEventType(String),
    #[error("Invalid log event JSON: Missing 'payload' data")]
    MissingPayload,
}

pub fn is_end_of_stream(event: &SseEvent) -> bool {
    event.event == END_EVENT
}

pub fn parse_log_event(event: &SseEvent) -> Result<LogEvent, EventParseError> {
    let envelope = match serde_json::from_str::<Value>(&event.data) {
        Ok(Value::Object(obj)) => obj,
        _ => return Err(EventParseError::InvalidJson),
    };

    let data = envelope
        .get("data")
        .and_then(Value::as_object)
        .ok_or(EventParseError::MissingData)?;

    let event_type = envelope
        .get("event")
        .and_then(Value::as_str)
        .ok_or(EventParseError::MissingEventType)?;

    if event_type != "log" {
        return Err(EventParseError::UnsupportedEventType(event_type.to_string()));
    }

    let payload = data
        .get("payload")
        .and_then(Value::as_str)
        .ok_or(EventParseError::MissingPayload)?;

    Ok(LogEvent {
        payload: payload.to_string(),
    })
}
