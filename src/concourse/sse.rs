//! Incremental decoder for the `text/event-stream` wire format.
//!
//! Bytes arrive in arbitrary chunks from the network. Lines are only decoded
//! once their terminator has been seen, so a multibyte character or a CRLF
//! pair split across two chunks comes out whole.

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Last event id in effect when this event was dispatched.
    pub id: Option<String>,
    pub event: String,
    pub data: String,
    /// Reconnection time in milliseconds, if the server set one since the
    /// previous dispatch.
    pub retry: Option<u64>,
}

const BOM: &[u8] = b"\xEF\xBB\xBF";
const DEFAULT_EVENT: &str = "message";

#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    started: bool,
    after_cr: bool,
    data: String,
    event_type: String,
    last_event_id: String,
    retry: Option<u64>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_event_id(&self) -> Option<&str> {
        if self.last_event_id.is_empty() {
            None
        } else {
            Some(&self.last_event_id)
        }
    }

    /// Feed one chunk and collect every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        for &byte in chunk {
            if self.after_cr {
                self.after_cr = false;
                if byte == b'\n' {
                    continue;
                }
            }
            match byte {
                b'\n' => self.end_line(&mut events),
                b'\r' => {
                    self.end_line(&mut events);
                    self.after_cr = true;
                }
                _ => self.line.push(byte),
            }
        }
        events
    }

    /// End of stream. An event without its terminating blank line is
    /// discarded, as is any partial line.
    pub fn finish(&mut self) {
        if !self.line.is_empty() || !self.data.is_empty() {
            tracing::debug!("discarding undispatched trailing event");
        }
        self.line.clear();
        self.data.clear();
        self.event_type.clear();
        self.after_cr = false;
    }

    fn end_line(&mut self, events: &mut Vec<SseEvent>) {
        let mut raw = std::mem::take(&mut self.line);
        if !self.started {
            self.started = true;
            if raw.starts_with(BOM) {
                raw.drain(..BOM.len());
            }
        }
        let line = String::from_utf8_lossy(&raw);
        if line.is_empty() {
            if let Some(event) = self.dispatch() {
                events.push(event);
            }
            return;
        }
        if line.starts_with(':') {
            return;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line.as_ref(), ""),
        };
        self.process_field(field, value);
    }

    fn process_field(&mut self, field: &str, value: &str) {
        match field {
            "event" => value.clone_into(&mut self.event_type),
            "data" => {
                self.data.push_str(value);
                self.data.push('\n');
            }
            "id" => {
                if !value.contains('\0') {
                    value.clone_into(&mut self.last_event_id);
                }
            }
            "retry" => {
                if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
                    if let Ok(ms) = value.parse() {
                        self.retry = Some(ms);
                    }
                }
            }
            _ => {}
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event_type = std::mem::take(&mut self.event_type);
        if self.data.is_empty() {
            return None;
        }
        let mut data = std::mem::take(&mut self.data);
        if data.ends_with('\n') {
            data.pop();
        }
        Some(SseEvent {
            id: self.last_event_id().map(str::to_string),
            event: if event_type.is_empty() {
                DEFAULT_EVENT.to_string()
            } else {
                event_type
            },
            data,
            retry: self.retry.take(),
        })
    }
}
