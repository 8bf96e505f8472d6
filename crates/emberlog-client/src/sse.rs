use tracing::{trace, warn};

/// Event name the incidents feed uses for new records.
pub const INCIDENT_EVENT: &str = "incident";

const DEFAULT_EVENT: &str = "message";

const BOM: &[u8] = b"\xEF\xBB\xBF";

/// Longest line buffered while waiting for its newline.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Largest `data` payload assembled for one event.
pub const MAX_EVENT_BYTES: usize = 1024 * 1024;

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event_type: String,
    pub data: String,
    /// Last event id seen on the stream, if the server sends ids
    pub id: Option<String>,
    /// Reconnection hint in milliseconds
    pub retry: Option<u64>,
}

/// Incremental `text/event-stream` decoder.
///
/// Network chunks can end anywhere, including mid-line or mid-codepoint, so bytes are
/// buffered until a full line is available. An event is dispatched on a blank line.
/// A leading byte order mark is skipped. An event whose line or payload outgrows the
/// limits is dropped up to its terminating blank line.
#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    event_type: Option<String>,
    data: String,
    has_data: bool,
    last_event_id: Option<String>,
    retry: Option<u64>,
    bom_checked: bool,
    discarding: bool,
    max_line: usize,
    max_event: usize,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_limits(MAX_LINE_BYTES, MAX_EVENT_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(max_line: usize, max_event: usize) -> Self {
        Self {
            buffer: Vec::new(),
            event_type: None,
            data: String::new(),
            has_data: false,
            last_event_id: None,
            retry: None,
            bom_checked: false,
            discarding: false,
            max_line,
            max_event,
        }
    }

    /// Feed a chunk and collect every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buffer.extend_from_slice(chunk);

        if !self.bom_checked {
            if self.buffer.len() < BOM.len() && BOM.starts_with(&self.buffer) {
                return Vec::new();
            }
            if self.buffer.starts_with(BOM) {
                self.buffer.drain(..BOM.len());
            }
            self.bom_checked = true;
        }

        let mut events = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].iter().position(|b| *b == b'\n') {
            let end = start + offset;
            let mut line = &self.buffer[start..end];
            if let Some(stripped) = line.strip_suffix(b"\r") {
                line = stripped;
            }
            let line = String::from_utf8_lossy(line).into_owned();
            start = end + 1;

            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }
        self.buffer.drain(..start);

        if self.buffer.len() > self.max_line {
            warn!(pending = self.buffer.len(), "SSE line exceeds limit, dropping event");
            self.buffer.clear();
            self.discard_event();
        }

        events
    }

    fn discard_event(&mut self) {
        self.discarding = true;
        self.event_type = None;
        self.data.clear();
        self.has_data = false;
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            if self.discarding {
                self.discarding = false;
                return None;
            }
            return self.dispatch();
        }
        if self.discarding || line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event_type = Some(value.to_string()),
            "data" => {
                if self.data.len() + value.len() + 1 > self.max_event {
                    warn!(
                        size = self.data.len() + value.len(),
                        "SSE event exceeds limit, dropping it"
                    );
                    self.discard_event();
                    return None;
                }
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "id" => {
                if !value.contains('\0') {
                    self.last_event_id = Some(value.to_string());
                }
            }
            "retry" => {
                if let Ok(ms) = value.parse::<u64>() {
                    self.retry = Some(ms);
                }
            }
            _ => trace!("Unknown SSE field: {}", field),
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event_type = self.event_type.take();
        if !self.has_data {
            return None;
        }
        self.has_data = false;

        Some(SseEvent {
            event_type: event_type
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| DEFAULT_EVENT.to_string()),
            data: std::mem::take(&mut self.data),
            id: self.last_event_id.clone(),
            retry: self.retry,
        })
    }
}
