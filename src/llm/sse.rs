//! Incremental server-sent-events parser.
//!
//! The provider's response body arrives in arbitrary byte chunks: one chunk
//! may hold several events, or end in the middle of a `data:` line (or even
//! in the middle of a multi-byte character). [`SseParser`] buffers the
//! incomplete tail between calls to [`SseParser::feed`], so the events it
//! yields do not depend on where the chunk boundaries fall.

use bytes::{Buf, BytesMut};

/// Initial capacity of the line buffer.
const INITIAL_BUF_SIZE: usize = 4096;

/// A complete server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the last `event:` field, if any.
    pub event: Option<String>,
    /// All `data:` fields of the event, joined with `\n`.
    pub data: String,
    /// Value of the last `id:` field, if any.
    pub id: Option<String>,
}

/// Push parser turning raw bytes into [`SseEvent`]s.
///
/// # Examples
///
/// ```
/// use codeshift::llm::sse::SseParser;
///
/// let mut parser = SseParser::new();
/// assert!(parser.feed(b"data: hel").is_empty());
/// let events = parser.feed(b"lo\n\ndata: [DONE]\n\n");
/// assert_eq!(events.len(), 2);
/// assert_eq!(events[0].data, "hello");
/// assert_eq!(events[1].data, "[DONE]");
/// ```
#[derive(Debug)]
pub struct SseParser {
    buf: BytesMut,
    // A chunk ended right after `\r`; a leading `\n` in the next one belongs to it.
    skip_lf: bool,
    event: Option<String>,
    data: String,
    has_data: bool,
    id: Option<String>,
}

impl Default for SseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl SseParser {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUF_SIZE),
            skip_lf: false,
            event: None,
            data: String::new(),
            has_data: false,
            id: None,
        }
    }

    /// Feeds a chunk of bytes and returns every event it completes.
    ///
    /// Bytes after the last line terminator stay buffered until a later call
    /// completes the line.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        let mut events = Vec::new();
        let mut chunk = chunk;

        // Only the first byte after a trailing `\r` can complete its `\r\n`.
        if self.skip_lf && !chunk.is_empty() {
            self.skip_lf = false;
            if let Some(rest) = chunk.strip_prefix(b"\n") {
                chunk = rest;
            }
        }

        self.buf.extend_from_slice(chunk);

        while let Some(pos) = self.buf.iter().position(|&b| b == b'\n' || b == b'\r') {
            let line = self.buf.split_to(pos);
            let terminator = self.buf[0];
            self.buf.advance(1);

            if terminator == b'\r' {
                match self.buf.first().copied() {
                    Some(b'\n') => self.buf.advance(1),
                    Some(_) => {}
                    None => self.skip_lf = true,
                }
            }

            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        events
    }

    /// Discards buffered bytes and any partially assembled event.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.skip_lf = false;
        self.clear_event();
    }

    /// Returns `true` if no partial line or event is buffered.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty() && !self.has_data && self.event.is_none() && self.id.is_none()
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.find(':') {
            Some(pos) => {
                let value = &line[pos + 1..];
                (&line[..pos], value.strip_prefix(' ').unwrap_or(value))
            }
            None => (line, ""),
        };

        match field {
            "data" => {
                if self.has_data {
                    self.data.push('\n');
                }
                self.data.push_str(value);
                self.has_data = true;
            }
            "event" => self.event = Some(value.to_owned()),
            "id" => self.id = Some(value.to_owned()),
            // `retry` and unknown fields carry nothing we act on.
            _ => {}
        }

        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        if !self.has_data {
            self.clear_event();
            return None;
        }

        let event = SseEvent {
            event: self.event.take(),
            data: std::mem::take(&mut self.data),
            id: self.id.take(),
        };
        self.has_data = false;
        Some(event)
    }

    fn clear_event(&mut self) {
        self.event = None;
        self.data.clear();
        self.has_data = false;
        self.id = None;
    }
}
