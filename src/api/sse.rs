//! Incremental decoder for the `text/event-stream` wire format.

use thiserror::Error;

/// Longest line buffered while waiting for its terminator.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("event stream line exceeds {0} bytes")]
pub struct LineTooLong(pub usize);

/// A dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
    pub id: Option<String>,
}

impl SseEvent {
    /// Untyped events and `message` events are what a browser `onmessage` sees.
    pub fn is_message(&self) -> bool {
        matches!(self.event.as_deref(), None | Some("message"))
    }
}

#[derive(Debug)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    // Bytes of `buffer` already known to hold no newline
    scanned: usize,
    max_line: usize,
    data: Vec<String>,
    event: Option<String>,
    last_id: Option<String>,
    retry_ms: Option<u64>,
}

impl Default for SseDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scanned: 0,
            max_line,
            data: Vec::new(),
            event: None,
            last_id: None,
            retry_ms: None,
        }
    }

    /// Feed raw bytes, returning every event completed by this chunk.
    ///
    /// Partial lines are buffered until their terminator arrives, so chunk
    /// boundaries may fall anywhere, including inside a UTF-8 sequence.
    /// A pending line longer than the limit is an error; the decoder drops
    /// its buffer and should not be fed again.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseEvent>, LineTooLong> {
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(offset) = self.buffer[self.scanned..]
            .iter()
            .position(|b| *b == b'\n')
        {
            let pos = self.scanned + offset;
            self.scanned = 0;
            let mut line: Vec<u8> = self.buffer.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }

            let line = String::from_utf8_lossy(&line);
            if let Some(event) = self.process_line(&line) {
                events.push(event);
            }
        }

        if self.buffer.len() > self.max_line {
            self.buffer.clear();
            self.scanned = 0;
            return Err(LineTooLong(self.max_line));
        }
        self.scanned = self.buffer.len();

        Ok(events)
    }

    /// Reconnection delay last announced by the server, if any.
    pub fn retry_ms(&self) -> Option<u64> {
        self.retry_ms
    }

    fn process_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }

        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "data" => self.data.push(value.to_string()),
            "event" => self.event = Some(value.to_string()),
            "id" if !value.contains('\0') => self.last_id = Some(value.to_string()),
            "retry" => {
                if let Ok(ms) = value.parse() {
                    self.retry_ms = Some(ms);
                }
            }
            other => tracing::trace!("Ignoring unknown SSE field: {}", other),
        }

        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }

        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event,
            data,
            id: self.last_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_backend_stream() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(b"data: 10,5.20\n\ndata: complete\n\n").unwrap();
        let data: Vec<_> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, vec!["10,5.20", "complete"]);
        assert!(events.iter().all(SseEvent::is_message));
    }

    #[test]
    fn test_decode_across_chunks() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"da").unwrap().is_empty());
        assert!(decoder.feed(b"ta: 42,1").unwrap().is_empty());
        assert!(decoder.feed(b"7.5\r\n").unwrap().is_empty());
        let events = decoder.feed(b"\r\n").unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data, "42,17.5");
    }

    #[test]
    fn test_decode_split_utf8() {
        let bytes = "data: 50,1.0,1.2MB/s,30 \u{00e9}\n\n".as_bytes();
        let (head, tail) = bytes.split_at(bytes.len() - 3);
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(head).unwrap().is_empty());
        let events = decoder.feed(tail).unwrap();
        assert_eq!(events[0].data, "50,1.0,1.2MB/s,30 \u{00e9}");
    }

    #[test]
    fn test_comments_fields_and_multiline() {
        let mut decoder = SseDecoder::new();
        let events = decoder.feed(
            b": keep-alive\n\nretry: 3000\nid: 7\nevent: status\ndata: first\ndata:second\n\n",
        )
        .unwrap();
        assert_eq!(
            events,
            vec![SseEvent {
                event: Some("status".into()),
                data: "first\nsecond".into(),
                id: Some("7".into()),
            }]
        );
        assert!(!events[0].is_message());
        assert_eq!(decoder.retry_ms(), Some(3000));
    }

    #[test]
    fn test_blank_event_is_not_dispatched() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.feed(b"event: ping\n\n").unwrap().is_empty());
        let events = decoder.feed(b"data: complete\n\n").unwrap();
        assert_eq!(events[0].event, None);
    }

    #[test]
    fn test_line_limit() {
        let mut decoder = SseDecoder::with_max_line(16);
        assert!(decoder.feed(b"data: 1234").unwrap().is_empty());
        assert_eq!(decoder.feed(b"5678\n\n").unwrap().len(), 1);

        assert!(decoder.feed(b"data: 0123456789").unwrap().is_empty());
        assert_eq!(decoder.feed(b"abcdef"), Err(LineTooLong(16)));
    }

    #[test]
    fn test_terminator_found_after_partial_scans() {
        let mut decoder = SseDecoder::new();
        for piece in [&b"da"[..], b"ta: 3", b"0,2.5", b"0"] {
            assert!(decoder.feed(piece).unwrap().is_empty());
        }
        let events = decoder.feed(b"\n\n").unwrap();
        assert_eq!(events[0].data, "30,2.50");
    }
}
