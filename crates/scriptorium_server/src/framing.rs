//! Incremental framing for streamed response bodies.
//!
//! Network chunks split events at arbitrary byte offsets, including inside
//! multi-byte characters. Both decoders buffer raw bytes and only decode
//! complete lines.

use scriptorium_error::{ServerError, ServerErrorKind};

/// One Server-Sent Event relevant to chat completion streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    /// A `data:` payload (multiple data lines are joined with `\n`)
    Data(String),
    /// The `data: [DONE]` terminator
    Done,
}

/// Splits a byte stream into complete lines.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and return every line they complete, without terminators.
    ///
    /// # Examples
    ///
    /// ```
    /// use scriptorium_server::LineDecoder;
    ///
    /// let mut decoder = LineDecoder::new();
    /// assert!(decoder.push(b"{\"response\":\"Sa").unwrap().is_empty());
    /// let lines = decoder.push(b"lt\"}\n{\"done\":true}\n").unwrap();
    /// assert_eq!(lines, vec!["{\"response\":\"Salt\"}", "{\"done\":true}"]);
    /// ```
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<String>, ServerError> {
        self.buffer.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            let text = decode_line(&line[..line.len() - 1])?;
            lines.push(text);
        }
        Ok(lines)
    }

    /// Return the trailing unterminated line, if any.
    pub fn finish(&mut self) -> Result<Option<String>, ServerError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }
        let rest = std::mem::take(&mut self.buffer);
        let text = decode_line(&rest)?;
        Ok((!text.trim().is_empty()).then_some(text))
    }
}

/// Decodes `text/event-stream` bodies into [`SseEvent`]s.
///
/// Comment lines (`:`) and fields other than `data` are ignored. An event is
/// dispatched at the blank line that ends it.
#[derive(Debug, Default)]
pub struct SseDecoder {
    lines: LineDecoder,
    data: Vec<String>,
}

impl SseDecoder {
    /// Create an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and return every event they complete.
    ///
    /// # Examples
    ///
    /// ```
    /// use scriptorium_server::{SseDecoder, SseEvent};
    ///
    /// let mut decoder = SseDecoder::new();
    /// let events = decoder.push(b": keep-alive\n\ndata: {\"a\":1}\n\ndata: [DONE]\n\n").unwrap();
    /// assert_eq!(events, vec![SseEvent::Data("{\"a\":1}".into()), SseEvent::Done]);
    /// ```
    pub fn push(&mut self, bytes: &[u8]) -> Result<Vec<SseEvent>, ServerError> {
        let mut events = Vec::new();
        for line in self.lines.push(bytes)? {
            self.accept_line(&line, &mut events);
        }
        Ok(events)
    }

    /// Flush a final event whose terminating blank line never arrived.
    pub fn finish(&mut self) -> Result<Vec<SseEvent>, ServerError> {
        let mut events = Vec::new();
        if let Some(line) = self.lines.finish()? {
            self.accept_line(&line, &mut events);
        }
        self.dispatch(&mut events);
        Ok(events)
    }

    fn accept_line(&mut self, line: &str, events: &mut Vec<SseEvent>) {
        if line.is_empty() {
            self.dispatch(events);
        } else if let Some(value) = line.strip_prefix("data:") {
            self.data.push(value.strip_prefix(' ').unwrap_or(value).to_string());
        }
    }

    fn dispatch(&mut self, events: &mut Vec<SseEvent>) {
        if self.data.is_empty() {
            return;
        }
        let payload = self.data.join("\n");
        self.data.clear();
        if payload.trim() == "[DONE]" {
            events.push(SseEvent::Done);
        } else {
            events.push(SseEvent::Data(payload));
        }
    }
}

fn decode_line(bytes: &[u8]) -> Result<String, ServerError> {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8(bytes.to_vec()).map_err(|e| {
        ServerError::new(ServerErrorKind::Stream(format!("Invalid UTF-8: {}", e)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_multibyte_character_split_across_chunks() {
        let text = "data: café\n\n".as_bytes();
        let split = text.iter().position(|b| *b == 0xC3).unwrap() + 1;
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(&text[..split]).unwrap().is_empty());
        let events = decoder.push(&text[split..]).unwrap();
        assert_eq!(events, vec![SseEvent::Data("café".into())]);
    }

    #[test]
    fn test_several_events_in_one_chunk() {
        let mut decoder = SseDecoder::new();
        let events = decoder
            .push(b"data: one\n\ndata: two\r\n\r\ndata: three\n\n")
            .unwrap();
        assert_eq!(
            events,
            vec![
                SseEvent::Data("one".into()),
                SseEvent::Data("two".into()),
                SseEvent::Data("three".into()),
            ]
        );
    }

    #[test]
    fn test_multiline_data_joined() {
        let mut decoder = SseDecoder::new();
        let events = decoder.push(b"event: message\ndata: a\ndata: b\n\n").unwrap();
        assert_eq!(events, vec![SseEvent::Data("a\nb".into())]);
    }

    #[test]
    fn test_finish_flushes_unterminated_event() {
        let mut decoder = SseDecoder::new();
        assert!(decoder.push(b"data: tail").unwrap().is_empty());
        assert_eq!(decoder.finish().unwrap(), vec![SseEvent::Data("tail".into())]);
    }

    #[test]
    fn test_line_decoder_finish() {
        let mut decoder = LineDecoder::new();
        assert_eq!(decoder.push(b"a\nb").unwrap(), vec!["a".to_string()]);
        assert_eq!(decoder.finish().unwrap(), Some("b".to_string()));
        assert_eq!(decoder.finish().unwrap(), None);
    }

    #[test]
    fn test_invalid_utf8_is_stream_error() {
        let mut decoder = LineDecoder::new();
        let err = decoder.push(&[0xFF, 0xFE, b'\n']).unwrap_err();
        assert!(matches!(err.kind, ServerErrorKind::Stream(_)));
    }
}
