/// Events emitted during LLM streaming response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Incremental text content from the model.
    TextDelta { text: String },

    /// Stream completed successfully.
    Done {
        model: String,
        tokens_in: u32,
        tokens_out: u32,
        stop_reason: String,
    },

    /// Error during streaming.
    Error { message: String },
}

/// Parse a single SSE line.
/// SSE format: `event: <type>\ndata: <payload>\n\n`
pub fn parse_sse_line(line: &str) -> Option<SseParsed> {
    if let Some(event_type) = line.strip_prefix("event:") {
        Some(SseParsed::Event(event_type.trim_start().to_string()))
    } else {
        line.strip_prefix("data:")
            .map(|data| SseParsed::Data(data.trim_start().to_string()))
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum SseParsed {
    Event(String),
    Data(String),
}

/// Reassembles SSE lines from arbitrary network chunks.
///
/// Buffers raw bytes so a multi-byte character split across two chunks is
/// decoded only once both halves have arrived.
#[derive(Debug, Default)]
pub struct SseLines {
    buf: Vec<u8>,
}

impl SseLines {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and return every line completed by them, trimmed.
    /// Blank lines are skipped.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let Some(last_newline) = self.buf.iter().rposition(|b| *b == b'\n') else {
            return Vec::new();
        };
        let rest = self.buf.split_off(last_newline + 1);
        let complete = std::mem::replace(&mut self.buf, rest);

        complete
            .split(|b| *b == b'\n')
            .map(|line| String::from_utf8_lossy(line).trim().to_string())
            .filter(|line| !line.is_empty())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_event_and_data_lines() {
        assert_eq!(
            parse_sse_line("event: message"),
            Some(SseParsed::Event("message".into()))
        );
        assert_eq!(
            parse_sse_line("data: {\"a\":1}"),
            Some(SseParsed::Data("{\"a\":1}".into()))
        );
        assert_eq!(parse_sse_line("data:[DONE]"), Some(SseParsed::Data("[DONE]".into())));
        assert_eq!(parse_sse_line(": keep-alive"), None);
    }

    #[test]
    fn holds_incomplete_lines() {
        let mut lines = SseLines::new();
        assert!(lines.push(b"data: hel").is_empty());
        assert_eq!(lines.push(b"lo\n\ndata: wor"), vec!["data: hello"]);
        assert_eq!(lines.push(b"ld\r\n"), vec!["data: world"]);
    }

    #[test]
    fn multibyte_char_split_across_chunks() {
        let bytes = "data: café\n".as_bytes();
        let split = bytes.len() - 2; // inside the two-byte 'é'
        let mut lines = SseLines::new();
        assert!(lines.push(&bytes[..split]).is_empty());
        assert_eq!(lines.push(&bytes[split..]), vec!["data: café"]);
    }
}
