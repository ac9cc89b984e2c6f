//! Newline-delimited JSON decoding for streamed responses.
//!
//! Bytes arrive in arbitrary network-sized pieces. [`LineDecoder`] keeps
//! the trailing partial line between pushes so a record split across two
//! reads (even inside a multi-byte UTF-8 character) is decoded exactly
//! once, after its terminating newline arrives.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One decoded record of a streamed response.
///
/// A JSON object line puts its string `content` field into
/// [`content`](Self::content) and every other field into
/// [`extra`](Self::extra). A line that is not a JSON object is delivered as
/// raw text in `content`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StreamChunk {
    /// Incremental text payload, if present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Remaining fields of the record.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StreamChunk {
    /// A chunk carrying only text.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            extra: Map::new(),
        }
    }

    /// Split a decoded JSON object into content and extra fields.
    pub fn from_record(mut record: Map<String, Value>) -> Self {
        let content = match record.remove("content") {
            Some(Value::String(s)) => Some(s),
            Some(other) => {
                record.insert("content".into(), other);
                None
            }
            None => None,
        };
        Self {
            content,
            extra: record,
        }
    }

    /// Whether the record marks the end of the stream (`"done": true`).
    pub fn is_done(&self) -> bool {
        matches!(self.extra.get("done"), Some(Value::Bool(true)))
    }
}

/// How a stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// The server closed the body; every record was delivered.
    Completed {
        /// Number of chunks delivered.
        chunks: usize,
    },
    /// The caller cancelled; nothing was delivered after the signal.
    Cancelled {
        /// Number of chunks delivered before cancellation.
        chunks: usize,
    },
}

impl StreamOutcome {
    /// Number of chunks delivered either way.
    pub fn chunks(&self) -> usize {
        match self {
            Self::Completed { chunks } | Self::Cancelled { chunks } => *chunks,
        }
    }
}

/// Incremental NDJSON line splitter.
#[derive(Debug, Default)]
pub struct LineDecoder {
    buffer: Vec<u8>,
}

impl LineDecoder {
    /// An empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed bytes and return every record completed by them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<StreamChunk> {
        self.buffer.extend_from_slice(bytes);
        let mut out = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(chunk) = decode_line(&line[..line.len() - 1]) {
                out.push(chunk);
            }
        }
        out
    }

    /// Flush the trailing unterminated line, if any.
    pub fn finish(&mut self) -> Option<StreamChunk> {
        let rest = std::mem::take(&mut self.buffer);
        decode_line(&rest)
    }

    /// Bytes held back waiting for a newline.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn decode_line(raw: &[u8]) -> Option<StreamChunk> {
    let line = String::from_utf8_lossy(raw);
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(line) {
        Ok(Value::Object(record)) => Some(StreamChunk::from_record(record)),
        _ => Some(StreamChunk::text(line)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_split_across_pushes_is_decoded_once() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(br#"{"content":"hel"#).is_empty());
        let chunks = decoder.push(b"lo\"}\n{\"content\":\" world\"}\n");
        assert_eq!(
            chunks,
            vec![StreamChunk::text("hello"), StreamChunk::text(" world")]
        );
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_utf8_split_inside_character() {
        let line = "{\"content\":\"caf\u{e9}\"}\n".as_bytes();
        let split = line.len() - 4;
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(&line[..split]).is_empty());
        let chunks = decoder.push(&line[split..]);
        assert_eq!(chunks[0].content.as_deref(), Some("caf\u{e9}"));
    }

    #[test]
    fn test_blank_lines_and_crlf_are_skipped() {
        let mut decoder = LineDecoder::new();
        let chunks = decoder.push(b"\r\n\n{\"content\":\"a\"}\r\n");
        assert_eq!(chunks, vec![StreamChunk::text("a")]);
    }

    #[test]
    fn test_non_json_line_is_raw_text() {
        let mut decoder = LineDecoder::new();
        let chunks = decoder.push(b"plain words\n");
        assert_eq!(chunks, vec![StreamChunk::text("plain words")]);
    }

    #[test]
    fn test_extra_fields_are_kept() {
        let mut decoder = LineDecoder::new();
        let chunks = decoder.push(b"{\"content\":\"x\",\"done\":true,\"tokens\":3}\n");
        assert!(chunks[0].is_done());
        assert_eq!(chunks[0].extra.get("tokens"), Some(&Value::from(3)));
    }

    #[test]
    fn test_non_string_content_stays_in_extra() {
        let chunk = StreamChunk::from_record(
            serde_json::from_str(r#"{"content":{"delta":"x"}}"#).unwrap(),
        );
        assert!(chunk.content.is_none());
        assert!(chunk.extra.contains_key("content"));
    }

    #[test]
    fn test_finish_flushes_unterminated_line() {
        let mut decoder = LineDecoder::new();
        assert!(decoder.push(br#"{"content":"tail"}"#).is_empty());
        assert_eq!(decoder.finish(), Some(StreamChunk::text("tail")));
        assert_eq!(decoder.finish(), None);
    }
}
