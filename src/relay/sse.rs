// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Line framing and event parsing for the upstream stream

use super::types::{ChunkEvent, RelayError};

/// Longest line accepted before a newline arrives
pub const MAX_PENDING_LINE: usize = 1024 * 1024;

/// Splits a byte stream into lines across arbitrary chunk boundaries.
///
/// Bytes are buffered until a `\n` arrives so that multi-byte UTF-8 sequences
/// split between chunks decode correctly. A trailing `\r` is stripped.
/// The buffer never holds a newline between pushes, so each push only scans
/// the bytes it appended.
#[derive(Debug)]
pub struct LineDecoder {
    buffer: Vec<u8>,
    max_line: usize,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::with_max_line(MAX_PENDING_LINE)
    }
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_line(max_line: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_line,
        }
    }

    /// Feed a chunk and return every line it completes.
    ///
    /// Fails once the unterminated tail grows past the line limit.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, RelayError> {
        let mut search_from = self.buffer.len();
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[search_from..].iter().position(|b| *b == b'\n') {
            let end = search_from + offset;
            lines.push(decode_line(&self.buffer[start..end]));
            start = end + 1;
            search_from = start;
        }
        self.buffer.drain(..start);

        if self.buffer.len() > self.max_line {
            let pending = self.buffer.len();
            self.buffer.clear();
            return Err(RelayError::Connection(format!(
                "Upstream line exceeded {} bytes without a newline ({} pending)",
                self.max_line, pending
            )));
        }
        Ok(lines)
    }

    /// Flush an unterminated final line at end of body
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        Some(decode_line(&line))
    }
}

fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    String::from_utf8_lossy(bytes).into_owned()
}

/// What one line of the stream means
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedLine {
    /// Blank line, comment or non-data field
    Skip,
    /// The `[DONE]` sentinel
    Done,
    /// Text delta, possibly empty
    Delta(String),
    /// Payload that is not a valid event, with the parse error
    Malformed { raw: String, error: String },
}

/// Interpret one line.
///
/// `data:` is stripped with or without a following space; lines without it
/// are parsed as bare JSON.
pub fn parse_line(line: &str) -> ParsedLine {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with(':') {
        return ParsedLine::Skip;
    }

    let payload = match trimmed.strip_prefix("data:") {
        Some(rest) => rest.trim(),
        None => {
            if ["event:", "id:", "retry:"]
                .iter()
                .any(|field| trimmed.starts_with(field))
            {
                return ParsedLine::Skip;
            }
            trimmed
        }
    };

    if payload.is_empty() {
        return ParsedLine::Skip;
    }
    if payload == "[DONE]" {
        return ParsedLine::Done;
    }

    match serde_json::from_str::<ChunkEvent>(payload) {
        Ok(event) => ParsedLine::Delta(event.delta_text().unwrap_or_default().to_string()),
        Err(e) => ParsedLine::Malformed {
            raw: payload.to_string(),
            error: e.to_string(),
        },
    }
}
