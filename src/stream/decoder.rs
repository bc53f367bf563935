use log::warn;
use std::str;

use super::protocol::{ ERROR_TAG, TEXT_TAG };

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedFragment {
    Text(String),
    Error(String),
}

/// Stateful decoder for the proxy's chunked response body.
///
/// Network chunks may end in the middle of a UTF-8 sequence or in the middle
/// of a line; both tails are carried over to the next `push`.
#[derive(Debug, Default)]
pub struct FragmentDecoder {
    pending_bytes: Vec<u8>,
    line: String,
    /// Prefix of `line` already known to hold no newline.
    scanned: usize,
    skipped: usize,
}

impl FragmentDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of malformed lines dropped so far.
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    pub fn push(&mut self, chunk: &[u8]) -> Vec<DecodedFragment> {
        self.pending_bytes.extend_from_slice(chunk);
        let text = self.take_decoded();
        self.line.push_str(&text);

        let mut out = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.line[self.scanned..].find('\n') {
            let end = self.scanned + offset;
            let complete = self.line[start..end].to_string();
            start = end + 1;
            self.scanned = start;
            if let Some(fragment) = self.decode_line(&complete) {
                out.push(fragment);
            }
        }
        self.line.drain(..start);
        self.scanned = self.line.len();
        out
    }

    /// Flushes whatever is left once the reader reports completion.
    pub fn finish(&mut self) -> Vec<DecodedFragment> {
        if !self.pending_bytes.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending_bytes).into_owned();
            self.pending_bytes.clear();
            self.line.push_str(&tail);
        }
        self.scanned = 0;
        let last = std::mem::take(&mut self.line);
        self.decode_line(&last).into_iter().collect()
    }

    fn take_decoded(&mut self) -> String {
        let mut out = String::with_capacity(self.pending_bytes.len());
        let mut start = 0;
        loop {
            match str::from_utf8(&self.pending_bytes[start..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    start = self.pending_bytes.len();
                    break;
                }
                Err(e) => {
                    let valid_end = start + e.valid_up_to();
                    // Valid by construction.
                    if let Ok(valid) = str::from_utf8(&self.pending_bytes[start..valid_end]) {
                        out.push_str(valid);
                    }
                    match e.error_len() {
                        Some(len) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + len;
                        }
                        None => {
                            // Incomplete sequence at the end: wait for more bytes.
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }
        self.pending_bytes.drain(..start);
        out
    }

    fn decode_line(&mut self, raw: &str) -> Option<DecodedFragment> {
        let line = raw.strip_suffix('\r').unwrap_or(raw);
        if line.is_empty() {
            return None;
        }
        let (tag, payload) = line.split_once(':')?;
        match tag {
            TEXT_TAG => match serde_json::from_str::<String>(payload) {
                Ok(text) => Some(DecodedFragment::Text(text)),
                Err(e) => {
                    self.skipped += 1;
                    warn!("Failed to parse streaming chunk {:?}: {}", payload, e);
                    None
                }
            },
            ERROR_TAG => match serde_json::from_str::<String>(payload) {
                Ok(message) => Some(DecodedFragment::Error(message)),
                Err(e) => {
                    self.skipped += 1;
                    warn!("Failed to parse stream error part {:?}: {}", payload, e);
                    None
                }
            },
            _ => None,
        }
    }
}
