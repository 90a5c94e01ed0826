//! Line sources for NMEA data.
//!
//! Input modes:
//! - Files and stdin: one sentence per line, read synchronously
//! - TCP feeds: arbitrary byte chunks, split into lines by `LineBuffer`

use std::fs;
use std::io::{self, BufRead};
use std::path::Path;

/// Longest line kept from a stream. AIS sentences are at most 82 characters;
/// the rest is room for tag blocks and receiver prefixes.
pub const MAX_LINE_LEN: usize = 1024;

/// Trim a raw input line and drop blanks and `#` comments.
pub fn clean_line(line: &str) -> Option<&str> {
    let line = line.trim_matches(|c: char| c.is_whitespace() || c == '\0');
    if line.is_empty() || line.starts_with('#') {
        return None;
    }
    Some(line)
}

/// Open a file, or stdin for `-`.
pub fn open_lines(path: &Path) -> io::Result<Box<dyn BufRead>> {
    if path.as_os_str() == "-" {
        Ok(Box::new(io::BufReader::new(io::stdin())))
    } else {
        let f = fs::File::open(path)?;
        Ok(Box::new(io::BufReader::new(f)))
    }
}

// ---------------------------------------------------------------------------
// Stream splitting
// ---------------------------------------------------------------------------

/// Reassembles lines from a byte stream delivered in arbitrary chunks.
///
/// Accepts `\n` or `\r\n` terminators. Bytes that are not valid UTF-8 are
/// replaced; lines longer than `MAX_LINE_LEN` are dropped whole.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
    overflow: bool,
    /// Lines dropped for exceeding `MAX_LINE_LEN`.
    pub dropped: u64,
    reported: u64,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a chunk and return every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut lines = Vec::new();
        for &b in chunk {
            if b == b'\n' {
                if self.overflow {
                    self.overflow = false;
                    self.dropped += 1;
                } else {
                    lines.push(self.take_line());
                }
                self.pending.clear();
                continue;
            }
            if self.overflow {
                continue;
            }
            if self.pending.len() >= MAX_LINE_LEN {
                self.overflow = true;
                self.pending.clear();
                continue;
            }
            self.pending.push(b);
        }
        lines
    }

    /// Whatever is left once the stream ends.
    pub fn finish(&mut self) -> Option<String> {
        if self.overflow {
            self.overflow = false;
            self.dropped += 1;
            self.pending.clear();
            return None;
        }
        if self.pending.is_empty() {
            return None;
        }
        let line = self.take_line();
        self.pending.clear();
        Some(line)
    }

    /// Lines dropped since the previous call.
    pub fn take_dropped(&mut self) -> u64 {
        let fresh = self.dropped - self.reported;
        self.reported = self.dropped;
        fresh
    }

    fn take_line(&self) -> String {
        let bytes = self.pending.strip_suffix(b"\r").unwrap_or(&self.pending);
        String::from_utf8_lossy(bytes).into_owned()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
