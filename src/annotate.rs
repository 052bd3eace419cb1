//! Human-readable byte-by-byte trace of a decode.
//!
//! Each consumed byte range becomes one line: the stream offset, the bytes in hex, the
//! labels active at the time, then ` => value` for every value decoded from them.
//!
//! ```text
//!    0 0200                                                                             version major => 2
//! ```

use std::fmt::{self, Write};
use std::time::Instant;

use crate::observer::DecodeObserver;

/// Hex column width, and the wrap width for the remaining-bytes dump.
const HEX_WIDTH: usize = 80;

#[derive(Debug)]
pub struct AnnotationLog {
    out: String,
    labels: Vec<String>,
    needs_newline: bool,
    next_offset: u64,
    mismatched_pops: usize,
    started: Instant,
}

impl Default for AnnotationLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AnnotationLog {
    pub fn new() -> Self {
        Self {
            out: String::new(),
            labels: Vec::new(),
            needs_newline: false,
            next_offset: 0,
            mismatched_pops: 0,
            started: Instant::now(),
        }
    }

    /// Offset just past the last byte range consumed.
    pub fn next_offset(&self) -> u64 {
        self.next_offset
    }

    /// Times a label was popped that was not on top of the stack.
    pub fn mismatched_pops(&self) -> usize {
        self.mismatched_pops
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    /// Close the trace with a dump of whatever the decode left unread.
    pub fn finish(mut self, remaining: &[u8]) -> String {
        self.out.push_str("\n\n");
        let _ = writeln!(self.out, "Remaining bytes: {}", remaining.len());
        if !remaining.is_empty() {
            self.out.push('\n');
            for chunk in remaining.chunks(HEX_WIDTH / 2) {
                let _ = writeln!(self.out, "{}", hex::encode(chunk));
            }
        }
        let _ = writeln!(
            self.out,
            "Time taken: {}ms",
            self.started.elapsed().as_millis()
        );
        self.out
    }
}

impl DecodeObserver for AnnotationLog {
    fn on_read(&mut self, offset: u64, bytes: &[u8]) {
        if self.needs_newline {
            self.out.push('\n');
        }
        self.needs_newline = true;
        self.next_offset = offset + bytes.len() as u64;
        let _ = write!(
            self.out,
            "{:>4} {:<width$} {}",
            offset,
            hex::encode(bytes),
            self.labels.join(" "),
            width = HEX_WIDTH
        );
    }

    fn push_label(&mut self, label: &str) {
        self.labels.push(label.to_owned());
    }

    fn pop_label(&mut self, label: &str) {
        if self.labels.pop().as_deref() != Some(label) {
            self.mismatched_pops += 1;
        }
    }

    fn decoded(&mut self, value: fmt::Arguments<'_>) {
        let _ = write!(self.out, " => {value}");
    }
}
