//! Output tee: forward process output to a sink while capturing it

use std::io::{self, Write};

/// A single writer that forwards process output to a caller-supplied sink
/// and appends it to an in-memory accumulator.
///
/// Output arrives either as lines ([`push_line`](Self::push_line)) or as raw
/// chunks ([`push_chunk`](Self::push_chunk)). Chunks reach the sink byte for
/// byte; the accumulator decodes them as UTF-8, holding back a multi-byte
/// character split across two chunks until its tail arrives.
///
/// The accumulator always receives the output, even when the sink fails, so
/// the captured output stays complete if e.g. stdout is a closed pipe.
#[derive(Debug)]
pub struct OutputTee<W> {
    sink: W,
    captured: String,
    partial: Vec<u8>,
}

impl<W: Write> OutputTee<W> {
    /// Create a tee writing into `sink`
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            captured: String::new(),
            partial: Vec::new(),
        }
    }

    /// Record one output line (without its trailing newline)
    pub fn push_line(&mut self, line: &str) -> io::Result<()> {
        self.captured.push_str(line);
        self.captured.push('\n');
        writeln!(self.sink, "{}", line)?;
        self.sink.flush()
    }

    /// Record raw output exactly as the process wrote it
    pub fn push_chunk(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.capture_bytes(bytes);
        self.sink.write_all(bytes)?;
        self.sink.flush()
    }

    fn capture_bytes(&mut self, bytes: &[u8]) {
        self.partial.extend_from_slice(bytes);

        // An incomplete UTF-8 sequence is at most three bytes long
        let len = self.partial.len();
        let split = (len.saturating_sub(3)..len)
            .find(|&i| is_incomplete_char(&self.partial[i..]))
            .unwrap_or(len);

        let rest = self.partial.split_off(split);
        self.captured.push_str(&String::from_utf8_lossy(&self.partial));
        self.partial = rest;
    }

    /// Everything captured so far
    pub fn captured(&self) -> &str {
        &self.captured
    }

    /// Give back the sink and the captured output
    pub fn into_parts(mut self) -> (W, String) {
        self.finish();
        (self.sink, self.captured)
    }

    /// Consume the tee, keeping only the captured output
    pub fn into_output(mut self) -> String {
        self.finish();
        self.captured
    }

    fn finish(&mut self) {
        if !self.partial.is_empty() {
            self.captured.push_str(&String::from_utf8_lossy(&self.partial));
            self.partial.clear();
        }
    }
}

/// Whether `bytes` is the start of a valid multi-byte character
fn is_incomplete_char(bytes: &[u8]) -> bool {
    match std::str::from_utf8(bytes) {
        Ok(_) => false,
        Err(e) => e.valid_up_to() == 0 && e.error_len().is_none(),
    }
}
