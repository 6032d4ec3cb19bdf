//! # Line framing
//!
//! Splits the raw serial byte stream into response lines. Reads may end anywhere, so an incomplete
//! trailing line is carried over to the next call of [LineFramer::push].
//!
//! Lines longer than [MAX_LINE_LENGTH] are dropped as a whole, independent of how they were chunked.
use alloc::string::String;
use alloc::vec::Vec;

/// Max. length of a line in bytes, excluding the line feed
pub const MAX_LINE_LENGTH: usize = 2048;

/// Turns raw serial chunks into complete lines
#[derive(Default, Debug)]
pub struct LineFramer {
    /// Bytes of a line which was not terminated yet
    carry: Vec<u8>,

    /// True if the current line exceeded the max. length. Skipped up to the next line feed.
    overflow: bool,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the chunk and returns all lines completed by it, in arrival order.
    ///
    /// Lines are returned without the line feed and without a carriage return directly preceding it.
    /// Decoding happens per complete line, so multi byte characters split between reads are kept intact.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.carry.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;

        while let Some(offset) = self.carry[start..].iter().position(|byte| *byte == b'\n') {
            let end = start + offset;

            if self.overflow || offset > MAX_LINE_LENGTH {
                log::warn!("Dropped line exceeding {} bytes", MAX_LINE_LENGTH);
                self.overflow = false;
            } else {
                lines.push(Self::decode(&self.carry[start..end]));
            }

            start = end + 1;
        }

        self.carry.drain(..start);

        if self.carry.len() > MAX_LINE_LENGTH {
            self.overflow = true;
            self.carry.clear();
        }

        lines
    }

    /// Length of the pending partial line
    pub fn pending(&self) -> usize {
        self.carry.len()
    }

    /// Drops a pending partial line
    pub fn clear(&mut self) {
        self.carry.clear();
        self.overflow = false;
    }

    fn decode(line: &[u8]) -> String {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        String::from_utf8_lossy(line).into_owned()
    }
}
