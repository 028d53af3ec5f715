//! Line framing shared by the store backends.

use std::ops::Range;

use crate::error::{Result, StoreError};

/// Accumulates raw bytes and hands out complete lines.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub(crate) fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Pop the next newline-terminated line, if one is buffered.
    pub(crate) fn next_line(&mut self, partition: &str) -> Result<Option<String>> {
        let Some(pos) = self.pending.iter().position(|b| *b == b'\n') else {
            return Ok(None);
        };
        let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
        line.pop();
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        decode_line(line, partition).map(Some)
    }
}

/// Where the last complete line of a buffer is.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LastLine {
    Found(Range<usize>),
    /// The buffer holds no complete non-blank line.
    Absent,
    /// The buffer does not start at a line boundary and the candidate line
    /// may extend further back.
    NeedMore,
}

/// Locate the last complete, non-blank line in `buf`.
///
/// `at_start` says whether `buf` begins at a line boundary (the start of
/// the partition or just after a newline). Bytes after the final newline
/// belong to an unfinished write and are ignored.
pub(crate) fn last_complete_line(buf: &[u8], at_start: bool) -> LastLine {
    let Some(mut end) = buf.iter().rposition(|b| *b == b'\n') else {
        return if at_start {
            LastLine::Absent
        } else {
            LastLine::NeedMore
        };
    };

    loop {
        match buf[..end].iter().rposition(|b| *b == b'\n') {
            Some(nl) => {
                if is_blank(&buf[nl + 1..end]) {
                    end = nl;
                    continue;
                }
                return LastLine::Found(nl + 1..trim_cr(buf, nl + 1, end));
            }
            None if !at_start => return LastLine::NeedMore,
            None if is_blank(&buf[..end]) => return LastLine::Absent,
            None => return LastLine::Found(0..trim_cr(buf, 0, end)),
        }
    }
}

pub(crate) fn decode_line(bytes: Vec<u8>, partition: &str) -> Result<String> {
    String::from_utf8(bytes).map_err(|e| StoreError::InvalidData {
        partition: partition.to_string(),
        reason: e.to_string(),
    })
}

fn is_blank(bytes: &[u8]) -> bool {
    bytes.iter().all(u8::is_ascii_whitespace)
}

fn trim_cr(buf: &[u8], start: usize, end: usize) -> usize {
    if end > start && buf[end - 1] == b'\r' {
        end - 1
    } else {
        end
    }
}
