// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire encoding: one JSON record per line
//!
//! Several records may arrive in a single read, and a record may be cut
//! across reads; [`Deframer`] buffers bytes and yields every complete line.

use crate::message::Message;
use thiserror::Error;

/// Upper bound on a single buffered record, in bytes
pub const MAX_FRAME_LEN: usize = 64 * 1024;

const DELIMITER: u8 = b'\n';

/// Errors from encoding or decoding records
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("record exceeds {max} bytes without a delimiter ({len} buffered)")]
    FrameTooLong { len: usize, max: usize },
}

/// Encode a message as a single newline-terminated JSON record
pub fn encode(message: &Message) -> Result<Vec<u8>, CodecError> {
    let mut bytes = serde_json::to_vec(message)?;
    bytes.push(DELIMITER);
    Ok(bytes)
}

/// Decode one record (with or without its trailing delimiter)
pub fn decode(frame: &[u8]) -> Result<Message, CodecError> {
    Ok(serde_json::from_slice(frame)?)
}

/// Incremental splitter for a byte stream of records
#[derive(Debug, Default)]
pub struct Deframer {
    buf: Vec<u8>,
}

impl Deframer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes held back waiting for a delimiter
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Append bytes read from the stream.
    ///
    /// If the unterminated tail grows beyond [`MAX_FRAME_LEN`] the buffer is
    /// discarded, since no delimiter can make it a valid record.
    pub fn push(&mut self, bytes: &[u8]) -> Result<(), CodecError> {
        self.buf.extend_from_slice(bytes);
        let tail = match self.buf.iter().rposition(|b| *b == DELIMITER) {
            Some(pos) => self.buf.len() - pos - 1,
            None => self.buf.len(),
        };
        if tail > MAX_FRAME_LEN {
            let len = self.buf.len();
            self.buf.clear();
            return Err(CodecError::FrameTooLong {
                len,
                max: MAX_FRAME_LEN,
            });
        }
        Ok(())
    }

    /// Next complete record, without its delimiter
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let pos = self.buf.iter().position(|b| *b == DELIMITER)?;
        let mut frame: Vec<u8> = self.buf.drain(..=pos).collect();
        frame.pop();
        Some(frame)
    }

    /// Push a read and decode every record it completes.
    ///
    /// Each record decodes independently: a malformed one yields an error in
    /// its slot and the records around it are still returned. Blank lines are
    /// skipped.
    pub fn decode_read(&mut self, bytes: &[u8]) -> Vec<Result<Message, CodecError>> {
        let mut out = Vec::new();
        if let Err(e) = self.push(bytes) {
            out.push(Err(e));
            return out;
        }
        while let Some(frame) = self.next_frame() {
            if frame.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            out.push(decode(&frame));
        }
        out
    }
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
