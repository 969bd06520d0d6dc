//! In-memory stand-ins for the external codec.
//!
//! A [`MemorySink`] records what an encoder would have fed the codec, and a
//! [`MemorySource`] replays bytes as if the codec were decoding them. Both can
//! inject the failures a real codec produces: broken pipes, short reads and
//! unsuccessful exits.

use std::io::ErrorKind;

use crate::error::{Result, TransportError};
use crate::traits::{FrameSink, FrameSource};

const MEMORY_PROGRAM: &str = "memory-codec";

/// Collects every written chunk in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    data: Vec<u8>,
    chunk_lens: Vec<usize>,
    fail_after_chunks: Option<usize>,
    exit_code: Option<i32>,
    finished: bool,
    aborted: bool,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `chunks` writes, then fail every further write with a broken pipe.
    pub fn fail_after_chunks(mut self, chunks: usize) -> Self {
        self.fail_after_chunks = Some(chunks);
        self
    }

    /// Make `finish` report an unsuccessful exit with `code`.
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Everything written so far.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Length of each accepted `write_chunk` call, in order.
    pub fn chunk_lens(&self) -> &[usize] {
        &self.chunk_lens
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn into_inner(self) -> Vec<u8> {
        self.data
    }
}

impl FrameSink for MemorySink {
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        if self.finished || self.aborted {
            return Err(TransportError::Closed);
        }
        if let Some(limit) = self.fail_after_chunks {
            if self.chunk_lens.len() >= limit {
                return Err(TransportError::Io(std::io::Error::from(
                    ErrorKind::BrokenPipe,
                )));
            }
        }
        self.data.extend_from_slice(chunk);
        self.chunk_lens.push(chunk.len());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if self.aborted {
            return Err(TransportError::Closed);
        }
        self.finished = true;
        match self.exit_code {
            Some(code) if code != 0 => Err(TransportError::Exited {
                program: MEMORY_PROGRAM.to_string(),
                code: Some(code),
            }),
            _ => Ok(()),
        }
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}

/// Replays a byte buffer as a codec output stream.
#[derive(Debug, Default)]
pub struct MemorySource {
    data: Vec<u8>,
    pos: usize,
    max_read: Option<usize>,
    fail_at: Option<usize>,
    exit_code: Option<i32>,
    finished: bool,
    aborted: bool,
}

impl MemorySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    /// Return at most `max` bytes per read, like a pipe delivering partial reads.
    pub fn with_max_read(mut self, max: usize) -> Self {
        self.max_read = Some(max.max(1));
        self
    }

    /// Fail with an I/O error once the read position reaches `offset`.
    pub fn failing_at(mut self, offset: usize) -> Self {
        self.fail_at = Some(offset);
        self
    }

    /// Make `finish` report an unsuccessful exit with `code`.
    pub fn with_exit_code(mut self, code: i32) -> Self {
        self.exit_code = Some(code);
        self
    }

    /// Bytes handed out so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }
}

impl FrameSource for MemorySource {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.finished || self.aborted {
            return Err(TransportError::Closed);
        }
        if let Some(offset) = self.fail_at {
            if self.pos >= offset {
                return Err(TransportError::Io(std::io::Error::other(
                    "injected codec read failure",
                )));
            }
        }

        let mut n = buf.len().min(self.data.len() - self.pos);
        if let Some(max) = self.max_read {
            n = n.min(max);
        }
        if let Some(offset) = self.fail_at {
            n = n.min(offset - self.pos);
        }
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }

    fn finish(&mut self) -> Result<()> {
        if self.aborted {
            return Err(TransportError::Closed);
        }
        self.finished = true;
        match self.exit_code {
            Some(code) if code != 0 => Err(TransportError::Exited {
                program: MEMORY_PROGRAM.to_string(),
                code: Some(code),
            }),
            _ => Ok(()),
        }
    }

    fn abort(&mut self) {
        self.aborted = true;
    }
}
