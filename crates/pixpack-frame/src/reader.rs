use bytes::BytesMut;
use pixpack_transport::FrameSource;
use tracing::{debug, warn};

use crate::codec::FrameCodec;
use crate::error::Result;

/// Result of one [`FrameReader::read_frame`] call.
#[derive(Debug)]
pub enum ReadOutcome {
    /// A complete frame of exactly the codec capacity.
    Frame(BytesMut),
    /// The stream ended. `discarded` counts trailing bytes that did not
    /// make up a full frame; they are dropped, never decoded.
    End { discarded: usize },
}

/// Reads whole fixed-capacity frames from a [`FrameSource`].
///
/// Handles partial reads internally. Callers only ever see full frames or
/// the end of the stream.
pub struct FrameReader<S> {
    inner: S,
    capacity: usize,
    buf: BytesMut,
    frames_read: u64,
    finished: bool,
}

impl<S: FrameSource> FrameReader<S> {
    /// Create a reader producing frames sized for `codec`.
    pub fn new(inner: S, codec: &FrameCodec) -> Self {
        Self::with_capacity(inner, codec.capacity())
    }

    /// Create a reader for an explicit frame capacity.
    pub fn with_capacity(inner: S, capacity: usize) -> Self {
        Self {
            inner,
            capacity,
            buf: BytesMut::with_capacity(capacity),
            frames_read: 0,
            finished: false,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Once the stream has ended every further call returns
    /// `ReadOutcome::End { discarded: 0 }` without touching the source.
    pub fn read_frame(&mut self) -> Result<ReadOutcome> {
        if self.finished {
            return Ok(ReadOutcome::End { discarded: 0 });
        }

        self.buf.clear();
        self.buf.resize(self.capacity, 0);

        let mut filled = 0usize;
        while filled < self.capacity {
            let read = self.inner.read_chunk(&mut self.buf[filled..])?;
            if read == 0 {
                break;
            }
            filled += read;
        }

        if filled < self.capacity {
            self.finished = true;
            self.buf.clear();
            if filled > 0 {
                warn!(
                    discarded = filled,
                    capacity = self.capacity,
                    frames = self.frames_read,
                    "discarding truncated trailing frame"
                );
            } else {
                debug!(frames = self.frames_read, "frame stream ended");
            }
            return Ok(ReadOutcome::End { discarded: filled });
        }

        self.frames_read += 1;
        Ok(ReadOutcome::Frame(self.buf.split()))
    }

    /// Full frames returned so far.
    pub fn frames_read(&self) -> u64 {
        self.frames_read
    }

    /// Frame size this reader produces.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Mutably borrow the underlying source.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consume the reader and return the inner source.
    pub fn into_inner(self) -> S {
        self.inner
    }
}
