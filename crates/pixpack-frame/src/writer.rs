use pixpack_transport::FrameSink;

use crate::codec::{Frame, FrameCodec};
use crate::error::{FrameError, Result};

/// Writes fixed-capacity frames to a [`FrameSink`].
///
/// Every write is checked against the agreed capacity, so the codec never
/// sees a frame of the wrong size.
pub struct FrameWriter<S> {
    inner: S,
    capacity: usize,
    frames_written: u64,
}

impl<S: FrameSink> FrameWriter<S> {
    /// Create a writer for frames sized by `codec`.
    pub fn new(inner: S, codec: &FrameCodec) -> Self {
        Self::with_capacity(inner, codec.capacity())
    }

    /// Create a writer for an explicit frame capacity.
    pub fn with_capacity(inner: S, capacity: usize) -> Self {
        Self {
            inner,
            capacity,
            frames_written: 0,
        }
    }

    /// Write a packed frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.write_raw(frame.as_bytes())
    }

    /// Write raw frame bytes (blocking). `bytes` must be exactly one frame.
    pub fn write_raw(&mut self, bytes: &[u8]) -> Result<()> {
        if bytes.len() != self.capacity {
            return Err(FrameError::FrameSize {
                expected: self.capacity,
                actual: bytes.len(),
            });
        }
        self.inner.write_chunk(bytes)?;
        self.frames_written += 1;
        Ok(())
    }

    /// Close the stream and wait for the codec to finalize its output.
    pub fn finish(&mut self) -> Result<()> {
        self.inner.finish()?;
        Ok(())
    }

    /// Stop the codec without waiting for it.
    pub fn abort(&mut self) {
        self.inner.abort();
    }

    /// Frames accepted by the sink so far.
    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> &S {
        &self.inner
    }

    /// Mutably borrow the underlying sink.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.inner
    }

    /// Consume the writer and return the inner sink.
    pub fn into_inner(self) -> S {
        self.inner
    }
}
