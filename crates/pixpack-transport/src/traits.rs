use crate::error::Result;

/// Write side of the external codec: a raw pixel byte stream.
///
/// The sink does not know about frames. Callers are responsible for
/// handing it back-to-back chunks of exactly one frame each.
pub trait FrameSink {
    /// Write every byte of `chunk` (blocking).
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<()>;

    /// Close the stream and wait for the codec to finalize its output.
    ///
    /// Fails if the codec reports an unsuccessful exit.
    fn finish(&mut self) -> Result<()>;

    /// Stop the codec without waiting for a clean exit.
    fn abort(&mut self) {}
}

/// Read side of the external codec: a raw pixel byte stream.
pub trait FrameSource {
    /// Read up to `buf.len()` bytes, `Read`-style. `Ok(0)` means end of stream.
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize>;

    /// Reap the codec after end of stream.
    ///
    /// Fails if the codec reports an unsuccessful exit, even when the stream
    /// itself ended normally.
    fn finish(&mut self) -> Result<()>;

    /// Stop the codec without waiting for a clean exit.
    fn abort(&mut self) {}
}

impl<T: FrameSink + ?Sized> FrameSink for Box<T> {
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        (**self).write_chunk(chunk)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }

    fn abort(&mut self) {
        (**self).abort()
    }
}

impl<T: FrameSource + ?Sized> FrameSource for Box<T> {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_chunk(buf)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }

    fn abort(&mut self) {
        (**self).abort()
    }
}

impl<T: FrameSink + ?Sized> FrameSink for &mut T {
    fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        (**self).write_chunk(chunk)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }

    fn abort(&mut self) {
        (**self).abort()
    }
}

impl<T: FrameSource + ?Sized> FrameSource for &mut T {
    fn read_chunk(&mut self, buf: &mut [u8]) -> Result<usize> {
        (**self).read_chunk(buf)
    }

    fn finish(&mut self) -> Result<()> {
        (**self).finish()
    }

    fn abort(&mut self) {
        (**self).abort()
    }
}
