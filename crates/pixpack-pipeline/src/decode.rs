use std::fmt;
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use pixpack_frame::{FrameCodec, FrameConfig, FrameReader, FrameTransform, Identity, ReadOutcome};
use pixpack_transport::FrameSource;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::cancel::CancelToken;
use crate::error::{PipelineError, Result};
use crate::progress::{PipelineState, Progress, ProgressSnapshot};
use crate::run::{run_pair, RunContext};
use crate::{DEFAULT_PROGRESS_INTERVAL, DEFAULT_QUEUE_DEPTH};

/// Decode pipeline settings.
#[derive(Debug, Clone, Copy)]
pub struct DecodeConfig {
    /// Must match the geometry the stream was encoded with.
    pub frame: FrameConfig,
    /// Frames buffered between codec and writer. Default: 64.
    pub queue_depth: usize,
    /// How often the progress observer is called. Default: 500 ms.
    pub progress_interval: Duration,
    /// Reject out-of-order frames and frames after the final one. Default: on.
    pub verify_sequence: bool,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            verify_sequence: true,
        }
    }
}

/// Summary of a successful decode run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DecodeReport {
    /// Whole frames decoded.
    pub frames: u64,
    /// Payload bytes written to the output.
    pub bytes_written: u64,
    /// Trailing bytes from the codec that did not make up a whole frame.
    pub discarded_tail_bytes: u64,
}

/// Streams frames from a [`FrameSource`] back into the original bytes.
///
/// The producer thread reads whole frames and reaps the codec at end of
/// stream; the consumer thread unpacks each frame and writes its payload.
pub struct Decoder {
    codec: FrameCodec,
    config: DecodeConfig,
    transform: Arc<dyn FrameTransform>,
    progress: Progress,
    cancel: CancelToken,
}

impl Decoder {
    /// Create a decoder. Fails if the frame geometry cannot hold a header.
    pub fn new(config: DecodeConfig) -> Result<Self> {
        Ok(Self {
            codec: FrameCodec::new(&config.frame)?,
            config,
            transform: Arc::new(Identity),
            progress: Progress::new(),
            cancel: CancelToken::new(),
        })
    }

    /// Undo `transform` on every frame before unpacking it.
    pub fn with_transform(mut self, transform: Arc<dyn FrameTransform>) -> Self {
        self.transform = transform;
        self
    }

    /// Stop runs when `token` is cancelled.
    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn codec(&self) -> &FrameCodec {
        &self.codec
    }

    pub fn config(&self) -> &DecodeConfig {
        &self.config
    }

    /// Handle onto the progress of the current or last run.
    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Decode every frame from `source` into `output`.
    ///
    /// A codec that exits unsuccessfully fails the run even if all frames
    /// were written. On failure the source is aborted and `output` holds an
    /// unspecified prefix of the data.
    pub fn run<S, W>(&self, source: &mut S, output: W) -> Result<DecodeReport>
    where
        S: FrameSource + Send,
        W: Write + Send,
    {
        self.run_inner(source, output, None)
    }

    /// Like [`run`](Self::run), calling `observer` with progress snapshots
    /// from the calling thread while the workers run.
    pub fn run_with_observer<S, W, F>(
        &self,
        source: &mut S,
        output: W,
        mut observer: F,
    ) -> Result<DecodeReport>
    where
        S: FrameSource + Send,
        W: Write + Send,
        F: FnMut(&ProgressSnapshot),
    {
        self.run_inner(source, output, Some(&mut observer))
    }

    fn run_inner<S, W>(
        &self,
        source: &mut S,
        output: W,
        observer: Option<&mut dyn FnMut(&ProgressSnapshot)>,
    ) -> Result<DecodeReport>
    where
        S: FrameSource + Send,
        W: Write + Send,
    {
        let ctx = RunContext::<BytesMut>::new(self.config.queue_depth, &self.cancel);
        self.progress.reset();
        self.progress.set_state(PipelineState::Streaming);
        info!(
            capacity = self.codec.capacity(),
            queue_depth = ctx.queue.capacity(),
            verify_sequence = self.config.verify_sequence,
            "decode started"
        );

        let result = run_pair(
            &ctx,
            &self.progress,
            self.config.progress_interval,
            observer,
            || self.produce(source, &ctx),
            || self.consume(output, &ctx),
        );

        match result {
            Ok((discarded_tail_bytes, (frames, bytes_written))) => {
                self.progress.set_state(PipelineState::Done);
                if frames == 0 {
                    warn!("codec produced no frames");
                }
                info!(frames, bytes_written, discarded_tail_bytes, "decode finished");
                Ok(DecodeReport {
                    frames,
                    bytes_written,
                    discarded_tail_bytes,
                })
            }
            Err(err) => {
                self.progress.set_state(PipelineState::Failed);
                warn!(error = %err, "decode failed");
                Err(err)
            }
        }
    }

    /// Read whole frames until the codec's stream ends, then reap it.
    /// Returns the number of discarded trailing bytes.
    fn produce<S: FrameSource>(&self, source: &mut S, ctx: &RunContext<BytesMut>) -> Result<u64> {
        let capacity = self.codec.capacity() as u64;
        let mut reader = FrameReader::new(source, &self.codec);

        let discarded = loop {
            if ctx.should_stop() {
                reader.get_mut().abort();
                return Err(ctx.stop_reason());
            }
            match reader.read_frame() {
                Ok(ReadOutcome::Frame(frame)) => {
                    if !ctx.queue.push(frame) {
                        reader.get_mut().abort();
                        return Err(ctx.stop_reason());
                    }
                    self.progress.record_produced(capacity);
                }
                Ok(ReadOutcome::End { discarded }) => break discarded as u64,
                Err(err) => {
                    reader.get_mut().abort();
                    if ctx.should_stop() {
                        return Err(ctx.stop_reason());
                    }
                    return Err(PipelineError::from_source(err));
                }
            }
        };

        // A codec killed by cancellation also ends its stream.
        if ctx.should_stop() {
            reader.get_mut().abort();
            return Err(ctx.stop_reason());
        }

        self.progress.record_read(discarded);
        self.progress.set_state(PipelineState::Finalizing);
        debug!(frames = reader.frames_read(), discarded, "codec stream ended");
        // Reap before releasing the consumer so a failed exit stops it short
        // of flushing.
        if let Err(err) = reader.get_mut().finish() {
            if ctx.should_stop() {
                return Err(ctx.stop_reason());
            }
            return Err(PipelineError::Source(err));
        }
        ctx.queue.close();
        Ok(discarded)
    }

    /// Unpack queued frames into `output`. Returns frames and bytes written.
    fn consume<W: Write>(&self, mut output: W, ctx: &RunContext<BytesMut>) -> Result<(u64, u64)> {
        let mut next_index = 0u64;
        let mut final_index: Option<u64> = None;
        let mut bytes_written = 0u64;

        while let Some(mut frame) = ctx.queue.pop() {
            if ctx.should_stop() {
                return Err(ctx.stop_reason());
            }
            self.transform.inverse(&mut frame);
            let header = self.codec.header(&frame);

            if self.config.verify_sequence {
                if let Some(final_index) = final_index {
                    return Err(PipelineError::FrameAfterFinal {
                        index: header.index,
                        final_index,
                    });
                }
                if header.index != next_index {
                    return Err(PipelineError::Sequence {
                        expected: next_index,
                        found: header.index,
                    });
                }
            }

            let payload = self.codec.unpack(&frame);
            output
                .write_all(payload)
                .map_err(PipelineError::WriteOutput)?;
            self.progress.record_consumed(payload.len() as u64);
            trace!(index = header.index, payload = payload.len(), "frame written");

            bytes_written += payload.len() as u64;
            next_index += 1;
            if final_index.is_none() && self.codec.is_terminal(header.payload_len) {
                final_index = Some(header.index);
            }
        }
        if ctx.should_stop() {
            return Err(ctx.stop_reason());
        }

        output.flush().map_err(PipelineError::WriteOutput)?;
        Ok((next_index, bytes_written))
    }
}

impl fmt::Debug for Decoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Decoder")
            .field("codec", &self.codec)
            .field("config", &self.config)
            .field("progress", &self.progress.snapshot())
            .finish_non_exhaustive()
    }
}
