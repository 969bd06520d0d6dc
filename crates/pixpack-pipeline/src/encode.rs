use std::fmt;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use pixpack_frame::{Frame, FrameCodec, FrameConfig, FrameTransform, FrameWriter, Identity};
use pixpack_transport::FrameSink;
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::cancel::CancelToken;
use crate::error::{PipelineError, Result};
use crate::progress::{PipelineState, Progress, ProgressSnapshot};
use crate::run::{run_pair, RunContext};
use crate::{DEFAULT_PROGRESS_INTERVAL, DEFAULT_QUEUE_DEPTH};

/// Encode pipeline settings.
#[derive(Debug, Clone, Copy)]
pub struct EncodeConfig {
    pub frame: FrameConfig,
    /// Frames buffered between reader and codec. Default: 64.
    pub queue_depth: usize,
    /// How often the progress observer is called. Default: 500 ms.
    pub progress_interval: Duration,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            frame: FrameConfig::default(),
            queue_depth: DEFAULT_QUEUE_DEPTH,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }
}

/// Summary of a successful encode run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EncodeReport {
    /// Frames written to the codec.
    pub frames: u64,
    /// Source bytes carried by those frames.
    pub payload_bytes: u64,
    /// Size of every frame on the wire.
    pub frame_capacity: usize,
}

impl EncodeReport {
    /// Total bytes handed to the codec.
    pub fn wire_bytes(&self) -> u64 {
        self.frames * self.frame_capacity as u64
    }
}

/// Streams a byte source into a [`FrameSink`] as fixed-capacity frames.
///
/// The producer thread reads and packs; the consumer thread writes frames to
/// the sink and finalizes it once the queue drains. At most `queue_depth`
/// frames are held in memory at any time.
pub struct Encoder {
    codec: FrameCodec,
    config: EncodeConfig,
    transform: Arc<dyn FrameTransform>,
    progress: Progress,
    cancel: CancelToken,
}

impl Encoder {
    /// Create an encoder. Fails if the frame geometry cannot hold a header.
    pub fn new(config: EncodeConfig) -> Result<Self> {
        Ok(Self {
            codec: FrameCodec::new(&config.frame)?,
            config,
            transform: Arc::new(Identity),
            progress: Progress::new(),
            cancel: CancelToken::new(),
        })
    }

    /// Apply `transform` to every packed frame before it reaches the sink.
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

    pub fn config(&self) -> &EncodeConfig {
        &self.config
    }

    /// Handle onto the progress of the current or last run.
    pub fn progress(&self) -> Progress {
        self.progress.clone()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Encode all of `input` into `sink`.
    ///
    /// `input_len`, when known, bounds how much is read and turns an early
    /// end of input into [`PipelineError::InputTruncated`]. On failure the
    /// sink is aborted rather than finished.
    pub fn run<R, S>(&self, input: R, input_len: Option<u64>, sink: &mut S) -> Result<EncodeReport>
    where
        R: Read + Send,
        S: FrameSink + Send,
    {
        self.run_inner(input, input_len, sink, None)
    }

    /// Like [`run`](Self::run), calling `observer` with progress snapshots
    /// from the calling thread while the workers run.
    pub fn run_with_observer<R, S, F>(
        &self,
        input: R,
        input_len: Option<u64>,
        sink: &mut S,
        mut observer: F,
    ) -> Result<EncodeReport>
    where
        R: Read + Send,
        S: FrameSink + Send,
        F: FnMut(&ProgressSnapshot),
    {
        self.run_inner(input, input_len, sink, Some(&mut observer))
    }

    fn run_inner<R, S>(
        &self,
        input: R,
        input_len: Option<u64>,
        sink: &mut S,
        observer: Option<&mut dyn FnMut(&ProgressSnapshot)>,
    ) -> Result<EncodeReport>
    where
        R: Read + Send,
        S: FrameSink + Send,
    {
        let ctx = RunContext::<Frame>::new(self.config.queue_depth, &self.cancel);
        self.progress.reset();
        self.progress.set_state(PipelineState::Streaming);
        info!(
            capacity = self.codec.capacity(),
            queue_depth = ctx.queue.capacity(),
            input_len = ?input_len,
            "encode started"
        );

        let result = run_pair(
            &ctx,
            &self.progress,
            self.config.progress_interval,
            observer,
            || self.produce(input, input_len, &ctx),
            || self.consume(sink, &ctx),
        );

        match result {
            Ok(((frames, payload_bytes), _)) => {
                self.progress.set_state(PipelineState::Done);
                let report = EncodeReport {
                    frames,
                    payload_bytes,
                    frame_capacity: self.codec.capacity(),
                };
                info!(frames, payload_bytes, "encode finished");
                Ok(report)
            }
            Err(err) => {
                self.progress.set_state(PipelineState::Failed);
                warn!(error = %err, "encode failed");
                Err(err)
            }
        }
    }

    /// Pack frames from `input` until it is exhausted. Returns frames queued
    /// and payload bytes carried.
    fn produce<R: Read>(
        &self,
        mut input: R,
        input_len: Option<u64>,
        ctx: &RunContext<Frame>,
    ) -> Result<(u64, u64)> {
        let max_payload = self.codec.max_payload() as u64;
        let mut remaining = input_len.unwrap_or(u64::MAX);
        let mut payload_bytes = 0u64;
        let mut buf = BytesMut::with_capacity(self.codec.capacity());
        let mut index = 0u64;

        loop {
            if ctx.should_stop() {
                return Err(ctx.stop_reason());
            }
            // An input that ends on a frame boundary needs no trailing empty frame.
            if remaining == 0 && index > 0 {
                break;
            }

            let want = remaining.min(max_payload);
            let header = self
                .codec
                .pack_into(index, &mut input, remaining, &mut buf)
                .map_err(PipelineError::from_input)?;
            let len = header.payload_len;

            if len < want {
                if let Some(expected) = input_len {
                    return Err(PipelineError::InputTruncated {
                        expected,
                        actual: payload_bytes + len,
                    });
                }
            }
            if len == 0 && index > 0 {
                break;
            }

            self.transform.forward(&mut buf);
            if !ctx.queue.push(Frame::new(header, buf.split().freeze())) {
                return Err(ctx.stop_reason());
            }
            self.progress.record_produced(len);
            trace!(index, payload = len, "frame queued");

            payload_bytes += len;
            remaining = remaining.saturating_sub(len);
            index += 1;
            if self.codec.is_terminal(len) {
                break;
            }
        }

        self.progress.set_state(PipelineState::Draining);
        ctx.queue.close();
        debug!(frames = index, payload_bytes, "input exhausted");
        Ok((index, payload_bytes))
    }

    /// Write queued frames to the sink, then finalize it. Returns frames written.
    fn consume<S: FrameSink>(&self, sink: &mut S, ctx: &RunContext<Frame>) -> Result<u64> {
        let mut writer = FrameWriter::new(sink, &self.codec);

        while let Some(frame) = ctx.queue.pop() {
            if ctx.should_stop() {
                writer.abort();
                return Err(ctx.stop_reason());
            }
            if let Err(err) = writer.write_frame(&frame) {
                writer.abort();
                if ctx.should_stop() {
                    return Err(ctx.stop_reason());
                }
                return Err(PipelineError::from_sink(err));
            }
            self.progress.record_consumed(frame.len() as u64);
        }
        if ctx.should_stop() {
            writer.abort();
            return Err(ctx.stop_reason());
        }

        debug!(frames = writer.frames_written(), "finalizing codec output");
        if let Err(err) = writer.finish() {
            if ctx.should_stop() {
                return Err(ctx.stop_reason());
            }
            return Err(PipelineError::from_sink(err));
        }
        Ok(writer.frames_written())
    }
}

impl fmt::Debug for Encoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Encoder")
            .field("codec", &self.codec)
            .field("config", &self.config)
            .field("progress", &self.progress.snapshot())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use pixpack_frame::{FillerPolicy, FrameGeometry, PixelFormat};
    use pixpack_transport::{MemorySink, TransportError};

    use super::*;

    /// 4×4 RGB24: 48-byte frames carrying 32 bytes each.
    fn config() -> EncodeConfig {
        EncodeConfig {
            frame: FrameConfig {
                geometry: FrameGeometry::new(4, 4, PixelFormat::Rgb24),
                filler: FillerPolicy::Zero,
            },
            queue_depth: 2,
            progress_interval: Duration::from_millis(5),
        }
    }

    fn frame_lens(sink: &MemorySink, codec: &FrameCodec) -> Vec<u64> {
        sink.data()
            .chunks(codec.capacity())
            .map(|frame| codec.header(frame).payload_len)
            .collect()
    }

    #[test]
    fn frames_input_and_finishes_sink() {
        let encoder = Encoder::new(config()).unwrap();
        let input: Vec<u8> = (0..100u8).collect();
        let mut sink = MemorySink::new();

        let report = encoder.run(Cursor::new(&input), None, &mut sink).unwrap();

        assert_eq!(report.frames, 4);
        assert_eq!(report.payload_bytes, 100);
        assert_eq!(report.wire_bytes(), 4 * 48);
        assert!(sink.is_finished());
        assert_eq!(frame_lens(&sink, encoder.codec()), vec![32, 32, 32, 4]);
        assert_eq!(encoder.progress().state(), PipelineState::Done);
    }

    #[test]
    fn empty_input_is_one_empty_frame() {
        let encoder = Encoder::new(config()).unwrap();
        let mut sink = MemorySink::new();

        let report = encoder.run(Cursor::new(Vec::new()), Some(0), &mut sink).unwrap();

        assert_eq!(report.frames, 1);
        assert_eq!(frame_lens(&sink, encoder.codec()), vec![0]);
    }

    #[test]
    fn exact_multiple_has_no_trailing_frame() {
        let encoder = Encoder::new(config()).unwrap();
        let mut sink = MemorySink::new();

        let report = encoder.run(Cursor::new(vec![7u8; 64]), None, &mut sink).unwrap();

        assert_eq!(report.frames, 2);
        assert_eq!(frame_lens(&sink, encoder.codec()), vec![32, 32]);
    }

    #[test]
    fn known_length_bounds_reading() {
        let encoder = Encoder::new(config()).unwrap();
        let mut sink = MemorySink::new();

        let report = encoder.run(Cursor::new(vec![1u8; 100]), Some(40), &mut sink).unwrap();

        assert_eq!(report.payload_bytes, 40);
        assert_eq!(frame_lens(&sink, encoder.codec()), vec![32, 8]);
    }

    #[test]
    fn short_input_with_known_length_fails() {
        let encoder = Encoder::new(config()).unwrap();
        let mut sink = MemorySink::new();

        let err = encoder
            .run(Cursor::new(vec![1u8; 50]), Some(80), &mut sink)
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::InputTruncated {
                expected: 80,
                actual: 50
            }
        ));
        assert!(sink.is_aborted());
        assert!(!sink.is_finished());
        assert_eq!(encoder.progress().state(), PipelineState::Failed);
    }

    #[test]
    fn sink_failure_aborts_run() {
        let encoder = Encoder::new(config()).unwrap();
        let mut sink = MemorySink::new().fail_after_chunks(2);

        let err = encoder
            .run(Cursor::new(vec![0u8; 10_000]), None, &mut sink)
            .unwrap_err();

        assert!(matches!(err, PipelineError::Sink(TransportError::Io(_))));
        assert!(sink.is_aborted());
        assert_eq!(sink.chunk_lens().len(), 2);
    }

    #[test]
    fn codec_exit_failure_is_reported() {
        let encoder = Encoder::new(config()).unwrap();
        let mut sink = MemorySink::new().with_exit_code(1);

        let err = encoder.run(Cursor::new(vec![0u8; 10]), None, &mut sink).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::Sink(TransportError::Exited { .. })
        ));
    }

    #[test]
    fn geometry_too_small_is_rejected() {
        let mut config = config();
        config.frame.geometry = FrameGeometry::new(2, 2, PixelFormat::Rgba);
        assert!(matches!(
            Encoder::new(config),
            Err(PipelineError::Frame(_))
        ));
    }

    #[test]
    fn observer_reports_final_counters() {
        let encoder = Encoder::new(config()).unwrap();
        let mut sink = MemorySink::new();
        let mut last = None;

        encoder
            .run_with_observer(Cursor::new(vec![3u8; 500]), None, &mut sink, |snap| {
                last = Some(*snap)
            })
            .unwrap();

        let last = last.unwrap();
        assert_eq!(last.bytes_read, 500);
        assert_eq!(last.frames_produced, last.frames_consumed);
    }
}
