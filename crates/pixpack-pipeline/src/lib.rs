//! Bounded two-thread streaming pipelines between files and a frame codec.
//!
//! Each run uses exactly two workers joined by one [`FrameQueue`]:
//! - Encode: read input and pack frames → queue → write frames to a sink
//! - Decode: read frames from a source → queue → unpack and write output
//!
//! The queue depth bounds memory to a fixed number of frames regardless of
//! input size, and a full queue throttles the producer.

pub mod cancel;
pub mod decode;
pub mod encode;
pub mod error;
pub mod progress;
pub mod queue;
mod run;

pub use cancel::{CancelGuard, CancelToken};
pub use decode::{DecodeConfig, DecodeReport, Decoder};
pub use encode::{EncodeConfig, EncodeReport, Encoder};
pub use error::{PipelineError, Result};
pub use progress::{PipelineState, Progress, ProgressSnapshot};
pub use queue::FrameQueue;

/// Default number of frames in flight between the two workers.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// Default interval between progress observer callbacks.
pub const DEFAULT_PROGRESS_INTERVAL: std::time::Duration = std::time::Duration::from_millis(500);
