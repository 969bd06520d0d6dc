//! Byte-pipe capabilities for driving an external pixel-stream codec.
//!
//! The codec (normally ffmpeg) lives out of process. This crate hides it
//! behind two small traits so the framing and pipeline layers never touch
//! process plumbing directly:
//! - [`FrameSink`] accepts a raw pixel byte stream (encode direction)
//! - [`FrameSource`] produces a raw pixel byte stream (decode direction)
//!
//! [`ProcessSink`] and [`ProcessSource`] back the traits with a child
//! process; [`MemorySink`] and [`MemorySource`] are in-memory stand-ins.

pub mod error;
pub mod ffmpeg;
pub mod memory;
pub mod pixel;
pub mod process;
pub mod traits;

pub use error::{Result, TransportError};
pub use ffmpeg::{FfmpegCommand, StderrMode, DEFAULT_CODEC, DEFAULT_FPS, DEFAULT_PROGRAM};
pub use memory::{MemorySink, MemorySource};
pub use pixel::PixelFormat;
pub use process::{KillSwitch, ProcessSink, ProcessSource};
pub use traits::{FrameSink, FrameSource};
