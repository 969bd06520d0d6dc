//! Store arbitrary files as lossless video frame streams.
//!
//! pixpack splits a file into fixed-size, self-describing frames, streams
//! them through an external lossless video codec, and reassembles the exact
//! original bytes from the codec's output.
//!
//! # Crate Structure
//!
//! - [`transport`]: codec pipes (ffmpeg subprocesses, in-memory fakes)
//! - [`frame`]: the fixed-capacity frame format
//! - [`pipeline`]: bounded two-thread encode and decode pipelines

/// Re-export transport types.
pub mod transport {
    pub use pixpack_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use pixpack_frame::*;
}

/// Re-export pipeline types.
pub mod pipeline {
    pub use pixpack_pipeline::*;
}
