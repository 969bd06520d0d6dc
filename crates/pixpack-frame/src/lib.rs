//! Fixed-capacity self-describing frames for raw pixel streams.
//!
//! An external video codec only accepts a constant-size raw stream, so every
//! frame is exactly `C` bytes (`width × height × bytes_per_pixel`):
//! - A 16-byte header: 8-byte little-endian frame index, then an 8-byte
//!   little-endian payload length
//! - `payload_length` bytes of source data
//! - Filler up to `C`, never interpreted on the way back
//!
//! The final frame of a stream is the only one allowed to carry less than
//! `C - 16` bytes of payload; that short frame is what ends the stream.

pub mod codec;
pub mod error;
pub mod filler;
pub mod reader;
pub mod transform;
pub mod writer;

pub use codec::{
    decode_header, encode_header, Frame, FrameCodec, FrameConfig, FrameGeometry, FrameHeader,
    HEADER_SIZE, MAX_FRAME_CAPACITY,
};
pub use error::{FrameError, Result};
pub use filler::FillerPolicy;
pub use pixpack_transport::PixelFormat;
pub use reader::{FrameReader, ReadOutcome};
pub use transform::{FrameTransform, Identity};
pub use writer::FrameWriter;
