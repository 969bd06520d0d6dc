use std::io::{ErrorKind, Read};

use bytes::{Bytes, BytesMut};
use pixpack_transport::PixelFormat;

use crate::error::{FrameError, Result};
use crate::filler::FillerPolicy;

/// Frame header: index (8) + payload length (8) = 16 bytes.
pub const HEADER_SIZE: usize = 16;

/// Largest frame the codec will allocate (1 GiB).
pub const MAX_FRAME_CAPACITY: usize = 1 << 30;

const INDEX_RANGE: std::ops::Range<usize> = 0..8;
const LENGTH_RANGE: std::ops::Range<usize> = 8..16;

/// Pixel geometry agreed with the external codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub width: u32,
    pub height: u32,
    pub pixel_format: PixelFormat,
}

impl FrameGeometry {
    pub fn new(width: u32, height: u32, pixel_format: PixelFormat) -> Self {
        Self {
            width,
            height,
            pixel_format,
        }
    }

    /// Bytes per frame on the raw pipe (`C`), or `None` if that overflows.
    pub fn capacity(&self) -> Option<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.pixel_format.bytes_per_pixel())
    }
}

impl Default for FrameGeometry {
    fn default() -> Self {
        Self::new(1920, 1080, PixelFormat::Rgb24)
    }
}

/// Configuration for the frame codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameConfig {
    /// Frame geometry. Default: 1920×1080 RGB24.
    pub geometry: FrameGeometry,
    /// How unused bytes after the payload are filled. Default: zeros.
    pub filler: FillerPolicy,
}

/// Decoded frame header, exactly as stored (not clamped).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub index: u64,
    pub payload_len: u64,
}

/// Write a header into the first [`HEADER_SIZE`] bytes of `dst`.
///
/// Wire format:
/// ```text
/// ┌──────────────┬──────────────┬──────────────────┬──────────────┐
/// │ Index        │ Payload len  │ Payload          │ Filler       │
/// │ (8B LE)      │ (8B LE)      │ (len bytes)      │ (to C bytes) │
/// └──────────────┴──────────────┴──────────────────┴──────────────┘
/// ```
///
/// # Panics
///
/// Panics if `dst` is shorter than [`HEADER_SIZE`].
pub fn encode_header(header: FrameHeader, dst: &mut [u8]) {
    dst[INDEX_RANGE].copy_from_slice(&header.index.to_le_bytes());
    dst[LENGTH_RANGE].copy_from_slice(&header.payload_len.to_le_bytes());
}

/// Read the header from the start of `src`.
///
/// Returns `None` if `src` is too short to hold a header.
pub fn decode_header(src: &[u8]) -> Option<FrameHeader> {
    let index = src.get(INDEX_RANGE)?.try_into().ok()?;
    let payload_len = src.get(LENGTH_RANGE)?.try_into().ok()?;
    Some(FrameHeader {
        index: u64::from_le_bytes(index),
        payload_len: u64::from_le_bytes(payload_len),
    })
}

/// A packed frame, ready for the sink.
#[derive(Debug, Clone)]
pub struct Frame {
    header: FrameHeader,
    data: Bytes,
}

impl Frame {
    /// Wrap packed wire bytes with the header they were packed under.
    pub fn new(header: FrameHeader, data: Bytes) -> Self {
        Self { header, data }
    }

    /// Position of this frame in the stream, starting at 0.
    pub fn index(&self) -> u64 {
        self.header.index
    }

    /// Number of real source bytes carried.
    pub fn payload_len(&self) -> usize {
        self.header.payload_len as usize
    }

    /// The header this frame was packed with.
    pub fn header(&self) -> FrameHeader {
        self.header
    }

    /// Full wire bytes (header + payload + filler).
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Wire size, always the codec capacity.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

/// Packs source bytes into fixed-capacity frames and unpacks them again.
///
/// The codec holds no per-stream state; callers supply the frame index.
#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    capacity: usize,
    filler: FillerPolicy,
}

impl FrameCodec {
    /// Create a codec for the configured geometry.
    pub fn new(config: &FrameConfig) -> Result<Self> {
        let capacity = config
            .geometry
            .capacity()
            .ok_or(FrameError::CapacityTooLarge {
                limit: MAX_FRAME_CAPACITY,
            })?;
        Self::with_capacity(capacity, config.filler)
    }

    /// Create a codec for an explicit frame capacity.
    pub fn with_capacity(capacity: usize, filler: FillerPolicy) -> Result<Self> {
        if capacity <= HEADER_SIZE {
            return Err(FrameError::CapacityTooSmall {
                capacity,
                header: HEADER_SIZE,
            });
        }
        if capacity > MAX_FRAME_CAPACITY {
            return Err(FrameError::CapacityTooLarge {
                limit: MAX_FRAME_CAPACITY,
            });
        }
        Ok(Self { capacity, filler })
    }

    /// Frame size on the wire (`C`).
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Largest payload a frame can carry (`C - H`).
    pub fn max_payload(&self) -> usize {
        self.capacity - HEADER_SIZE
    }

    pub fn filler(&self) -> FillerPolicy {
        self.filler
    }

    /// Pack the next frame into `buf`, reusing its allocation when possible.
    ///
    /// Reads up to `min(C - H, bytes_available)` bytes from `src`, stopping
    /// early only at end of input. On return `buf` holds exactly `C` bytes.
    pub fn pack_into<R: Read + ?Sized>(
        &self,
        index: u64,
        src: &mut R,
        bytes_available: u64,
        buf: &mut BytesMut,
    ) -> Result<FrameHeader> {
        let want = usize::try_from(bytes_available)
            .unwrap_or(usize::MAX)
            .min(self.max_payload());

        buf.clear();
        buf.resize(self.capacity, 0);

        let payload = &mut buf[HEADER_SIZE..HEADER_SIZE + want];
        let mut filled = 0usize;
        while filled < want {
            match src.read(&mut payload[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }

        let header = FrameHeader {
            index,
            payload_len: filled as u64,
        };
        encode_header(header, &mut buf[..HEADER_SIZE]);
        self.filler.fill(index, &mut buf[HEADER_SIZE + filled..]);
        Ok(header)
    }

    /// Pack the next frame from `src` into a new [`Frame`].
    pub fn pack<R: Read + ?Sized>(
        &self,
        index: u64,
        src: &mut R,
        bytes_available: u64,
    ) -> Result<Frame> {
        let mut buf = BytesMut::with_capacity(self.capacity);
        let header = self.pack_into(index, src, bytes_available, &mut buf)?;
        Ok(Frame::new(header, buf.freeze()))
    }

    /// Header of a received frame with the payload length clamped to `C - H`.
    ///
    /// A buffer too short for a header reads as an empty frame at index 0.
    pub fn header(&self, frame: &[u8]) -> FrameHeader {
        let raw = decode_header(frame).unwrap_or(FrameHeader {
            index: 0,
            payload_len: 0,
        });
        FrameHeader {
            index: raw.index,
            payload_len: raw.payload_len.min(self.max_payload() as u64),
        }
    }

    /// Extract the payload window `[H, H + payload_len)` from a received frame.
    ///
    /// Never fails: a corrupt length is clamped to `C - H`, and further to what
    /// the buffer actually holds.
    pub fn unpack<'a>(&self, frame: &'a [u8]) -> &'a [u8] {
        let available = frame.len().saturating_sub(HEADER_SIZE);
        let len = (self.header(frame).payload_len as usize).min(available);
        if len == 0 {
            return &[];
        }
        &frame[HEADER_SIZE..HEADER_SIZE + len]
    }

    /// True if a frame carrying `payload_len` bytes must be the last one.
    pub fn is_terminal(&self, payload_len: u64) -> bool {
        payload_len < self.max_payload() as u64
    }
}
