/// Errors that can occur while packing, reading or writing frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The frame capacity cannot hold the header plus at least one payload byte.
    #[error("frame capacity {capacity} too small (header alone is {header} bytes)")]
    CapacityTooSmall { capacity: usize, header: usize },

    /// The geometry describes a frame larger than the codec will allocate.
    #[error("frame geometry exceeds the {limit}-byte frame limit")]
    CapacityTooLarge { limit: usize },

    /// A frame handed to the sink was not exactly the agreed capacity.
    #[error("frame is {actual} bytes, expected exactly {expected}")]
    FrameSize { expected: usize, actual: usize },

    /// Reading the payload source failed.
    #[error("frame source I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The codec pipe failed.
    #[error(transparent)]
    Transport(#[from] pixpack_transport::TransportError),
}

pub type Result<T> = std::result::Result<T, FrameError>;
