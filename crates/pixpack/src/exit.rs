use std::fmt;
use std::io;

use pixpack_frame::FrameError;
use pixpack_pipeline::PipelineError;
use pixpack_transport::TransportError;

// Exit codes follow sysexits.h where one fits.
pub const SUCCESS: i32 = 0;
pub const CODEC_ERROR: i32 = 3;
pub const HEALTH_CHECK_FAILED: i32 = 30;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const NO_INPUT: i32 = 66;
pub const CODEC_UNAVAILABLE: i32 = 69;
pub const INTERNAL: i32 = 125;
pub const INTERRUPTED: i32 = 130;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => NO_INPUT,
        io::ErrorKind::BrokenPipe | io::ErrorKind::UnexpectedEof => CODEC_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Launch { ref source, .. } if source.kind() == io::ErrorKind::NotFound => {
            CliError::new(CODEC_UNAVAILABLE, format!("{context}: {err}"))
        }
        TransportError::Io(source) => io_error(context, source),
        other => CliError::new(CODEC_ERROR, format!("{context}: {other}")),
    }
}

pub fn frame_error(context: &str, err: FrameError) -> CliError {
    match err {
        FrameError::Io(source) => io_error(context, source),
        FrameError::Transport(err) => transport_error(context, err),
        FrameError::CapacityTooSmall { .. } | FrameError::CapacityTooLarge { .. } => {
            CliError::new(USAGE, format!("{context}: {err}"))
        }
        FrameError::FrameSize { .. } => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

pub fn pipeline_error(context: &str, err: PipelineError) -> CliError {
    match err {
        PipelineError::ReadInput(source) => io_error(&format!("{context}: read input"), source),
        PipelineError::WriteOutput(source) => {
            io_error(&format!("{context}: write output"), source)
        }
        PipelineError::Sink(err) | PipelineError::Source(err) => transport_error(context, err),
        PipelineError::Frame(err) => frame_error(context, err),
        PipelineError::InputTruncated { .. }
        | PipelineError::Sequence { .. }
        | PipelineError::FrameAfterFinal { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        PipelineError::Cancelled => CliError::new(INTERRUPTED, format!("{context}: {err}")),
        other => CliError::new(INTERNAL, format!("{context}: {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_codec_is_unavailable() {
        let err = transport_error(
            "start codec",
            TransportError::Launch {
                program: "ffmpeg".to_string(),
                source: io::Error::from(io::ErrorKind::NotFound),
            },
        );
        assert_eq!(err.code, CODEC_UNAVAILABLE);
        assert!(err.message.starts_with("start codec: "));
    }

    #[test]
    fn codec_exit_is_codec_error() {
        let err = pipeline_error(
            "decode failed",
            PipelineError::Source(TransportError::Exited {
                program: "ffmpeg".to_string(),
                code: Some(1),
            }),
        );
        assert_eq!(err.code, CODEC_ERROR);
    }

    #[test]
    fn corrupt_stream_is_data_invalid() {
        let err = pipeline_error(
            "decode failed",
            PipelineError::Sequence {
                expected: 3,
                found: 9,
            },
        );
        assert_eq!(err.code, DATA_INVALID);
        assert!(err.to_string().contains("frame 9"));
    }

    #[test]
    fn cancellation_and_geometry_codes() {
        assert_eq!(
            pipeline_error("encode failed", PipelineError::Cancelled).code,
            INTERRUPTED
        );
        let err = pipeline_error(
            "invalid geometry",
            PipelineError::Frame(FrameError::CapacityTooSmall {
                capacity: 4,
                header: 16,
            }),
        );
        assert_eq!(err.code, USAGE);
    }

    #[test]
    fn io_kinds_map_to_codes() {
        let denied = io_error("open", io::Error::from(io::ErrorKind::PermissionDenied));
        assert_eq!(denied.code, PERMISSION_DENIED);
        let missing = io_error("open", io::Error::from(io::ErrorKind::NotFound));
        assert_eq!(missing.code, NO_INPUT);
        assert_eq!(
            pipeline_error("x", PipelineError::WorkerPanicked("producer")).code,
            INTERNAL
        );
    }
}
