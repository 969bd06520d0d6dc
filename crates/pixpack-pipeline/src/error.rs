use pixpack_frame::FrameError;
use pixpack_transport::TransportError;

/// Errors that end a pipeline run.
///
/// A failed run is failed as a whole: output written before the failure must
/// not be treated as valid.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Reading the input being encoded failed.
    #[error("failed to read input: {0}")]
    ReadInput(#[source] std::io::Error),

    /// The input ended before its announced length.
    #[error("input ended after {actual} bytes, expected {expected}")]
    InputTruncated { expected: u64, actual: u64 },

    /// Writing to or finalizing the codec sink failed.
    #[error("codec sink failed: {0}")]
    Sink(#[source] TransportError),

    /// Reading from or reaping the codec source failed.
    #[error("codec source failed: {0}")]
    Source(#[source] TransportError),

    /// Writing the decoded output failed.
    #[error("failed to write output: {0}")]
    WriteOutput(#[source] std::io::Error),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// A frame arrived out of order.
    #[error("frame {found} arrived where frame {expected} was expected")]
    Sequence { expected: u64, found: u64 },

    /// A frame arrived after the short frame that ends the stream.
    #[error("frame {index} follows final frame {final_index}")]
    FrameAfterFinal { index: u64, final_index: u64 },

    /// The run was cancelled by the caller.
    #[error("pipeline cancelled")]
    Cancelled,

    /// This worker stopped because the other one failed.
    #[error("pipeline aborted after a failure on the other side")]
    Aborted,

    /// A worker thread panicked.
    #[error("{0} worker panicked")]
    WorkerPanicked(&'static str),

    /// A worker thread could not be started.
    #[error("failed to spawn {name} worker: {source}")]
    Spawn {
        name: &'static str,
        source: std::io::Error,
    },
}

impl PipelineError {
    pub(crate) fn from_sink(err: FrameError) -> Self {
        match err {
            FrameError::Transport(err) => PipelineError::Sink(err),
            other => PipelineError::Frame(other),
        }
    }

    pub(crate) fn from_source(err: FrameError) -> Self {
        match err {
            FrameError::Transport(err) => PipelineError::Source(err),
            other => PipelineError::Frame(other),
        }
    }

    pub(crate) fn from_input(err: FrameError) -> Self {
        match err {
            FrameError::Io(err) => PipelineError::ReadInput(err),
            other => PipelineError::Frame(other),
        }
    }

    /// True for errors that only report the other worker's failure.
    pub fn is_follow_on(&self) -> bool {
        matches!(self, PipelineError::Aborted)
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
