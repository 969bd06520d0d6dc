/// Errors raised while talking to the external codec.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The codec process could not be started.
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        source: std::io::Error,
    },

    /// An I/O error occurred on the codec pipe.
    #[error("codec pipe I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The codec process finished with a failure status.
    #[error("{program} exited unsuccessfully ({})", describe_exit(.code))]
    Exited { program: String, code: Option<i32> },

    /// The pipe was already closed by `finish` or `abort`.
    #[error("codec pipe closed")]
    Closed,
}

fn describe_exit(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "terminated by signal".to_string(),
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exited_message_includes_code() {
        let err = TransportError::Exited {
            program: "ffmpeg".to_string(),
            code: Some(1),
        };
        assert_eq!(err.to_string(), "ffmpeg exited unsuccessfully (exit code 1)");
    }

    #[test]
    fn exited_message_without_code_mentions_signal() {
        let err = TransportError::Exited {
            program: "ffmpeg".to_string(),
            code: None,
        };
        assert!(err.to_string().contains("terminated by signal"));
    }
}
