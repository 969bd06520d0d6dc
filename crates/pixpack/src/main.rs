mod cmd;
mod exit;
mod logging;
mod output;

use clap::Parser;

use crate::cmd::Command;
use crate::logging::{init_logging, LogFormat, LogLevel};
use crate::output::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "pixpack",
    version,
    about = "Store arbitrary files as lossless video"
)]
struct Cli {
    /// Output format for reports.
    #[arg(long, value_name = "FORMAT", global = true)]
    format: Option<OutputFormat>,

    /// Log output format (stderr).
    #[arg(long, value_name = "FORMAT", default_value = "text", global = true)]
    log_format: LogFormat,

    /// Minimum log level (stderr).
    #[arg(long, value_name = "LEVEL", default_value = "info", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_format, cli.log_level);

    let format = cli.format.unwrap_or_else(OutputFormat::default_for_stdout);
    let result = cmd::run(cli.command, format);

    match result {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(err.code);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use super::*;

    #[test]
    fn parses_encode_with_defaults() {
        let cli = Cli::try_parse_from(["pixpack", "encode", "in.bin", "out.mkv"])
            .expect("encode args should parse");

        let Command::Encode(args) = cli.command else {
            panic!("expected encode command");
        };
        assert_eq!(args.input, Path::new("in.bin"));
        assert_eq!(args.output, Path::new("out.mkv"));
        assert_eq!(args.codec.width, 1920);
        assert_eq!(args.codec.height, 1080);
        assert_eq!(args.codec.queue_depth, 64);
        assert_eq!(args.codec.progress_interval, Duration::from_millis(500));
    }

    #[test]
    fn parses_decode_geometry_and_flags() {
        let cli = Cli::try_parse_from([
            "pixpack",
            "--format",
            "json",
            "decode",
            "in.mkv",
            "out.bin",
            "--width",
            "640",
            "--height",
            "480",
            "--pixel-format",
            "gray",
            "--no-verify",
            "--progress-interval",
            "2s",
        ])
        .expect("decode args should parse");

        assert!(matches!(cli.format, Some(OutputFormat::Json)));
        let Command::Decode(args) = cli.command else {
            panic!("expected decode command");
        };
        assert_eq!(args.codec.width, 640);
        assert_eq!(args.codec.frame_config().geometry.capacity(), Some(640 * 480));
        assert!(args.no_verify);
        assert_eq!(args.codec.progress_interval, Duration::from_secs(2));
    }

    #[test]
    fn rejects_zero_width() {
        let err = Cli::try_parse_from(["pixpack", "encode", "a", "b", "--width", "0"])
            .expect_err("zero width should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn rejects_bad_interval() {
        let err = Cli::try_parse_from([
            "pixpack",
            "encode",
            "a",
            "b",
            "--progress-interval",
            "soon",
        ])
        .expect_err("bad interval should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parses_version_and_doctor() {
        let cli = Cli::try_parse_from(["pixpack", "version", "--extended"])
            .expect("version args should parse");
        assert!(matches!(cli.command, Command::Version(ref args) if args.extended));

        let cli = Cli::try_parse_from(["pixpack", "doctor", "--ffmpeg", "/opt/ffmpeg"])
            .expect("doctor args should parse");
        assert!(matches!(cli.command, Command::Doctor(_)));
    }
}
