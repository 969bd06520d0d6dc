use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use pixpack_frame::{FillerPolicy, FrameConfig, FrameGeometry};
use pixpack_pipeline::{CancelToken, ProgressSnapshot, DEFAULT_QUEUE_DEPTH};
use pixpack_transport::{FfmpegCommand, PixelFormat, StderrMode, DEFAULT_CODEC, DEFAULT_FPS};

use crate::exit::{CliError, CliResult, INTERNAL};
use crate::output::OutputFormat;

pub mod decode;
pub mod doctor;
pub mod encode;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Pack a file into a lossless video.
    Encode(EncodeArgs),
    /// Recover the original file from a video made by `encode`.
    Decode(DecodeArgs),
    /// Check that the codec is usable.
    Doctor(DoctorArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Encode(args) => encode::run(args, format),
        Command::Decode(args) => decode::run(args, format),
        Command::Doctor(args) => doctor::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum PixelFormatArg {
    Rgb24,
    Bgr24,
    Rgba,
    Gray,
}

impl From<PixelFormatArg> for PixelFormat {
    fn from(arg: PixelFormatArg) -> Self {
        match arg {
            PixelFormatArg::Rgb24 => PixelFormat::Rgb24,
            PixelFormatArg::Bgr24 => PixelFormat::Bgr24,
            PixelFormatArg::Rgba => PixelFormat::Rgba,
            PixelFormatArg::Gray => PixelFormat::Gray,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum FillerArg {
    /// Zero bytes after the payload.
    Zero,
    /// Deterministic pseudo-random bytes after the payload.
    Noise,
}

impl From<FillerArg> for FillerPolicy {
    fn from(arg: FillerArg) -> Self {
        match arg {
            FillerArg::Zero => FillerPolicy::Zero,
            FillerArg::Noise => FillerPolicy::Noise,
        }
    }
}

/// Codec and frame settings shared by `encode` and `decode`.
///
/// Decoding must use the geometry and pixel format the file was encoded with.
#[derive(Args, Debug, Clone)]
pub struct CodecArgs {
    /// ffmpeg executable.
    #[arg(long, value_name = "PATH", env = "PIXPACK_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,
    /// Frame width in pixels.
    #[arg(long, default_value_t = 1920, value_parser = clap::value_parser!(u32).range(1..))]
    pub width: u32,
    /// Frame height in pixels.
    #[arg(long, default_value_t = 1080, value_parser = clap::value_parser!(u32).range(1..))]
    pub height: u32,
    /// Raw pixel layout on the codec pipe.
    #[arg(long, value_enum, default_value = "rgb24")]
    pub pixel_format: PixelFormatArg,
    /// Video frame rate.
    #[arg(long, default_value_t = DEFAULT_FPS, value_parser = clap::value_parser!(u32).range(1..))]
    pub fps: u32,
    /// Video codec passed to ffmpeg. Must be lossless.
    #[arg(long, default_value = DEFAULT_CODEC)]
    pub codec: String,
    /// Frames buffered between the two pipeline threads.
    #[arg(long, default_value_t = DEFAULT_QUEUE_DEPTH as u64, value_parser = clap::value_parser!(u64).range(1..4097))]
    pub queue_depth: u64,
    /// Interval between progress log lines (e.g. 500ms, 2s).
    #[arg(long, default_value = "500ms", value_parser = parse_interval)]
    pub progress_interval: Duration,
    /// Pass ffmpeg's own diagnostics through to stderr.
    #[arg(long)]
    pub codec_log: bool,
}

impl CodecArgs {
    pub fn geometry(&self) -> FrameGeometry {
        FrameGeometry::new(self.width, self.height, self.pixel_format.into())
    }

    pub fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            geometry: self.geometry(),
            ..FrameConfig::default()
        }
    }

    pub fn queue_depth(&self) -> usize {
        usize::try_from(self.queue_depth).unwrap_or(DEFAULT_QUEUE_DEPTH)
    }

    pub fn ffmpeg(&self) -> FfmpegCommand {
        FfmpegCommand {
            program: self.ffmpeg.clone(),
            width: self.width,
            height: self.height,
            pixel_format: self.pixel_format.into(),
            fps: self.fps,
            codec: self.codec.clone(),
            stderr: if self.codec_log {
                StderrMode::Inherit
            } else {
                StderrMode::Null
            },
            ..FfmpegCommand::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct EncodeArgs {
    /// File to pack.
    pub input: PathBuf,
    /// Video file to create (overwritten if it exists).
    pub output: PathBuf,
    /// Filler written after the payload of the final frame.
    #[arg(long, value_enum, default_value = "zero")]
    pub filler: FillerArg,
    #[command(flatten)]
    pub codec: CodecArgs,
}

#[derive(Args, Debug)]
pub struct DecodeArgs {
    /// Video file produced by `encode`.
    pub input: PathBuf,
    /// File to write the recovered bytes to.
    pub output: PathBuf,
    /// Accept out-of-order frames instead of failing.
    #[arg(long)]
    pub no_verify: bool,
    #[command(flatten)]
    pub codec: CodecArgs,
}

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// ffmpeg executable.
    #[arg(long, value_name = "PATH", env = "PIXPACK_FFMPEG", default_value = "ffmpeg")]
    pub ffmpeg: PathBuf,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Cancel `token` on Ctrl-C.
pub fn install_ctrlc_handler(token: CancelToken) -> CliResult<()> {
    ctrlc::set_handler(move || {
        tracing::warn!("interrupted, stopping");
        token.cancel();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}

/// Progress observer that logs throughput at info level.
pub fn log_progress(snapshot: &ProgressSnapshot) {
    tracing::info!(
        frames_produced = snapshot.frames_produced,
        frames_consumed = snapshot.frames_consumed,
        bytes_read = snapshot.bytes_read,
        bytes_written = snapshot.bytes_written,
        in_flight = snapshot.in_flight(),
        state = ?snapshot.state,
        "progress"
    );
}

fn parse_interval(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    if input.is_empty() {
        return Err("interval must not be empty".to_string());
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid interval value: {input}"))?;
    if value == 0 {
        return Err("interval must be greater than zero".to_string());
    }

    Ok(match unit {
        "ms" => Duration::from_millis(value),
        _ => Duration::from_secs(value),
    })
}
