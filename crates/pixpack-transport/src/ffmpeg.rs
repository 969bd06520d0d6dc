use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::pixel::PixelFormat;
use crate::process::{ProcessSink, ProcessSource};

/// Default codec executable, resolved through `PATH`.
pub const DEFAULT_PROGRAM: &str = "ffmpeg";

/// Default lossless video codec.
pub const DEFAULT_CODEC: &str = "ffv1";

/// Default container frame rate.
pub const DEFAULT_FPS: u32 = 30;

/// Where the codec's diagnostic output goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StderrMode {
    /// Discard codec diagnostics.
    #[default]
    Null,
    /// Pass codec diagnostics through to our stderr.
    Inherit,
}

impl StderrMode {
    fn stdio(self) -> Stdio {
        match self {
            StderrMode::Null => Stdio::null(),
            StderrMode::Inherit => Stdio::inherit(),
        }
    }
}

/// Builds ffmpeg invocations for a fixed raw-video geometry.
///
/// Encode reads rawvideo on stdin and writes a container:
/// ```text
/// ffmpeg -hide_banner -loglevel L -y -f rawvideo -pix_fmt P -s WxH -r FPS -i - -c:v CODEC OUT
/// ```
/// Decode reads a container and writes rawvideo on stdout:
/// ```text
/// ffmpeg -hide_banner -loglevel L -nostdin -i IN -f rawvideo -pix_fmt P -
/// ```
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Executable to run.
    pub program: PathBuf,
    /// Frame width in pixels.
    pub width: u32,
    /// Frame height in pixels.
    pub height: u32,
    /// Raw pixel layout on the pipe.
    pub pixel_format: PixelFormat,
    /// Frames per second written into the container.
    pub fps: u32,
    /// Video codec (`-c:v`). Must be lossless for a faithful round trip.
    pub codec: String,
    /// Value for `-loglevel`.
    pub log_level: String,
    /// Codec stderr disposition.
    pub stderr: StderrMode,
}

impl Default for FfmpegCommand {
    fn default() -> Self {
        Self {
            program: PathBuf::from(DEFAULT_PROGRAM),
            width: 1920,
            height: 1080,
            pixel_format: PixelFormat::default(),
            fps: DEFAULT_FPS,
            codec: DEFAULT_CODEC.to_string(),
            log_level: "error".to_string(),
            stderr: StderrMode::default(),
        }
    }
}

impl FfmpegCommand {
    fn common_args(&self) -> Vec<OsString> {
        vec![
            "-hide_banner".into(),
            "-loglevel".into(),
            self.log_level.clone().into(),
        ]
    }

    /// Arguments for turning a raw frame stream on stdin into `output`.
    pub fn encode_args(&self, output: &Path) -> Vec<OsString> {
        let mut args = self.common_args();
        args.extend([
            "-y".into(),
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            self.pixel_format.ffmpeg_name().into(),
            "-s".into(),
            format!("{}x{}", self.width, self.height).into(),
            "-r".into(),
            self.fps.to_string().into(),
            "-i".into(),
            "-".into(),
            "-c:v".into(),
            self.codec.clone().into(),
        ]);
        args.push(output.as_os_str().to_os_string());
        args
    }

    /// Arguments for turning `input` into a raw frame stream on stdout.
    pub fn decode_args(&self, input: &Path) -> Vec<OsString> {
        let mut args = self.common_args();
        args.push("-nostdin".into());
        args.push("-i".into());
        args.push(input.as_os_str().to_os_string());
        args.extend([
            "-f".into(),
            "rawvideo".into(),
            "-pix_fmt".into(),
            self.pixel_format.ffmpeg_name().into(),
            "-".into(),
        ]);
        args
    }

    /// Command that encodes stdin into `output`.
    pub fn encoder(&self, output: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(self.encode_args(output))
            .stdout(Stdio::null())
            .stderr(self.stderr.stdio());
        command
    }

    /// Command that decodes `input` onto stdout.
    pub fn decoder(&self, input: &Path) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(self.decode_args(input))
            .stdin(Stdio::null())
            .stderr(self.stderr.stdio());
        command
    }

    /// Start an encoding codec writing the container at `output`.
    pub fn spawn_sink(&self, output: &Path) -> Result<ProcessSink> {
        debug!(program = ?self.program, output = ?output, "spawning codec sink");
        ProcessSink::spawn(self.encoder(output))
    }

    /// Start a decoding codec reading the container at `input`.
    pub fn spawn_source(&self, input: &Path) -> Result<ProcessSource> {
        debug!(program = ?self.program, input = ?input, "spawning codec source");
        ProcessSource::spawn(self.decoder(input))
    }

    /// Run `<program> -version` and return the first line of its banner.
    pub fn probe_version(&self) -> Result<String> {
        let program = self.program.to_string_lossy().into_owned();
        let output = Command::new(&self.program)
            .arg("-version")
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output()
            .map_err(|source| TransportError::Launch {
                program: program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(TransportError::Exited {
                program,
                code: output.status.code(),
            });
        }
        let banner = String::from_utf8_lossy(&output.stdout);
        Ok(banner.lines().next().unwrap_or_default().trim().to_string())
    }
}
