use std::io::Write;

use pixpack_frame::{FrameCodec, FrameConfig};
use pixpack_transport::FfmpegCommand;
use serde::Serialize;

use crate::cmd::DoctorArgs;
use crate::exit::{CliResult, HEALTH_CHECK_FAILED, SUCCESS};
use crate::output::{geometry_label, print_json, OutputFormat};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum CheckStatus {
    Pass,
    Fail,
    Info,
}

#[derive(Debug, Serialize)]
struct CheckResult {
    name: &'static str,
    status: CheckStatus,
    detail: String,
}

#[derive(Debug, Serialize)]
struct DoctorOutput {
    checks: Vec<CheckResult>,
    overall: &'static str,
}

pub fn run(args: DoctorArgs, format: OutputFormat) -> CliResult<i32> {
    let ffmpeg = FfmpegCommand {
        program: args.ffmpeg,
        ..FfmpegCommand::default()
    };
    let checks = vec![
        codec_check(&ffmpeg),
        temp_dir_writable_check(),
        default_geometry_check(),
    ];

    let has_fail = checks.iter().any(|c| c.status == CheckStatus::Fail);
    let output = DoctorOutput {
        checks,
        overall: if has_fail { "fail" } else { "pass" },
    };
    print_doctor(&output, format);

    if has_fail {
        Ok(HEALTH_CHECK_FAILED)
    } else {
        Ok(SUCCESS)
    }
}

fn print_doctor(output: &DoctorOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(output),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("pixpack doctor\n");
            for c in &output.checks {
                println!(
                    "  [{:>4}] {:<18} {}",
                    status_text(c.status),
                    c.name,
                    c.detail
                );
            }
            if output.overall == "pass" {
                println!("\n  Result: all checks passed");
            } else {
                println!("\n  Result: one or more checks failed");
            }
        }
    }
}

fn status_text(status: CheckStatus) -> &'static str {
    match status {
        CheckStatus::Pass => "PASS",
        CheckStatus::Fail => "FAIL",
        CheckStatus::Info => "INFO",
    }
}

fn codec_check(ffmpeg: &FfmpegCommand) -> CheckResult {
    match ffmpeg.probe_version() {
        Ok(banner) => CheckResult {
            name: "codec",
            status: CheckStatus::Pass,
            detail: banner,
        },
        Err(err) => CheckResult {
            name: "codec",
            status: CheckStatus::Fail,
            detail: err.to_string(),
        },
    }
}

fn temp_dir_writable_check() -> CheckResult {
    let path = std::env::temp_dir().join(format!("pixpack-doctor-{}", std::process::id()));
    let result = std::fs::File::create(&path).and_then(|mut file| file.write_all(b"ok"));
    let _ = std::fs::remove_file(&path);

    match result {
        Ok(()) => CheckResult {
            name: "temp_dir_writable",
            status: CheckStatus::Pass,
            detail: format!("{} is writable", std::env::temp_dir().display()),
        },
        Err(err) => CheckResult {
            name: "temp_dir_writable",
            status: CheckStatus::Fail,
            detail: format!("{}: {err}", std::env::temp_dir().display()),
        },
    }
}

fn default_geometry_check() -> CheckResult {
    let config = FrameConfig::default();
    let label = geometry_label(&config.geometry);
    match FrameCodec::new(&config) {
        Ok(codec) => CheckResult {
            name: "default_geometry",
            status: CheckStatus::Info,
            detail: format!(
                "{label} = {} bytes per frame, {} payload",
                codec.capacity(),
                codec.max_payload()
            ),
        },
        Err(err) => CheckResult {
            name: "default_geometry",
            status: CheckStatus::Fail,
            detail: format!("{label}: {err}"),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_codec_fails_check() {
        let ffmpeg = FfmpegCommand {
            program: "/nonexistent/pixpack-ffmpeg".into(),
            ..FfmpegCommand::default()
        };
        let check = codec_check(&ffmpeg);
        assert_eq!(check.status, CheckStatus::Fail);
        assert!(check.detail.contains("pixpack-ffmpeg"));
    }

    #[test]
    fn default_geometry_is_informational() {
        let check = default_geometry_check();
        assert_eq!(check.status, CheckStatus::Info);
        assert!(check.detail.contains("1920x1080 rgb24"));
        assert!(check.detail.contains("6220800"));
    }
}
