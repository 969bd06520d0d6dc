use std::io::IsTerminal;
use std::path::Path;
use std::time::Duration;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use pixpack_frame::FrameGeometry;
use pixpack_pipeline::{DecodeReport, EncodeReport};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct EncodeOutput<'a> {
    command: &'static str,
    input: String,
    output: String,
    geometry: String,
    #[serde(flatten)]
    report: &'a EncodeReport,
    wire_bytes: u64,
    elapsed_ms: u64,
}

#[derive(Serialize)]
struct DecodeOutput<'a> {
    command: &'static str,
    input: String,
    output: String,
    geometry: String,
    #[serde(flatten)]
    report: &'a DecodeReport,
    elapsed_ms: u64,
}

pub fn print_encode_report(
    report: &EncodeReport,
    input: &Path,
    output: &Path,
    geometry: &FrameGeometry,
    elapsed: Duration,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = EncodeOutput {
                command: "encode",
                input: input.display().to_string(),
                output: output.display().to_string(),
                geometry: geometry_label(geometry),
                report,
                wire_bytes: report.wire_bytes(),
                elapsed_ms: elapsed.as_millis() as u64,
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            print_table(&[
                ("input", input.display().to_string()),
                ("output", output.display().to_string()),
                ("geometry", geometry_label(geometry)),
                ("frames", report.frames.to_string()),
                ("payload bytes", report.payload_bytes.to_string()),
                ("frame capacity", report.frame_capacity.to_string()),
                ("wire bytes", report.wire_bytes().to_string()),
                ("elapsed", format_elapsed(elapsed)),
            ]);
        }
        OutputFormat::Pretty => {
            println!(
                "encoded {} bytes from {} into {} frames ({}) -> {} in {}",
                report.payload_bytes,
                input.display(),
                report.frames,
                geometry_label(geometry),
                output.display(),
                format_elapsed(elapsed)
            );
        }
    }
}

pub fn print_decode_report(
    report: &DecodeReport,
    input: &Path,
    output: &Path,
    geometry: &FrameGeometry,
    elapsed: Duration,
    format: OutputFormat,
) {
    match format {
        OutputFormat::Json => {
            let out = DecodeOutput {
                command: "decode",
                input: input.display().to_string(),
                output: output.display().to_string(),
                geometry: geometry_label(geometry),
                report,
                elapsed_ms: elapsed.as_millis() as u64,
            };
            print_json(&out);
        }
        OutputFormat::Table => {
            print_table(&[
                ("input", input.display().to_string()),
                ("output", output.display().to_string()),
                ("geometry", geometry_label(geometry)),
                ("frames", report.frames.to_string()),
                ("bytes written", report.bytes_written.to_string()),
                (
                    "discarded tail bytes",
                    report.discarded_tail_bytes.to_string(),
                ),
                ("elapsed", format_elapsed(elapsed)),
            ]);
        }
        OutputFormat::Pretty => {
            println!(
                "decoded {} frames ({}) from {} -> {} bytes in {} in {}",
                report.frames,
                geometry_label(geometry),
                input.display(),
                report.bytes_written,
                output.display(),
                format_elapsed(elapsed)
            );
            if report.discarded_tail_bytes > 0 {
                println!(
                    "note: discarded {} trailing bytes that did not form a whole frame",
                    report.discarded_tail_bytes
                );
            }
        }
    }
}

pub fn print_json<T: Serialize>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

fn print_table(rows: &[(&str, String)]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["FIELD", "VALUE"]);
    for (field, value) in rows {
        table.add_row(vec![field.to_string(), value.clone()]);
    }
    println!("{table}");
}

pub fn geometry_label(geometry: &FrameGeometry) -> String {
    format!(
        "{}x{} {}",
        geometry.width,
        geometry.height,
        geometry.pixel_format.ffmpeg_name()
    )
}

fn format_elapsed(elapsed: Duration) -> String {
    format!("{:.2}s", elapsed.as_secs_f64())
}
