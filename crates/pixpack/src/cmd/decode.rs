use std::ffi::OsString;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use std::time::Instant;

use pixpack_pipeline::{CancelToken, DecodeConfig, Decoder};

use crate::cmd::{install_ctrlc_handler, log_progress, DecodeArgs};
use crate::exit::{io_error, pipeline_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_decode_report, OutputFormat};

pub fn run(args: DecodeArgs, format: OutputFormat) -> CliResult<i32> {
    // ffmpeg reports a missing input only as an unsuccessful exit.
    fs::metadata(&args.input).map_err(|err| io_error("open input failed", err))?;

    let frame = args.codec.frame_config();
    let cancel = CancelToken::new();
    let decoder = Decoder::new(DecodeConfig {
        frame,
        queue_depth: args.codec.queue_depth(),
        progress_interval: args.codec.progress_interval,
        verify_sequence: !args.no_verify,
    })
    .map_err(|err| pipeline_error("invalid frame geometry", err))?
    .with_cancel_token(cancel.clone());
    install_ctrlc_handler(cancel.clone())?;

    let partial = partial_path(&args.output);
    let file = File::create(&partial).map_err(|err| io_error("create output failed", err))?;

    let mut source = match args.codec.ffmpeg().spawn_source(&args.input) {
        Ok(source) => source,
        Err(err) => {
            remove_partial(&partial);
            return Err(transport_error("failed to start codec", err));
        }
    };
    let kill = source.kill_switch();
    let _kill_on_cancel = cancel.on_cancel(move || kill.trigger());

    tracing::info!(
        input = %args.input.display(),
        output = %args.output.display(),
        "decoding"
    );
    let started = Instant::now();
    let result = decoder.run_with_observer(&mut source, BufWriter::new(file), log_progress);

    let report = match result {
        Ok(report) => report,
        Err(err) => {
            remove_partial(&partial);
            return Err(pipeline_error("decode failed", err));
        }
    };
    fs::rename(&partial, &args.output).map_err(|err| io_error("finalize output failed", err))?;

    print_decode_report(
        &report,
        &args.input,
        &args.output,
        &frame.geometry,
        started.elapsed(),
        format,
    );
    Ok(SUCCESS)
}

/// `<output>.partial`, next to the final output so the rename stays on one
/// filesystem.
fn partial_path(output: &Path) -> PathBuf {
    let mut name = output
        .file_name()
        .map(OsString::from)
        .unwrap_or_else(|| OsString::from("output"));
    name.push(".partial");
    output.with_file_name(name)
}

fn remove_partial(partial: &Path) {
    if let Err(err) = fs::remove_file(partial) {
        tracing::warn!(path = %partial.display(), error = %err, "failed to remove partial output");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_path_sits_beside_output() {
        assert_eq!(
            partial_path(Path::new("/data/out.bin")),
            PathBuf::from("/data/out.bin.partial")
        );
        assert_eq!(
            partial_path(Path::new("restored")),
            PathBuf::from("restored.partial")
        );
    }
}
