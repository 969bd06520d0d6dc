use std::fs::{self, File};
use std::io::BufReader;
use std::time::Instant;

use pixpack_pipeline::{CancelToken, EncodeConfig, Encoder};

use crate::cmd::{install_ctrlc_handler, log_progress, EncodeArgs};
use crate::exit::{io_error, pipeline_error, transport_error, CliResult, SUCCESS};
use crate::output::{print_encode_report, OutputFormat};

pub fn run(args: EncodeArgs, format: OutputFormat) -> CliResult<i32> {
    let input = File::open(&args.input).map_err(|err| io_error("open input failed", err))?;
    let input_len = input
        .metadata()
        .map_err(|err| io_error("stat input failed", err))?
        .len();

    let mut frame = args.codec.frame_config();
    frame.filler = args.filler.into();
    let cancel = CancelToken::new();
    let encoder = Encoder::new(EncodeConfig {
        frame,
        queue_depth: args.codec.queue_depth(),
        progress_interval: args.codec.progress_interval,
    })
    .map_err(|err| pipeline_error("invalid frame geometry", err))?
    .with_cancel_token(cancel.clone());
    install_ctrlc_handler(cancel.clone())?;

    let mut sink = args
        .codec
        .ffmpeg()
        .spawn_sink(&args.output)
        .map_err(|err| transport_error("failed to start codec", err))?;
    let kill = sink.kill_switch();
    let _kill_on_cancel = cancel.on_cancel(move || kill.trigger());

    tracing::info!(
        input = %args.input.display(),
        output = %args.output.display(),
        bytes = input_len,
        frames = input_len.div_ceil(encoder.codec().max_payload() as u64).max(1),
        "encoding"
    );
    let started = Instant::now();
    let result = encoder.run_with_observer(
        BufReader::new(input),
        Some(input_len),
        &mut sink,
        log_progress,
    );

    match result {
        Ok(report) => {
            print_encode_report(
                &report,
                &args.input,
                &args.output,
                &frame.geometry,
                started.elapsed(),
                format,
            );
            Ok(SUCCESS)
        }
        Err(err) => {
            drop(sink);
            if let Err(remove_err) = fs::remove_file(&args.output) {
                tracing::debug!(error = %remove_err, "no partial output to remove");
            }
            Err(pipeline_error("encode failed", err))
        }
    }
}
