use pixpack_frame::{FrameGeometry, HEADER_SIZE};
use pixpack_pipeline::DEFAULT_QUEUE_DEPTH;
use pixpack_transport::{DEFAULT_CODEC, DEFAULT_FPS};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};
use crate::output::geometry_label;

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("pixpack {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: pixpack");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("PIXPACK_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("git_hash: {}", option_env!("GIT_HASH").unwrap_or("unknown"));
    println!("frame_header_bytes: {HEADER_SIZE}");
    println!(
        "default_geometry: {}",
        geometry_label(&FrameGeometry::default())
    );
    println!("default_codec: {DEFAULT_CODEC} @ {DEFAULT_FPS} fps");
    println!("default_queue_depth: {DEFAULT_QUEUE_DEPTH}");

    Ok(SUCCESS)
}
