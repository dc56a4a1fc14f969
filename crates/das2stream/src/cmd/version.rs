use das2stream_frame::{DEFAULT_BUFFER_CAPACITY, MAX_HEADER_LEN};
use das2stream_schema::PacketId;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("das2stream {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: das2stream");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("DAS2STREAM_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("codecs: sun_real4, sun_real8, little_endian_real4, little_endian_real8, asciiW, timeW");
    println!("compression: none, deflate");
    println!("packet_ids: {}-{}", PacketId::MIN, PacketId::MAX);
    println!("max_header_bytes: {MAX_HEADER_LEN}");
    println!("default_buffer_bytes: {DEFAULT_BUFFER_CAPACITY}");

    Ok(SUCCESS)
}
