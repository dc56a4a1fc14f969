use clap::{Args, Subcommand, ValueEnum};
use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use das2stream_frame::{ReaderConfig, DEFAULT_BUFFER_CAPACITY};
use das2stream_schema::Compression;
use das2stream_transport::DEFAULT_DEFLATE_LEVEL;

use crate::exit::{io_error, CliResult};
use crate::output::OutputFormat;

pub mod dump;
pub mod recode;
pub mod stats;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print every header, packet and comment in a stream.
    Dump(DumpArgs),
    /// Count descriptors, packets and skipped packets per id.
    Stats(StatsArgs),
    /// Re-encode a stream, optionally changing its compression.
    Recode(RecodeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Dump(args) => dump::run(args, format),
        Command::Stats(args) => stats::run(args, format),
        Command::Recode(args) => recode::run(args),
        Command::Version(args) => version::run(args),
    }
}

/// Scanner knobs shared by every reading command.
#[derive(Args, Debug, Clone)]
pub struct ScanArgs {
    /// Reject headers with a newline in the length field.
    #[arg(long)]
    pub strict_length: bool,
    /// Fail on an unparseable ASCII value instead of skipping its packet.
    #[arg(long)]
    pub fail_on_bad_ascii: bool,
    /// Initial read buffer size in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_BUFFER_CAPACITY)]
    pub buffer_size: usize,
}

impl ScanArgs {
    pub fn reader_config(&self) -> ReaderConfig {
        ReaderConfig {
            initial_buffer_capacity: self.buffer_size,
            tolerate_stray_newline: !self.strict_length,
            skip_bad_ascii_packets: !self.fail_on_bad_ascii,
            ..ReaderConfig::default()
        }
    }
}

#[derive(Args, Debug)]
pub struct DumpArgs {
    /// Stream file to read; `-` or nothing reads stdin.
    pub input: Option<PathBuf>,
    /// Stop after N data packets.
    #[arg(long)]
    pub count: Option<u64>,
    #[command(flatten)]
    pub scan: ScanArgs,
}

#[derive(Args, Debug)]
pub struct StatsArgs {
    /// Stream file to read; `-` or nothing reads stdin.
    pub input: Option<PathBuf>,
    #[command(flatten)]
    pub scan: ScanArgs,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum CompressionArg {
    None,
    Deflate,
}

impl From<CompressionArg> for Compression {
    fn from(arg: CompressionArg) -> Self {
        match arg {
            CompressionArg::None => Compression::None,
            CompressionArg::Deflate => Compression::Deflate,
        }
    }
}

#[derive(Args, Debug)]
pub struct RecodeArgs {
    /// Stream to read; `-` reads stdin.
    pub input: PathBuf,
    /// Destination; `-` writes stdout.
    pub output: PathBuf,
    /// Output compression. Default: keep the input's.
    #[arg(long)]
    pub compression: Option<CompressionArg>,
    /// zlib level for deflate output.
    #[arg(long, default_value_t = DEFAULT_DEFLATE_LEVEL, value_parser = clap::value_parser!(u32).range(0..=9))]
    pub level: u32,
    /// Flush the output after every data packet.
    #[arg(long)]
    pub flush_each_packet: bool,
    #[command(flatten)]
    pub scan: ScanArgs,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

fn is_stdio(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Open a stream source: a file, or stdin for `-` or no path.
pub fn open_input(path: Option<&Path>) -> CliResult<Box<dyn Read>> {
    match path {
        Some(path) if !is_stdio(path) => {
            let file = File::open(path)
                .map_err(|err| io_error(&format!("cannot open {}", path.display()), err))?;
            Ok(Box::new(file))
        }
        _ => Ok(Box::new(io::stdin().lock())),
    }
}

/// Open a stream sink: a file, or stdout for `-`.
pub fn open_output(path: &Path) -> CliResult<Box<dyn Write>> {
    if is_stdio(path) {
        return Ok(Box::new(io::stdout().lock()));
    }
    let file = File::create(path)
        .map_err(|err| io_error(&format!("cannot create {}", path.display()), err))?;
    Ok(Box::new(BufWriter::new(file)))
}
