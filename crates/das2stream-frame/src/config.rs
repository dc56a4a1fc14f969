use std::sync::Arc;

use das2stream_schema::{default_time_parser, TimeParser};
use das2stream_transport::DEFAULT_DEFLATE_LEVEL;

/// Default read and write buffer size: 64 KiB.
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// Default bytes requested per `read` call: 8 KiB.
pub const DEFAULT_READ_CHUNK_SIZE: usize = 8 * 1024;

/// Configuration for [`StreamReader`](crate::StreamReader) and
/// [`FrameDecoder`](crate::FrameDecoder).
#[derive(Debug, Clone)]
pub struct ReaderConfig {
    /// Starting arena size. Grows on demand for larger frames.
    pub initial_buffer_capacity: usize,
    /// Upper bound on bytes requested from the source per read.
    pub read_chunk_size: usize,
    /// Accept a newline in place of the first length digit when six digits
    /// follow it, as some legacy producers emit. Default: on.
    pub tolerate_stray_newline: bool,
    /// Skip a data packet whose numeric ASCII field does not parse, instead
    /// of failing the stream. Default: on.
    pub skip_bad_ascii_packets: bool,
    /// Time text capability for `timeW` fields.
    pub time: Arc<dyn TimeParser>,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            initial_buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            read_chunk_size: DEFAULT_READ_CHUNK_SIZE,
            tolerate_stray_newline: true,
            skip_bad_ascii_packets: true,
            time: default_time_parser(),
        }
    }
}

/// Configuration for [`StreamWriter`](crate::StreamWriter).
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Pending bytes held before they are pushed to the sink.
    pub buffer_capacity: usize,
    /// Push every data packet to the sink as soon as it is encoded.
    pub flush_each_packet: bool,
    /// zlib level used when the stream header asks for deflate (0-9).
    pub compression_level: u32,
    /// Time text capability for `timeW` fields.
    pub time: Arc<dyn TimeParser>,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            flush_each_packet: false,
            compression_level: DEFAULT_DEFLATE_LEVEL,
            time: default_time_parser(),
        }
    }
}
