//! Frame layer of das2stream.
//!
//! A stream is a sequence of frames, each introduced by a 4-byte marker:
//! - `[00]` + 6-digit length + `<stream>` header (first frame only)
//! - `[NN]` + 6-digit length + `<packet>` descriptor for id NN, or an
//!   out-of-band `<comment>`/`<exception>`
//! - `[xx]` + 6-digit length + `<comment>` or `<exception>`
//! - `:NN:` + a data packet whose length comes from descriptor NN
//!
//! [`FrameDecoder`] is the sans-io scanner; [`StreamReader`] drives it from
//! any `Read` and dispatches to a [`StreamHandler`]. [`StreamWriter`] is the
//! producing side.

pub mod buffer;
pub mod config;
pub mod decoder;
pub mod diagnose;
pub mod error;
pub mod handler;
pub mod marker;
pub mod pipeline;
pub mod reader;
pub mod record;
pub mod writer;

pub use buffer::ByteArena;
pub use config::{ReaderConfig, WriterConfig, DEFAULT_BUFFER_CAPACITY, DEFAULT_READ_CHUNK_SIZE};
pub use decoder::{DecoderStats, Frame, FrameDecoder, Step};
pub use error::{Result, ScanContext, ScanError, ScanErrorKind, WriteError};
pub use handler::StreamHandler;
pub use marker::{FrameKind, FrameMarker, HEADER_PREFIX_LEN, MAX_HEADER_LEN};
pub use pipeline::spawn_producer;
pub use reader::StreamReader;
pub use record::{DataRecord, Plane};
pub use writer::StreamWriter;
