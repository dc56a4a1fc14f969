//! Reader, writer and inspection tools for das2 self-describing data streams.
//!
//! A das2stream interleaves XML headers, which describe packet layouts, with
//! fixed-length binary or ASCII data packets. This crate bundles the layers
//! that read and write them.
//!
//! # Crate Structure
//!
//! - [`transport`]: byte channels with optional deflate, and an in-process pipe
//! - [`schema`]: value codecs and the stream, packet and comment descriptors
//! - [`frame`]: the incremental frame scanner, stream writer and handler trait
//!
//! The most used types are re-exported at the crate root.

/// Re-export transport types.
pub mod transport {
    pub use das2stream_transport::*;
}

/// Re-export schema types.
pub mod schema {
    pub use das2stream_schema::*;
}

/// Re-export frame types.
pub mod frame {
    pub use das2stream_frame::*;
}

pub use das2stream_frame::{
    spawn_producer, DataRecord, Frame, FrameDecoder, ReaderConfig, ScanError, StreamHandler,
    StreamReader, StreamWriter, WriteError, WriterConfig,
};
pub use das2stream_schema::{
    Codec, Compression, FieldSpec, PacketId, PacketSchema, StreamComment, StreamException,
    StreamSchema,
};
