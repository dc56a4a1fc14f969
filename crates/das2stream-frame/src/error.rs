use std::fmt;

use das2stream_schema::{CodecError, PacketId, SchemaError};
use das2stream_transport::TransportError;
use serde::Serialize;

use crate::marker::{FrameKind, FrameMarker};

/// Where in the stream a scan error happened.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanContext {
    /// Byte offset of the failing frame (decompressed offset once deflate
    /// is active).
    pub offset: u64,
    /// Kind of the last frame that scanned cleanly.
    pub last_frame: Option<FrameKind>,
    /// Stream, packet, comment and exception descriptors seen so far.
    pub descriptors: u64,
    /// Data packets seen so far, skipped ones included.
    pub packets: u64,
}

impl fmt::Display for ScanContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "at byte {}", self.offset)?;
        match self.last_frame {
            Some(kind) => write!(f, ", after a {kind}")?,
            None => f.write_str(", before any frame")?,
        }
        write!(
            f,
            " ({} descriptors, {} packets)",
            self.descriptors, self.packets
        )
    }
}

/// What went wrong while scanning.
#[derive(Debug, thiserror::Error)]
pub enum ScanErrorKind {
    /// The bytes at the scan position are not a legal frame marker here.
    #[error("lost frame sync: found \"{found}\"{}", hint_suffix(.hint))]
    FrameSync { found: String, hint: Option<String> },

    /// A header's length field is not six ASCII digits.
    #[error("invalid content length \"{found}\"")]
    BadContentLength { found: String },

    /// A data packet refers to an id with no descriptor.
    #[error("data packet {0} has no registered descriptor")]
    UnknownPacketId(PacketId),

    /// A header payload failed to parse or validate.
    #[error("invalid {marker} descriptor: {source}{}", length_suffix(.suggested_length))]
    Schema {
        marker: FrameMarker,
        source: SchemaError,
        /// Content length that would have made the frame well formed.
        suggested_length: Option<usize>,
    },

    /// A field that cannot be skipped failed to decode.
    #[error("data packet {id}, field {field}: {source}")]
    Codec {
        id: PacketId,
        field: String,
        source: CodecError,
    },

    /// The input ended inside a frame.
    #[error("stream truncated: {buffered} unread bytes at end of input")]
    Truncated { buffered: usize },

    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn hint_suffix(hint: &Option<String>) -> String {
    hint.as_ref()
        .map(|hint| format!(" ({hint})"))
        .unwrap_or_default()
}

fn length_suffix(suggested: &Option<usize>) -> String {
    suggested
        .map(|len| format!("; the content length is probably {len:06}"))
        .unwrap_or_default()
}

/// A fatal scan failure and where it happened.
#[derive(Debug, thiserror::Error)]
#[error("{kind} {context}")]
pub struct ScanError {
    pub kind: ScanErrorKind,
    pub context: ScanContext,
}

impl ScanError {
    pub fn new(kind: ScanErrorKind, context: ScanContext) -> Self {
        Self { kind, context }
    }

    pub fn kind(&self) -> &ScanErrorKind {
        &self.kind
    }

    pub fn context(&self) -> &ScanContext {
        &self.context
    }
}

/// Errors raised by [`StreamWriter`](crate::StreamWriter).
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid descriptor: {0}")]
    Schema(#[from] SchemaError),

    #[error("cannot encode field {field}: {source}")]
    Codec { field: String, source: CodecError },

    #[error("packet id {0} has no registered descriptor")]
    UnknownPacketId(PacketId),

    #[error("packet {id} takes {expected} values, got {actual}")]
    ValueCount {
        id: PacketId,
        expected: usize,
        actual: usize,
    },

    #[error("the stream header must be written first")]
    StreamSchemaMissing,

    #[error("the stream header has already been written")]
    StreamSchemaAlreadyWritten,

    #[error("header payload of {size} bytes exceeds the {max}-byte limit")]
    HeaderTooLarge { size: usize, max: usize },

    #[error("writer is closed")]
    Closed,
}

impl From<TransportError> for WriteError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Io(io) => Self::Io(io),
            other => Self::Io(std::io::Error::other(other.to_string())),
        }
    }
}

pub(crate) fn transport_to_io(err: TransportError) -> std::io::Error {
    match err {
        TransportError::Io(io) => io,
        other => std::io::Error::other(other.to_string()),
    }
}

pub type Result<T, E = ScanError> = std::result::Result<T, E>;
