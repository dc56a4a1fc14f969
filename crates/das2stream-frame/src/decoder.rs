//! Sans-io frame scanner.
//!
//! [`FrameDecoder`] owns the read buffer and the packet registry but performs
//! no I/O: callers [`feed`](FrameDecoder::feed) it bytes (or write into
//! [`spare_mut`](FrameDecoder::spare_mut)) and pull frames with
//! [`try_read_frame`](FrameDecoder::try_read_frame). A frame is consumed only
//! once it is complete, so delivery is the same however the input is chunked.

use std::collections::HashMap;
use std::sync::Arc;

use das2stream_schema::xml::{line_column, parse_element};
use das2stream_schema::{
    parse_descriptor, CodecError, Descriptor, PacketId, PacketSchema, SchemaError, StreamComment,
    StreamException, StreamSchema,
};
use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::buffer::ByteArena;
use crate::config::ReaderConfig;
use crate::diagnose::{suggest_content_length, sync_hint};
use crate::error::{Result, ScanContext, ScanError, ScanErrorKind};
use crate::marker::{FrameKind, FrameMarker, HEADER_PREFIX_LEN, LENGTH_DIGITS, MARKER_LEN};
use crate::record::DataRecord;

/// Outcome of one scan attempt.
#[derive(Debug)]
pub enum Step {
    /// At least `wanted` unread bytes are needed before the next frame is
    /// complete.
    NeedMoreData { wanted: usize },
    Frame(Frame),
}

/// One complete, interpreted frame.
#[derive(Debug, Clone)]
pub enum Frame {
    StreamSchema(StreamSchema),
    PacketSchema {
        id: PacketId,
        schema: Arc<PacketSchema>,
    },
    Data(DataRecord),
    Comment(StreamComment),
    /// The producer ended the stream with an exception.
    Exception(StreamException),
    /// A data packet dropped because a numeric ASCII field did not parse.
    Skipped {
        id: PacketId,
        offset: u64,
        error: CodecError,
    },
}

impl Frame {
    pub fn kind(&self) -> FrameKind {
        match self {
            Self::StreamSchema(_) => FrameKind::StreamSchema,
            Self::PacketSchema { .. } => FrameKind::PacketSchema,
            Self::Data(_) => FrameKind::Data,
            Self::Comment(_) => FrameKind::Comment,
            Self::Exception(_) => FrameKind::Exception,
            Self::Skipped { .. } => FrameKind::Skipped,
        }
    }
}

/// Running totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DecoderStats {
    /// Bytes consumed so far.
    pub offset: u64,
    pub last_frame: Option<FrameKind>,
    pub descriptors: u64,
    pub packets: u64,
    pub skipped: u64,
    pub comments: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    AwaitStreamSchema,
    Scanning,
}

/// Incremental das2stream scanner.
#[derive(Debug)]
pub struct FrameDecoder {
    arena: ByteArena,
    state: State,
    registry: HashMap<PacketId, Arc<PacketSchema>>,
    stats: DecoderStats,
    config: ReaderConfig,
}

/// Header frame located in the buffer, payload not yet parsed.
struct HeaderSpan {
    payload_start: usize,
    declared: usize,
}

impl FrameDecoder {
    pub fn new(config: ReaderConfig) -> Self {
        Self {
            arena: ByteArena::with_capacity(config.initial_buffer_capacity),
            state: State::AwaitStreamSchema,
            registry: HashMap::new(),
            stats: DecoderStats::default(),
            config,
        }
    }

    /// Append input bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.arena.feed(bytes);
    }

    /// Free buffer space for a direct read of at most `max` bytes.
    pub fn spare_mut(&mut self, max: usize) -> &mut [u8] {
        self.arena.spare_mut(max)
    }

    /// Record `n` bytes read into [`spare_mut`](Self::spare_mut).
    pub fn commit(&mut self, n: usize) {
        self.arena.commit(n);
    }

    /// Hand back every buffered, unconsumed byte.
    pub fn take_unread(&mut self) -> Vec<u8> {
        self.arena.take_unread()
    }

    pub fn buffered(&self) -> usize {
        self.arena.len()
    }

    pub fn buffer_capacity(&self) -> usize {
        self.arena.capacity()
    }

    pub fn stats(&self) -> &DecoderStats {
        &self.stats
    }

    pub fn config(&self) -> &ReaderConfig {
        &self.config
    }

    /// Descriptor currently registered under `id`.
    pub fn packet_schema(&self, id: PacketId) -> Option<&Arc<PacketSchema>> {
        self.registry.get(&id)
    }

    /// Where the scanner is, for error reports.
    pub fn context(&self) -> ScanContext {
        ScanContext {
            offset: self.stats.offset,
            last_frame: self.stats.last_frame,
            descriptors: self.stats.descriptors,
            packets: self.stats.packets,
        }
    }

    pub(crate) fn error(&self, kind: ScanErrorKind) -> ScanError {
        ScanError::new(kind, self.context())
    }

    /// Signal end of input. Fails when a partial frame is left over.
    pub fn finish(&self) -> Result<()> {
        if self.arena.is_empty() {
            info!(
                bytes = self.stats.offset,
                packets = self.stats.packets,
                "stream closed"
            );
            Ok(())
        } else {
            Err(self.error(ScanErrorKind::Truncated {
                buffered: self.arena.len(),
            }))
        }
    }

    /// Scan the next frame out of the buffered bytes.
    ///
    /// Incomplete input leaves the decoder untouched and returns
    /// [`Step::NeedMoreData`]. Errors are fatal for the stream.
    pub fn try_read_frame(&mut self) -> Result<Step> {
        let buf = self.arena.unread();
        if buf.len() < MARKER_LEN {
            return Ok(Step::NeedMoreData { wanted: MARKER_LEN });
        }
        let Some(marker) = FrameMarker::parse(buf) else {
            return Err(self.sync_error(None));
        };

        match (self.state, marker) {
            (State::AwaitStreamSchema, FrameMarker::Stream) => {}
            (State::AwaitStreamSchema, _) => {
                return Err(self.sync_error(Some("the first frame must be a [00] stream header")))
            }
            (State::Scanning, FrameMarker::Stream) => {
                return Err(self.sync_error(Some("[00] is only legal as the first frame")))
            }
            (State::Scanning, _) => {}
        }

        match marker {
            FrameMarker::Data(id) => self.scan_data(id),
            _ => self.scan_header(marker),
        }
    }

    fn sync_error(&self, reason: Option<&str>) -> ScanError {
        let buf = self.arena.unread();
        let found = buf[..MARKER_LEN.min(buf.len())].escape_ascii().to_string();
        let hint = sync_hint(buf).or(reason).map(str::to_string);
        self.error(ScanErrorKind::FrameSync { found, hint })
    }

    /// Find the payload bounds of a header frame, tolerating a stray
    /// newline in place of the first length digit.
    fn locate_header(&self) -> Result<Option<HeaderSpan>> {
        let buf = self.arena.unread();
        if buf.len() < HEADER_PREFIX_LEN {
            return Ok(None);
        }
        let digits = &buf[MARKER_LEN..HEADER_PREFIX_LEN];
        if let Some(declared) = parse_length(digits) {
            return Ok(Some(HeaderSpan {
                payload_start: HEADER_PREFIX_LEN,
                declared,
            }));
        }

        if digits[0] == b'\n' && self.config.tolerate_stray_newline {
            if buf.len() < HEADER_PREFIX_LEN + 1 {
                return Ok(None);
            }
            if let Some(declared) = parse_length(&buf[MARKER_LEN + 1..HEADER_PREFIX_LEN + 1]) {
                warn!(
                    offset = self.stats.offset,
                    "newline found in header length field; skipping it"
                );
                return Ok(Some(HeaderSpan {
                    payload_start: HEADER_PREFIX_LEN + 1,
                    declared,
                }));
            }
        }

        Err(self.error(ScanErrorKind::BadContentLength {
            found: digits.escape_ascii().to_string(),
        }))
    }

    fn scan_header(&mut self, marker: FrameMarker) -> Result<Step> {
        let Some(span) = self.locate_header()? else {
            return Ok(Step::NeedMoreData {
                wanted: HEADER_PREFIX_LEN,
            });
        };
        let total = span.payload_start + span.declared;
        if self.arena.len() < total {
            self.arena.reserve_frame(total);
            return Ok(Step::NeedMoreData { wanted: total });
        }

        let descriptor = self.parse_payload(marker, &span)?;
        let frame = match (marker, descriptor) {
            (FrameMarker::Stream, Descriptor::Stream(schema)) => {
                info!(
                    version = schema.version.as_deref().unwrap_or(""),
                    compression = schema.compression.as_str(),
                    "stream opened"
                );
                self.state = State::Scanning;
                Frame::StreamSchema(schema)
            }
            (FrameMarker::Header(id), Descriptor::Packet(schema)) => {
                let schema = Arc::new(schema);
                if self.registry.insert(id, Arc::clone(&schema)).is_some() {
                    debug!(%id, byte_len = schema.byte_len(), "packet descriptor replaced");
                } else {
                    debug!(%id, byte_len = schema.byte_len(), "packet descriptor registered");
                }
                Frame::PacketSchema { id, schema }
            }
            (_, Descriptor::Comment(comment)) if marker != FrameMarker::Stream => {
                self.stats.comments += 1;
                Frame::Comment(comment)
            }
            (_, Descriptor::Exception(exception)) => {
                info!(kind = %exception.kind, "stream ended by exception");
                self.state = State::Scanning;
                Frame::Exception(exception)
            }
            (marker, other) => {
                let root = other.root_name().to_string();
                return Err(self.error(ScanErrorKind::Schema {
                    marker,
                    source: SchemaError::UnexpectedRoot(root),
                    suggested_length: None,
                }));
            }
        };

        self.arena.consume(total);
        self.stats.offset += total as u64;
        self.stats.descriptors += 1;
        self.stats.last_frame = Some(frame.kind());
        Ok(Step::Frame(frame))
    }

    fn parse_payload(&self, marker: FrameMarker, span: &HeaderSpan) -> Result<Descriptor> {
        let buf = self.arena.unread();
        let payload = &buf[span.payload_start..span.payload_start + span.declared];
        let schema_error = |source: SchemaError| {
            let suggested_length = match &source {
                SchemaError::TrailingContent { position, .. } => suggest_content_length(
                    buf,
                    span.payload_start,
                    span.declared,
                    *position,
                ),
                _ => None,
            };
            self.error(ScanErrorKind::Schema {
                marker,
                source,
                suggested_length,
            })
        };

        let text = match std::str::from_utf8(payload) {
            Ok(text) => text,
            Err(e) => return Err(schema_error(diagnose_invalid_utf8(payload, e.valid_up_to()))),
        };
        parse_descriptor(text).map_err(schema_error)
    }

    fn scan_data(&mut self, id: PacketId) -> Result<Step> {
        let Some(schema) = self.registry.get(&id).cloned() else {
            return Err(self.error(ScanErrorKind::UnknownPacketId(id)));
        };
        let total = MARKER_LEN + schema.byte_len();
        if self.arena.len() < total {
            self.arena.reserve_frame(total);
            return Ok(Step::NeedMoreData { wanted: total });
        }

        let offset = self.stats.offset;
        let body = &self.arena.unread()[MARKER_LEN..total];
        let frame = match DataRecord::decode(id, &schema, body, self.config.time.as_ref()) {
            Ok(record) => {
                trace!(%id, offset, "data packet");
                Frame::Data(record)
            }
            Err(failure) => {
                let field = &schema.fields()[failure.index];
                let skippable = self.config.skip_bad_ascii_packets
                    && matches!(field.codec, das2stream_schema::Codec::Ascii { .. });
                if !skippable {
                    let label = field
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("#{}", failure.index));
                    return Err(self.error(ScanErrorKind::Codec {
                        id,
                        field: label,
                        source: failure.error,
                    }));
                }
                warn!(%id, offset, error = %failure.error, "skipping unparseable data packet");
                self.stats.skipped += 1;
                Frame::Skipped {
                    id,
                    offset,
                    error: failure.error,
                }
            }
        };

        self.arena.consume(total);
        self.stats.offset += total as u64;
        self.stats.packets += 1;
        self.stats.last_frame = Some(frame.kind());
        Ok(Step::Frame(frame))
    }
}

fn parse_length(digits: &[u8]) -> Option<usize> {
    if digits.len() != LENGTH_DIGITS || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    Some(
        digits
            .iter()
            .fold(0usize, |acc, d| acc * 10 + usize::from(d - b'0')),
    )
}

/// Classify a header payload that stops being UTF-8 at `valid_up_to`.
///
/// An overlong content length usually swallows the start of a binary data
/// packet. When the root element already closed in the valid prefix, the
/// bad bytes are trailing content, not broken XML.
fn diagnose_invalid_utf8(payload: &[u8], valid_up_to: usize) -> SchemaError {
    let prefix = std::str::from_utf8(&payload[..valid_up_to]).unwrap_or_default();
    match parse_element(prefix) {
        Err(err @ SchemaError::TrailingContent { .. }) => err,
        Ok(_) => {
            let (line, column) = line_column(prefix, valid_up_to);
            SchemaError::TrailingContent {
                position: valid_up_to,
                line,
                column,
            }
        }
        Err(_) => {
            let (line, column) = line_column(prefix, valid_up_to);
            SchemaError::Xml {
                position: valid_up_to,
                line,
                column,
                message: "header payload is not valid UTF-8".to_string(),
            }
        }
    }
}
