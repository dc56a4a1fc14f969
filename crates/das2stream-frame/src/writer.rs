use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use das2stream_schema::{
    Compression, PacketId, PacketSchema, StreamComment, StreamException, StreamSchema,
};
use das2stream_transport::WriteChannel;
use tracing::{debug, info, trace};

use crate::config::WriterConfig;
use crate::error::{Result, WriteError};
use crate::marker::{FrameMarker, HEADER_PREFIX_LEN, MARKER_LEN, MAX_HEADER_LEN};
use crate::record::DataRecord;

/// Writes a das2stream to any `Write` sink.
///
/// Frames are encoded into one growable buffer and pushed to the sink when
/// the buffer fills, on [`flush`](Self::flush), or after every packet when
/// [`WriterConfig::flush_each_packet`] is set.
pub struct StreamWriter<W: Write> {
    channel: Option<WriteChannel<W>>,
    buf: BytesMut,
    capacity: usize,
    config: WriterConfig,
    stream_written: bool,
    registry: HashMap<PacketId, Arc<PacketSchema>>,
    next_id: PacketId,
    packets: u64,
}

impl<W: Write> StreamWriter<W> {
    /// Create a writer with default configuration.
    pub fn new(inner: W) -> Self {
        Self::with_config(inner, WriterConfig::default())
    }

    /// Create a writer with explicit configuration.
    pub fn with_config(inner: W, config: WriterConfig) -> Self {
        let capacity = config.buffer_capacity.max(HEADER_PREFIX_LEN);
        Self {
            channel: Some(WriteChannel::new(inner)),
            buf: BytesMut::with_capacity(capacity),
            capacity,
            config,
            stream_written: false,
            registry: HashMap::new(),
            next_id: PacketId::FIRST,
            packets: 0,
        }
    }

    /// Write the `[00]` stream header. Must come first, exactly once.
    ///
    /// When the header declares deflate, everything after it is compressed.
    pub fn write_stream_schema(&mut self, schema: &StreamSchema) -> Result<(), WriteError> {
        self.ensure_open()?;
        if self.stream_written {
            return Err(WriteError::StreamSchemaAlreadyWritten);
        }
        self.put_header(FrameMarker::Stream, &schema.to_xml())?;
        self.stream_written = true;

        if schema.compression == Compression::Deflate {
            self.flush_buffer()?;
            let level = self.config.compression_level;
            self.channel_mut()?.enable_deflate(level)?;
        }
        info!(
            compression = schema.compression.as_str(),
            "stream header written"
        );
        Ok(())
    }

    /// Register a packet descriptor under the next free id and write it.
    ///
    /// Ids cycle through 01..99; when they wrap, the reused id's earlier
    /// descriptor is replaced.
    pub fn write_packet_schema(&mut self, schema: &PacketSchema) -> Result<PacketId, WriteError> {
        let id = self.next_id;
        self.write_packet_schema_as(id, schema)?;
        self.next_id = id.next_cyclic();
        Ok(id)
    }

    /// Register a packet descriptor under an explicit id and write it.
    pub fn write_packet_schema_as(
        &mut self,
        id: PacketId,
        schema: &PacketSchema,
    ) -> Result<(), WriteError> {
        self.ensure_stream()?;
        self.put_header(FrameMarker::Header(id), &schema.to_xml())?;
        if self.registry.insert(id, Arc::new(schema.clone())).is_some() {
            debug!(%id, "packet descriptor replaced");
        } else {
            debug!(%id, byte_len = schema.byte_len(), "packet descriptor registered");
        }
        Ok(())
    }

    /// Encode one data packet. `values` holds every field's values in
    /// packet order, `yscan` items flattened.
    pub fn write_packet(&mut self, id: PacketId, values: &[f64]) -> Result<(), WriteError> {
        self.ensure_stream()?;
        let schema = self
            .registry
            .get(&id)
            .cloned()
            .ok_or(WriteError::UnknownPacketId(id))?;
        if values.len() != schema.value_count() {
            return Err(WriteError::ValueCount {
                id,
                expected: schema.value_count(),
                actual: values.len(),
            });
        }

        self.make_room(MARKER_LEN + schema.byte_len())?;
        let start = self.buf.len();
        self.buf.put_slice(&FrameMarker::Data(id).to_bytes());

        let mut values = values.iter().copied();
        for (index, field) in schema.fields().iter().enumerate() {
            for value in values.by_ref().take(field.item_count()) {
                if let Err(source) = field.codec.encode(value, self.config.time.as_ref(), &mut self.buf)
                {
                    self.buf.truncate(start);
                    let field = field
                        .name
                        .clone()
                        .unwrap_or_else(|| format!("#{index}"));
                    return Err(WriteError::Codec { field, source });
                }
            }
        }

        // A text record ends its line.
        if schema.last_field_is_ascii() {
            if let Some(last) = self.buf.last_mut() {
                if last.is_ascii_whitespace() {
                    *last = b'\n';
                }
            }
        }

        self.packets += 1;
        trace!(%id, "data packet encoded");
        if self.config.flush_each_packet {
            self.flush()?;
        }
        Ok(())
    }

    /// Encode a decoded record under its own packet id.
    pub fn write_record(&mut self, record: &DataRecord) -> Result<(), WriteError> {
        self.write_packet(record.packet_id, &record.values())
    }

    /// Write an out-of-band `[xx]` comment.
    pub fn write_comment(&mut self, comment: &StreamComment) -> Result<(), WriteError> {
        self.ensure_stream()?;
        self.put_header(FrameMarker::OutOfBand, &comment.to_xml())
    }

    /// Write an `[xx]` exception, ending the stream for consumers.
    ///
    /// Before any stream header the exception takes the `[00]` slot instead,
    /// which is how a producer reports that it has nothing to send.
    pub fn write_exception(&mut self, exception: &StreamException) -> Result<(), WriteError> {
        self.ensure_open()?;
        let marker = if self.stream_written {
            FrameMarker::OutOfBand
        } else {
            FrameMarker::Stream
        };
        self.put_header(marker, &exception.to_xml())?;
        self.stream_written = true;
        info!(kind = %exception.kind, "exception written");
        Ok(())
    }

    /// Push buffered frames to the sink and flush it.
    pub fn flush(&mut self) -> Result<(), WriteError> {
        self.flush_buffer()?;
        let channel = self.channel_mut()?;
        loop {
            match channel.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(WriteError::Io(err)),
            }
        }
    }

    /// Flush, finish any compressed stream and return the sink.
    ///
    /// Every later call fails with [`WriteError::Closed`].
    pub fn close(&mut self) -> Result<W, WriteError> {
        self.flush_buffer()?;
        let channel = self.channel.take().ok_or(WriteError::Closed)?;
        info!(packets = self.packets, "stream writer closed");
        Ok(channel.finish()?)
    }

    /// Data packets encoded so far.
    pub fn packets_written(&self) -> u64 {
        self.packets
    }

    /// Descriptor currently registered under `id`.
    pub fn packet_schema(&self, id: PacketId) -> Option<&Arc<PacketSchema>> {
        self.registry.get(&id)
    }

    /// Current write buffer capacity.
    pub fn buffer_capacity(&self) -> usize {
        self.capacity
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    /// Borrow the underlying sink.
    pub fn get_ref(&self) -> Option<&W> {
        self.channel.as_ref().and_then(WriteChannel::get_ref)
    }

    fn ensure_open(&self) -> Result<(), WriteError> {
        if self.channel.is_some() {
            Ok(())
        } else {
            Err(WriteError::Closed)
        }
    }

    fn ensure_stream(&self) -> Result<(), WriteError> {
        self.ensure_open()?;
        if self.stream_written {
            Ok(())
        } else {
            Err(WriteError::StreamSchemaMissing)
        }
    }

    fn channel_mut(&mut self) -> Result<&mut WriteChannel<W>, WriteError> {
        self.channel.as_mut().ok_or(WriteError::Closed)
    }

    fn put_header(&mut self, marker: FrameMarker, xml: &str) -> Result<(), WriteError> {
        if xml.len() > MAX_HEADER_LEN {
            return Err(WriteError::HeaderTooLarge {
                size: xml.len(),
                max: MAX_HEADER_LEN,
            });
        }
        self.make_room(HEADER_PREFIX_LEN + xml.len())?;
        self.buf.put_slice(&marker.to_bytes());
        self.buf.put_slice(format!("{:06}", xml.len()).as_bytes());
        self.buf.put_slice(xml.as_bytes());
        debug!(%marker, len = xml.len(), "header frame encoded");
        Ok(())
    }

    /// Flush first if `frame_len` more bytes would overflow the buffer, then
    /// grow it if the frame alone is larger.
    fn make_room(&mut self, frame_len: usize) -> Result<(), WriteError> {
        if self.buf.len() + frame_len > self.capacity {
            self.flush_buffer()?;
        }
        if frame_len > self.capacity {
            let grown = frame_len + frame_len / 10 + 1024;
            debug!(from = self.capacity, to = grown, "growing write buffer");
            self.buf.reserve(grown);
            self.capacity = grown;
        }
        Ok(())
    }

    fn flush_buffer(&mut self) -> Result<(), WriteError> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let channel = self.channel.as_mut().ok_or(WriteError::Closed)?;
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match channel.write(&self.buf[offset..]) {
                Ok(0) => return Err(WriteError::Io(ErrorKind::WriteZero.into())),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) if err.kind() == ErrorKind::WouldBlock => continue,
                Err(err) => return Err(WriteError::Io(err)),
            }
        }
        self.buf.clear();
        Ok(())
    }
}

impl<W: Write> std::fmt::Debug for StreamWriter<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamWriter")
            .field("channel", &self.channel)
            .field("buffered", &self.buf.len())
            .field("capacity", &self.capacity)
            .field("stream_written", &self.stream_written)
            .field("registered", &self.registry.len())
            .field("packets", &self.packets)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use das2stream_schema::{ByteOrder, Codec, FieldSpec, TimeBase, YTags};

    use super::*;

    const REAL4: Codec = Codec::Real4 {
        order: ByteOrder::Big,
    };

    fn xy_schema() -> PacketSchema {
        PacketSchema::new(vec![
            FieldSpec::x(REAL4, "s"),
            FieldSpec::y(REAL4, "V").with_name("v"),
        ])
        .unwrap()
    }

    fn started() -> StreamWriter<Cursor<Vec<u8>>> {
        let mut writer = StreamWriter::new(Cursor::new(Vec::new()));
        writer.write_stream_schema(&StreamSchema::new()).unwrap();
        writer
    }

    fn output(mut writer: StreamWriter<Cursor<Vec<u8>>>) -> Vec<u8> {
        writer.close().unwrap().into_inner()
    }

    #[test]
    fn header_frames_carry_a_six_digit_length() {
        let wire = output(started());
        assert_eq!(&wire[..10], b"[00]000010");
        assert_eq!(&wire[10..], b"<stream/>\n");
    }

    #[test]
    fn packet_frames_follow_the_descriptor() {
        let mut writer = started();
        let id = writer.write_packet_schema(&xy_schema()).unwrap();
        assert_eq!(id.get(), 1);
        writer.write_packet(id, &[1.0, 2.0]).unwrap();
        let wire = output(writer);

        let mut tail = b":01:".to_vec();
        tail.extend_from_slice(&1f32.to_be_bytes());
        tail.extend_from_slice(&2f32.to_be_bytes());
        assert!(wire.ends_with(&tail));
        let xml = xy_schema().to_xml();
        let header = format!("[01]{:06}{xml}", xml.len());
        assert!(wire.windows(header.len()).any(|w| w == header.as_bytes()));
    }

    #[test]
    fn ascii_records_end_with_newline() {
        let schema = PacketSchema::new(vec![
            FieldSpec::x(
                Codec::Time {
                    width: 25,
                    base: TimeBase::Us2000,
                },
                TimeBase::Us2000,
            ),
            FieldSpec::y(Codec::Ascii { width: 10 }, ""),
        ])
        .unwrap();
        let mut writer = started();
        let id = writer.write_packet_schema(&schema).unwrap();
        writer.write_packet(id, &[0.0, 3.14159]).unwrap();
        let wire = output(writer);

        let packet = &wire[wire.len() - (4 + 25 + 10)..];
        assert_eq!(&packet[..4], b":01:");
        assert_eq!(&packet[4..29], b"2000-01-01T00:00:00.0000 ");
        assert_eq!(&packet[29..], b"  3.14159\n");
    }

    #[test]
    fn ordering_rules() {
        let mut writer = StreamWriter::new(Cursor::new(Vec::new()));
        assert!(matches!(
            writer.write_packet_schema(&xy_schema()),
            Err(WriteError::StreamSchemaMissing)
        ));
        assert!(matches!(
            writer.write_comment(&StreamComment::new("log:info", "x")),
            Err(WriteError::StreamSchemaMissing)
        ));
        writer.write_stream_schema(&StreamSchema::new()).unwrap();
        assert!(matches!(
            writer.write_stream_schema(&StreamSchema::new()),
            Err(WriteError::StreamSchemaAlreadyWritten)
        ));
        assert!(matches!(
            writer.write_packet(PacketId::new(9).unwrap(), &[1.0]),
            Err(WriteError::UnknownPacketId(_))
        ));
        let id = writer.write_packet_schema(&xy_schema()).unwrap();
        assert!(matches!(
            writer.write_packet(id, &[1.0]),
            Err(WriteError::ValueCount {
                expected: 2,
                actual: 1,
                ..
            })
        ));
        writer.close().unwrap();
        assert!(matches!(
            writer.write_packet(id, &[1.0, 2.0]),
            Err(WriteError::Closed)
        ));
        assert!(matches!(writer.close(), Err(WriteError::Closed)));
    }

    #[test]
    fn ids_cycle_and_evict() {
        let mut writer = started();
        let mut last = None;
        for _ in 0..99 {
            last = Some(writer.write_packet_schema(&xy_schema()).unwrap());
        }
        assert_eq!(last.map(PacketId::get), Some(99));

        let wide = PacketSchema::new(vec![
            FieldSpec::x(REAL4, ""),
            FieldSpec::yscan(REAL4, "", 3, YTags::default(), ""),
        ])
        .unwrap();
        let reused = writer.write_packet_schema(&wide).unwrap();
        assert_eq!(reused.get(), 1);
        assert_eq!(writer.packet_schema(reused).unwrap().value_count(), 4);
        writer.write_packet(reused, &[0.0, 1.0, 2.0, 3.0]).unwrap();
    }

    #[test]
    fn encode_failure_leaves_no_partial_packet() {
        let schema = PacketSchema::new(vec![
            FieldSpec::x(REAL4, ""),
            FieldSpec::y(Codec::Ascii { width: 4 }, "").with_name("tight"),
        ])
        .unwrap();
        let mut writer = started();
        let id = writer.write_packet_schema(&schema).unwrap();
        writer.flush().unwrap();
        let before = writer.get_ref().unwrap().get_ref().len();

        let err = writer.write_packet(id, &[0.0, 1.0e300]).unwrap_err();
        assert!(matches!(err, WriteError::Codec { ref field, .. } if field == "tight"));
        let wire = output(writer);
        assert_eq!(wire.len(), before);
    }

    #[test]
    fn oversized_header_is_rejected() {
        let mut writer = started();
        let comment = StreamComment::new("log:info", "x".repeat(MAX_HEADER_LEN));
        assert!(matches!(
            writer.write_comment(&comment),
            Err(WriteError::HeaderTooLarge { .. })
        ));
    }

    #[test]
    fn large_frames_grow_the_buffer() {
        let config = WriterConfig {
            buffer_capacity: 32,
            ..WriterConfig::default()
        };
        let mut writer = StreamWriter::with_config(Cursor::new(Vec::new()), config);
        writer.write_stream_schema(&StreamSchema::new()).unwrap();
        let wide = PacketSchema::new(vec![
            FieldSpec::x(REAL4, ""),
            FieldSpec::yscan(REAL4, "", 500, YTags::default(), ""),
        ])
        .unwrap();
        let id = writer.write_packet_schema(&wide).unwrap();
        writer.write_packet(id, &vec![1.5; 501]).unwrap();
        assert!(writer.buffer_capacity() >= 4 + 501 * 4);
        let wire = output(writer);
        assert!(wire.len() > 501 * 4);
    }

    #[test]
    fn exception_before_header_takes_the_stream_slot() {
        let mut writer = StreamWriter::new(Cursor::new(Vec::new()));
        writer
            .write_exception(&StreamException::new(
                StreamException::NO_DATA_IN_INTERVAL,
                "nothing",
            ))
            .unwrap();
        let wire = output(writer);
        assert!(wire.starts_with(b"[00]"));
    }
}
