use std::io::{ErrorKind, Read};

use das2stream_schema::Compression;
use das2stream_transport::ReadChannel;
use tracing::info;

use crate::config::ReaderConfig;
use crate::decoder::{DecoderStats, Frame, FrameDecoder, Step};
use crate::error::{transport_to_io, Result, ScanError, ScanErrorKind};
use crate::handler::StreamHandler;

/// Reads das2stream frames from any `Read` source.
///
/// Handles partial reads, buffer growth and the switch to inflate after a
/// `compression="deflate"` stream header; callers only ever see complete
/// frames.
#[derive(Debug)]
pub struct StreamReader<R> {
    channel: ReadChannel<R>,
    decoder: FrameDecoder,
    finished: bool,
}

impl<R: Read> StreamReader<R> {
    /// Create a reader with default configuration.
    pub fn new(inner: R) -> Self {
        Self::with_config(inner, ReaderConfig::default())
    }

    /// Create a reader with explicit configuration.
    pub fn with_config(inner: R, config: ReaderConfig) -> Self {
        Self {
            channel: ReadChannel::new(inner),
            decoder: FrameDecoder::new(config),
            finished: false,
        }
    }

    /// Read the next frame (blocking).
    ///
    /// Returns `Ok(None)` at a clean end of stream, or once an exception
    /// frame has been returned. After an error the reader stays finished.
    pub fn read_frame(&mut self) -> Result<Option<Frame>> {
        if self.finished {
            return Ok(None);
        }
        loop {
            let step = self.decoder.try_read_frame().map_err(|e| self.stop(e))?;
            match step {
                Step::Frame(frame) => {
                    self.after_frame(&frame).map_err(|e| self.stop(e))?;
                    return Ok(Some(frame));
                }
                Step::NeedMoreData { .. } => {
                    if self.fill().map_err(|e| self.stop(e))? == 0 {
                        self.finished = true;
                        self.decoder.finish()?;
                        return Ok(None);
                    }
                }
            }
        }
    }

    /// Read to the end, pushing every frame to `handler`.
    ///
    /// Ends with exactly one of `on_stream_closed` (also after an exception
    /// frame) or `on_error`.
    pub fn run<H: StreamHandler + ?Sized>(&mut self, handler: &mut H) -> Result<DecoderStats> {
        loop {
            match self.read_frame() {
                Ok(Some(frame)) => {
                    let ended = matches!(frame, Frame::Exception(_));
                    dispatch(handler, frame);
                    if ended {
                        handler.on_stream_closed();
                        return Ok(self.stats().clone());
                    }
                }
                Ok(None) => {
                    handler.on_stream_closed();
                    return Ok(self.stats().clone());
                }
                Err(err) => {
                    handler.on_error(&err);
                    return Err(err);
                }
            }
        }
    }

    pub fn stats(&self) -> &DecoderStats {
        self.decoder.stats()
    }

    pub fn decoder(&self) -> &FrameDecoder {
        &self.decoder
    }

    /// True once the stream header switched the source to inflate.
    pub fn is_inflating(&self) -> bool {
        self.channel.is_inflating()
    }

    /// Borrow the underlying source.
    pub fn get_ref(&self) -> Option<&R> {
        self.channel.get_ref()
    }

    /// Consume the reader and return the underlying source.
    pub fn into_inner(self) -> std::io::Result<R> {
        self.channel.into_inner().map_err(transport_to_io)
    }

    fn stop(&mut self, err: ScanError) -> ScanError {
        self.finished = true;
        err
    }

    fn after_frame(&mut self, frame: &Frame) -> Result<()> {
        match frame {
            Frame::StreamSchema(schema) if schema.compression == Compression::Deflate => {
                let pending = self.decoder.take_unread();
                info!(pending = pending.len(), "switching input to inflate");
                self.channel
                    .enable_inflate(pending)
                    .map_err(|e| self.decoder.error(ScanErrorKind::Io(transport_to_io(e))))
            }
            Frame::Exception(_) => {
                self.finished = true;
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn fill(&mut self) -> Result<usize> {
        let chunk = self.decoder.config().read_chunk_size;
        loop {
            let spare = self.decoder.spare_mut(chunk);
            match self.channel.read(spare) {
                Ok(n) => {
                    self.decoder.commit(n);
                    return Ok(n);
                }
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(self.decoder.error(ScanErrorKind::Io(err))),
            }
        }
    }
}

fn dispatch<H: StreamHandler + ?Sized>(handler: &mut H, frame: Frame) {
    match frame {
        Frame::StreamSchema(schema) => handler.on_stream_schema(&schema),
        Frame::PacketSchema { id, schema } => handler.on_packet_schema(id, &schema),
        Frame::Data(record) => handler.on_data_packet(&record),
        Frame::Comment(comment) => handler.on_comment(&comment),
        Frame::Exception(exception) => handler.on_exception(&exception),
        Frame::Skipped { id, error, .. } => handler.on_packet_skipped(id, &error),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use das2stream_schema::{CodecError, PacketId, PacketSchema, StreamException};

    use super::*;
    use crate::record::DataRecord;

    fn header(marker: &str, xml: &str) -> Vec<u8> {
        format!("{marker}{:06}{xml}", xml.len()).into_bytes()
    }

    fn sample_stream() -> Vec<u8> {
        let mut wire = header("[00]", "<stream/>");
        wire.extend(header(
            "[01]",
            r#"<packet><x type="sun_real8" units="t2000"/><y type="sun_real4" units="V"/></packet>"#,
        ));
        for i in 0..3 {
            wire.extend_from_slice(b":01:");
            wire.extend_from_slice(&f64::from(i).to_be_bytes());
            wire.extend_from_slice(&(i as f32 * 0.5).to_be_bytes());
        }
        wire.extend(header("[xx]", r#"<comment type="taskProgress" value="3"/>"#));
        wire
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<String>,
    }

    impl StreamHandler for Recorder {
        fn on_stream_schema(&mut self, _schema: &das2stream_schema::StreamSchema) {
            self.events.push("stream".into());
        }
        fn on_packet_schema(&mut self, id: PacketId, _schema: &PacketSchema) {
            self.events.push(format!("packet {id}"));
        }
        fn on_data_packet(&mut self, record: &DataRecord) {
            self.events.push(format!("data {}", record.x));
        }
        fn on_comment(&mut self, comment: &das2stream_schema::StreamComment) {
            self.events.push(format!("comment {}", comment.value));
        }
        fn on_exception(&mut self, exception: &StreamException) {
            self.events.push(format!("exception {}", exception.kind));
        }
        fn on_packet_skipped(&mut self, id: PacketId, _error: &CodecError) {
            self.events.push(format!("skipped {id}"));
        }
        fn on_stream_closed(&mut self) {
            self.events.push("closed".into());
        }
        fn on_error(&mut self, _error: &ScanError) {
            self.events.push("error".into());
        }
    }

    #[test]
    fn run_dispatches_in_order() {
        let mut reader = StreamReader::new(Cursor::new(sample_stream()));
        let mut recorder = Recorder::default();
        let stats = reader.run(&mut recorder).unwrap();

        assert_eq!(
            recorder.events,
            vec![
                "stream",
                "packet 01",
                "data 0",
                "data 1",
                "data 2",
                "comment 3",
                "closed"
            ]
        );
        assert_eq!(stats.packets, 3);
        assert_eq!(stats.descriptors, 3);
    }

    #[test]
    fn pull_mode_ends_with_none() {
        let mut reader = StreamReader::new(Cursor::new(sample_stream()));
        let mut count = 0;
        while reader.read_frame().unwrap().is_some() {
            count += 1;
        }
        assert_eq!(count, 6);
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn partial_read_handling() {
        let reader = ByteByByteReader {
            bytes: sample_stream(),
            pos: 0,
        };
        let mut reader = StreamReader::new(reader);
        let mut recorder = Recorder::default();
        reader.run(&mut recorder).unwrap();
        assert_eq!(recorder.events.len(), 7);
    }

    #[test]
    fn empty_input_closes_cleanly() {
        let mut reader = StreamReader::new(Cursor::new(Vec::<u8>::new()));
        let mut recorder = Recorder::default();
        reader.run(&mut recorder).unwrap();
        assert_eq!(recorder.events, vec!["closed"]);
    }

    #[test]
    fn truncated_input_is_one_error() {
        let mut wire = sample_stream();
        wire.truncate(wire.len() - 5);
        let mut reader = StreamReader::new(Cursor::new(wire));
        let mut recorder = Recorder::default();
        let err = reader.run(&mut recorder).unwrap_err();

        assert!(matches!(err.kind, ScanErrorKind::Truncated { .. }));
        assert_eq!(recorder.events.last().map(String::as_str), Some("error"));
        assert_eq!(recorder.events.iter().filter(|e| *e == "closed").count(), 0);
        assert!(reader.read_frame().unwrap().is_none());
    }

    #[test]
    fn exception_ends_the_stream() {
        let mut wire = header("[00]", "<stream/>");
        wire.extend(header("[xx]", r#"<exception type="ServerError" message="disk"/>"#));
        wire.extend_from_slice(b"garbage that is never read");

        let mut reader = StreamReader::new(Cursor::new(wire));
        let mut recorder = Recorder::default();
        reader.run(&mut recorder).unwrap();
        assert_eq!(
            recorder.events,
            vec!["stream", "exception ServerError", "closed"]
        );
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            state: 0,
            bytes: sample_stream(),
            pos: 0,
        };
        let mut reader = StreamReader::new(reader);
        let mut recorder = Recorder::default();
        reader.run(&mut recorder).unwrap();
        assert_eq!(recorder.events.last().map(String::as_str), Some("closed"));
    }

    #[test]
    fn read_would_block_propagates_io_error() {
        let reader = WouldBlockThenData {
            state: 0,
            bytes: sample_stream(),
            pos: 0,
        };
        let mut reader = StreamReader::new(reader);
        let err = reader.read_frame().unwrap_err();
        assert!(matches!(err.kind, ScanErrorKind::Io(ref e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn small_chunks_and_buffer() {
        let config = ReaderConfig {
            initial_buffer_capacity: 16,
            read_chunk_size: 3,
            ..ReaderConfig::default()
        };
        let mut reader = StreamReader::with_config(Cursor::new(sample_stream()), config);
        let mut recorder = Recorder::default();
        reader.run(&mut recorder).unwrap();
        assert_eq!(recorder.events.len(), 7);
    }

    #[test]
    fn accessors_and_into_inner() {
        let reader = StreamReader::new(Cursor::new(vec![1u8, 2, 3]));
        assert!(!reader.is_inflating());
        assert_eq!(reader.get_ref().unwrap().get_ref(), &vec![1u8, 2, 3]);
        let inner = reader.into_inner().unwrap();
        assert_eq!(inner.position(), 0);
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }
            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            let n = (self.bytes.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }

    struct WouldBlockThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for WouldBlockThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::WouldBlock));
            }
            let n = (self.bytes.len() - self.pos).min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }
}
