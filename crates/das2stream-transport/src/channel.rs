use std::io::{Chain, Cursor, Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use tracing::debug;

use crate::error::{Result, TransportError};

/// Default zlib level used when a stream header asks for deflate.
pub const DEFAULT_DEFLATE_LEVEL: u32 = 6;

/// Reading end of a das2stream channel.
///
/// Starts out plain. Once the stream header declares `compression="deflate"`
/// the frame layer calls [`ReadChannel::enable_inflate`], handing back any
/// bytes it already pulled past the header; from then on every read goes
/// through a zlib decoder fed by those bytes followed by the inner reader.
pub struct ReadChannel<R> {
    inner: ReadInner<R>,
}

enum ReadInner<R> {
    Plain(R),
    Inflate(Box<ZlibDecoder<Chain<Cursor<Vec<u8>>, R>>>),
    Poisoned,
}

impl<R: Read> ReadChannel<R> {
    /// Wrap a plain reader.
    pub fn new(inner: R) -> Self {
        Self {
            inner: ReadInner::Plain(inner),
        }
    }

    /// Switch to zlib decompression.
    ///
    /// `prefix` holds compressed bytes that were read from the inner reader
    /// but not yet consumed; they are decompressed before anything else.
    pub fn enable_inflate(&mut self, prefix: Vec<u8>) -> Result<()> {
        match std::mem::replace(&mut self.inner, ReadInner::Poisoned) {
            ReadInner::Plain(reader) => {
                debug!(prefix_len = prefix.len(), "read channel switching to inflate");
                let chained = Cursor::new(prefix).chain(reader);
                self.inner = ReadInner::Inflate(Box::new(ZlibDecoder::new(chained)));
                Ok(())
            }
            inflating @ ReadInner::Inflate(_) => {
                self.inner = inflating;
                Err(TransportError::AlreadyCompressed("inflating"))
            }
            ReadInner::Poisoned => Err(TransportError::Poisoned),
        }
    }

    /// True once [`enable_inflate`](Self::enable_inflate) has succeeded.
    pub fn is_inflating(&self) -> bool {
        matches!(self.inner, ReadInner::Inflate(_))
    }

    /// Borrow the underlying reader.
    pub fn get_ref(&self) -> Option<&R> {
        match &self.inner {
            ReadInner::Plain(reader) => Some(reader),
            ReadInner::Inflate(decoder) => Some(decoder.get_ref().get_ref().1),
            ReadInner::Poisoned => None,
        }
    }

    /// Consume the channel and return the underlying reader.
    ///
    /// Bytes buffered inside the decoder are lost.
    pub fn into_inner(self) -> Result<R> {
        match self.inner {
            ReadInner::Plain(reader) => Ok(reader),
            ReadInner::Inflate(decoder) => Ok(decoder.into_inner().into_inner().1),
            ReadInner::Poisoned => Err(TransportError::Poisoned),
        }
    }
}

impl<R: Read> Read for ReadChannel<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            ReadInner::Plain(reader) => reader.read(buf),
            ReadInner::Inflate(decoder) => decoder.read(buf),
            ReadInner::Poisoned => Err(std::io::Error::other(TransportError::Poisoned)),
        }
    }
}

impl<R> std::fmt::Debug for ReadChannel<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match &self.inner {
            ReadInner::Plain(_) => "plain",
            ReadInner::Inflate(_) => "inflate",
            ReadInner::Poisoned => "poisoned",
        };
        f.debug_struct("ReadChannel").field("mode", &mode).finish()
    }
}

/// Writing end of a das2stream channel.
///
/// Mirrors [`ReadChannel`]: plain until [`WriteChannel::enable_deflate`], after
/// which all bytes are zlib-compressed. `flush` performs a zlib sync flush so a
/// consumer on the other end of a pipe or socket sees complete frames.
pub struct WriteChannel<W: Write> {
    inner: WriteInner<W>,
}

enum WriteInner<W: Write> {
    Plain(W),
    Deflate(ZlibEncoder<W>),
    Poisoned,
}

impl<W: Write> WriteChannel<W> {
    /// Wrap a plain writer.
    pub fn new(inner: W) -> Self {
        Self {
            inner: WriteInner::Plain(inner),
        }
    }

    /// Switch to zlib compression at `level` (0-9, clamped).
    pub fn enable_deflate(&mut self, level: u32) -> Result<()> {
        match std::mem::replace(&mut self.inner, WriteInner::Poisoned) {
            WriteInner::Plain(writer) => {
                debug!(level, "write channel switching to deflate");
                self.inner = WriteInner::Deflate(ZlibEncoder::new(
                    writer,
                    Compression::new(level.min(9)),
                ));
                Ok(())
            }
            deflating @ WriteInner::Deflate(_) => {
                self.inner = deflating;
                Err(TransportError::AlreadyCompressed("deflating"))
            }
            WriteInner::Poisoned => Err(TransportError::Poisoned),
        }
    }

    /// True once [`enable_deflate`](Self::enable_deflate) has succeeded.
    pub fn is_deflating(&self) -> bool {
        matches!(self.inner, WriteInner::Deflate(_))
    }

    /// Borrow the underlying writer.
    pub fn get_ref(&self) -> Option<&W> {
        match &self.inner {
            WriteInner::Plain(writer) => Some(writer),
            WriteInner::Deflate(encoder) => Some(encoder.get_ref()),
            WriteInner::Poisoned => None,
        }
    }

    /// Finish the compressed stream (if any) and return the underlying writer.
    pub fn finish(self) -> Result<W> {
        match self.inner {
            WriteInner::Plain(mut writer) => {
                writer.flush()?;
                Ok(writer)
            }
            WriteInner::Deflate(encoder) => {
                let mut writer = encoder.finish()?;
                writer.flush()?;
                Ok(writer)
            }
            WriteInner::Poisoned => Err(TransportError::Poisoned),
        }
    }
}

impl<W: Write> Write for WriteChannel<W> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            WriteInner::Plain(writer) => writer.write(buf),
            WriteInner::Deflate(encoder) => encoder.write(buf),
            WriteInner::Poisoned => Err(std::io::Error::other(TransportError::Poisoned)),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            WriteInner::Plain(writer) => writer.flush(),
            WriteInner::Deflate(encoder) => encoder.flush(),
            WriteInner::Poisoned => Err(std::io::Error::other(TransportError::Poisoned)),
        }
    }
}

impl<W: Write> std::fmt::Debug for WriteChannel<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = match &self.inner {
            WriteInner::Plain(_) => "plain",
            WriteInner::Deflate(_) => "deflate",
            WriteInner::Poisoned => "poisoned",
        };
        f.debug_struct("WriteChannel").field("mode", &mode).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deflated(data: &[u8]) -> Vec<u8> {
        let mut channel = WriteChannel::new(Vec::new());
        channel.enable_deflate(DEFAULT_DEFLATE_LEVEL).unwrap();
        channel.write_all(data).unwrap();
        channel.finish().unwrap()
    }

    #[test]
    fn plain_read_passes_through() {
        let mut channel = ReadChannel::new(Cursor::new(b"[00]000000".to_vec()));
        let mut out = Vec::new();
        channel.read_to_end(&mut out).unwrap();
        assert_eq!(out, b"[00]000000");
        assert!(!channel.is_inflating());
    }

    #[test]
    fn header_then_compressed_body() {
        let mut wire = b"HEADER".to_vec();
        wire.extend_from_slice(&deflated(b":01:payload bytes"));

        let mut channel = ReadChannel::new(Cursor::new(wire));
        let mut header = [0u8; 6];
        channel.read_exact(&mut header).unwrap();
        assert_eq!(&header, b"HEADER");

        channel.enable_inflate(Vec::new()).unwrap();
        let mut body = Vec::new();
        channel.read_to_end(&mut body).unwrap();
        assert_eq!(body, b":01:payload bytes");
    }

    #[test]
    fn prefix_bytes_are_inflated_first() {
        let compressed = deflated(b"abcdefghijklmnopqrstuvwxyz");
        let (already_read, rest) = compressed.split_at(5);

        let mut channel = ReadChannel::new(Cursor::new(rest.to_vec()));
        channel.enable_inflate(already_read.to_vec()).unwrap();
        let mut body = Vec::new();
        channel.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"abcdefghijklmnopqrstuvwxyz");
    }

    #[test]
    fn double_enable_is_rejected() {
        let mut reader = ReadChannel::new(Cursor::new(Vec::<u8>::new()));
        reader.enable_inflate(Vec::new()).unwrap();
        assert!(matches!(
            reader.enable_inflate(Vec::new()),
            Err(TransportError::AlreadyCompressed(_))
        ));
        assert!(reader.is_inflating());

        let mut writer = WriteChannel::new(Vec::new());
        writer.enable_deflate(1).unwrap();
        assert!(matches!(
            writer.enable_deflate(1),
            Err(TransportError::AlreadyCompressed(_))
        ));
        assert!(writer.is_deflating());
    }

    #[test]
    fn deflate_flush_makes_prefix_decodable() {
        let mut channel = WriteChannel::new(Vec::new());
        channel.write_all(b"[00]").unwrap();
        channel.enable_deflate(DEFAULT_DEFLATE_LEVEL).unwrap();
        channel.write_all(b"first").unwrap();
        channel.flush().unwrap();

        let so_far = channel.get_ref().unwrap().clone();
        assert!(so_far.starts_with(b"[00]"));

        let mut decoder = ZlibDecoder::new(Cursor::new(so_far[4..].to_vec()));
        let mut buf = [0u8; 5];
        decoder.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"first");
    }

    #[test]
    fn plain_finish_returns_writer() {
        let mut channel = WriteChannel::new(Vec::new());
        channel.write_all(b"plain").unwrap();
        assert_eq!(channel.finish().unwrap(), b"plain");
    }
}
