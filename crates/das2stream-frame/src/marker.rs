use std::fmt;

use das2stream_schema::PacketId;
use serde::Serialize;

/// Marker size: `[00]`, `[NN]`, `[xx]` or `:NN:`.
pub const MARKER_LEN: usize = 4;

/// Digits in a header's content-length field.
pub const LENGTH_DIGITS: usize = 6;

/// Marker plus length field.
pub const HEADER_PREFIX_LEN: usize = MARKER_LEN + LENGTH_DIGITS;

/// Largest header payload the length field can express.
pub const MAX_HEADER_LEN: usize = 999_999;

/// The 4-byte tag that opens every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameMarker {
    /// `[00]`: the stream header.
    Stream,
    /// `[NN]`: a descriptor for packet id NN (or a comment/exception).
    Header(PacketId),
    /// `[xx]`: an out-of-band comment or exception.
    OutOfBand,
    /// `:NN:`: a data packet for id NN.
    Data(PacketId),
}

impl FrameMarker {
    /// Recognize a marker, or `None` when the bytes are not one.
    pub fn parse(tag: &[u8]) -> Option<Self> {
        let [open, a, b, close] = <[u8; MARKER_LEN]>::try_from(tag.get(..MARKER_LEN)?).ok()?;
        match (open, close) {
            (b'[', b']') => match [a, b] {
                [b'0', b'0'] => Some(Self::Stream),
                [b'x', b'x'] => Some(Self::OutOfBand),
                digits => PacketId::from_ascii(digits).map(Self::Header),
            },
            (b':', b':') => PacketId::from_ascii([a, b]).map(Self::Data),
            _ => None,
        }
    }

    pub fn to_bytes(self) -> [u8; MARKER_LEN] {
        match self {
            Self::Stream => *b"[00]",
            Self::OutOfBand => *b"[xx]",
            Self::Header(id) => {
                let [a, b] = id.to_ascii();
                [b'[', a, b, b']']
            }
            Self::Data(id) => {
                let [a, b] = id.to_ascii();
                [b':', a, b, b':']
            }
        }
    }

    /// True for markers followed by a length field and XML.
    pub fn is_header(self) -> bool {
        !matches!(self, Self::Data(_))
    }
}

impl fmt::Display for FrameMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.to_bytes()))
    }
}

/// What a successfully scanned frame turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameKind {
    StreamSchema,
    PacketSchema,
    Data,
    Skipped,
    Comment,
    Exception,
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StreamSchema => "stream header",
            Self::PacketSchema => "packet descriptor",
            Self::Data => "data packet",
            Self::Skipped => "skipped packet",
            Self::Comment => "comment",
            Self::Exception => "exception",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_form() {
        let id = PacketId::new(7).unwrap();
        assert_eq!(FrameMarker::parse(b"[00]"), Some(FrameMarker::Stream));
        assert_eq!(FrameMarker::parse(b"[xx]"), Some(FrameMarker::OutOfBand));
        assert_eq!(FrameMarker::parse(b"[07]"), Some(FrameMarker::Header(id)));
        assert_eq!(FrameMarker::parse(b":07:"), Some(FrameMarker::Data(id)));
        assert_eq!(FrameMarker::parse(b":07:trailing"), Some(FrameMarker::Data(id)));
    }

    #[test]
    fn rejects_near_misses() {
        for tag in [&b":00:"[..], b"[7]x", b"(01)", b"[XX]", b"[0", b"<?xm"] {
            assert_eq!(FrameMarker::parse(tag), None, "{tag:?}");
        }
    }

    #[test]
    fn bytes_roundtrip() {
        for marker in [
            FrameMarker::Stream,
            FrameMarker::OutOfBand,
            FrameMarker::Header(PacketId::new(42).unwrap()),
            FrameMarker::Data(PacketId::new(99).unwrap()),
        ] {
            assert_eq!(FrameMarker::parse(&marker.to_bytes()), Some(marker));
        }
        assert_eq!(FrameMarker::Data(PacketId::new(1).unwrap()).to_string(), ":01:");
    }
}
