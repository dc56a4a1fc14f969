//! Schema descriptors and value codecs for das2stream.
//!
//! A das2stream is self-describing: XML headers announce the layout of the
//! binary packets that follow. This crate owns both halves of that contract:
//! - [`Codec`] turns one field's raw bytes into a number and back
//! - [`StreamSchema`] and [`PacketSchema`] model the headers, parsed from and
//!   serialized to XML (current dialect on write, current or legacy on read)
//!
//! Time-valued fields delegate text parsing to a [`TimeParser`] capability
//! supplied by the caller; [`IsoTimeParser`] is the built-in implementation.

pub mod codec;
pub mod comment;
pub mod descriptor;
pub mod error;
pub mod packet;
pub mod property;
pub mod stream;
pub mod time;
pub mod units;
pub mod xml;

pub use codec::{ByteOrder, Codec, MIN_ASCII_WIDTH, MIN_TIME_WIDTH};
pub use comment::{StreamComment, StreamException};
pub use descriptor::{parse_descriptor, Descriptor};
pub use error::{CodecError, Result, SchemaError};
pub use packet::{FieldRole, FieldSpec, PacketId, PacketSchema, PlaneKind, YTags, MAX_PACKET_LEN};
pub use property::{Properties, PropertyValue};
pub use stream::{Compression, StreamSchema};
pub use time::{default_time_parser, IsoTimeParser, TimeParser};
pub use units::{TimeBase, Units};
