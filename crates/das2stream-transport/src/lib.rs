//! Byte channels underneath the das2stream frame layer.
//!
//! Everything here is a thin decorator over `std::io::Read` / `std::io::Write`:
//! - [`ReadChannel`] / [`WriteChannel`] switch to zlib (de)compression part way
//!   through a stream, once the stream header has announced it
//! - [`pipe`] connects a producer thread to a consumer thread with bounded
//!   buffering, so a slow reader stalls the writer
//!
//! The frame layer never sees compression; it reads and writes through these.

pub mod channel;
pub mod error;
pub mod pipe;

pub use channel::{ReadChannel, WriteChannel, DEFAULT_DEFLATE_LEVEL};
pub use error::{Result, TransportError};
pub use pipe::{pipe, PipeReader, PipeWriter, DEFAULT_PIPE_CAPACITY, MAX_PIPE_CHUNK};
