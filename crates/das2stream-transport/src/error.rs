/// Errors that can occur in das2stream channel operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// An I/O error occurred on the underlying channel.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Compression was requested on a channel that is already compressed.
    #[error("channel is already {0}")]
    AlreadyCompressed(&'static str),

    /// A previous mode switch failed and left the channel without a stream.
    #[error("channel poisoned by a failed mode switch")]
    Poisoned,
}

pub type Result<T> = std::result::Result<T, TransportError>;
