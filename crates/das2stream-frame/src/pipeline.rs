use std::sync::Arc;
use std::thread::JoinHandle;

use das2stream_transport::{pipe, PipeReader, PipeWriter};
use tracing::debug;

use crate::config::{ReaderConfig, WriterConfig};
use crate::error::{Result, WriteError};
use crate::reader::StreamReader;
use crate::writer::StreamWriter;

/// Run a producer on its own thread, connected to a reader on this one.
///
/// `produce` writes a complete stream through the [`StreamWriter`] it is
/// given; the writer is closed when it returns `Ok`. At most `capacity`
/// chunks are in flight, so a slow consumer stalls the producer. Dropping the
/// returned reader makes the producer's next write fail with a broken pipe.
pub fn spawn_producer<F>(
    config: WriterConfig,
    capacity: usize,
    produce: F,
) -> (JoinHandle<Result<(), WriteError>>, StreamReader<PipeReader>)
where
    F: FnOnce(&mut StreamWriter<PipeWriter>) -> Result<(), WriteError> + Send + 'static,
{
    let (tx, rx) = pipe(capacity.max(1));
    let reader_config = ReaderConfig {
        time: Arc::clone(&config.time),
        ..ReaderConfig::default()
    };

    let handle = std::thread::spawn(move || {
        let mut writer = StreamWriter::with_config(tx, config);
        produce(&mut writer)?;
        writer.close()?;
        debug!("producer finished");
        Ok(())
    });

    (handle, StreamReader::with_config(rx, reader_config))
}
