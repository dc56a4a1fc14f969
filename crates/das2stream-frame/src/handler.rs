use das2stream_schema::{
    CodecError, PacketId, PacketSchema, StreamComment, StreamException, StreamSchema,
};

use crate::error::ScanError;
use crate::record::DataRecord;

/// Push-mode consumer of a das2stream.
///
/// [`StreamReader::run`](crate::StreamReader::run) calls these in stream
/// order. Every method has an empty default, so a handler only overrides
/// what it cares about. Exactly one of [`on_stream_closed`] and [`on_error`]
/// ends every run.
///
/// [`on_stream_closed`]: StreamHandler::on_stream_closed
/// [`on_error`]: StreamHandler::on_error
pub trait StreamHandler {
    fn on_stream_schema(&mut self, _schema: &StreamSchema) {}

    /// A descriptor was registered under `id`, replacing any earlier one.
    fn on_packet_schema(&mut self, _id: PacketId, _schema: &PacketSchema) {}

    fn on_data_packet(&mut self, _record: &DataRecord) {}

    fn on_comment(&mut self, _comment: &StreamComment) {}

    /// The producer ended the stream. [`on_stream_closed`] follows.
    ///
    /// [`on_stream_closed`]: StreamHandler::on_stream_closed
    fn on_exception(&mut self, _exception: &StreamException) {}

    /// A data packet was dropped because a numeric ASCII field did not parse.
    fn on_packet_skipped(&mut self, _id: PacketId, _error: &CodecError) {}

    fn on_stream_closed(&mut self) {}

    fn on_error(&mut self, _error: &ScanError) {}
}

impl<H: StreamHandler + ?Sized> StreamHandler for &mut H {
    fn on_stream_schema(&mut self, schema: &StreamSchema) {
        (**self).on_stream_schema(schema);
    }

    fn on_packet_schema(&mut self, id: PacketId, schema: &PacketSchema) {
        (**self).on_packet_schema(id, schema);
    }

    fn on_data_packet(&mut self, record: &DataRecord) {
        (**self).on_data_packet(record);
    }

    fn on_comment(&mut self, comment: &StreamComment) {
        (**self).on_comment(comment);
    }

    fn on_exception(&mut self, exception: &StreamException) {
        (**self).on_exception(exception);
    }

    fn on_packet_skipped(&mut self, id: PacketId, error: &CodecError) {
        (**self).on_packet_skipped(id, error);
    }

    fn on_stream_closed(&mut self) {
        (**self).on_stream_closed();
    }

    fn on_error(&mut self, error: &ScanError) {
        (**self).on_error(error);
    }
}
