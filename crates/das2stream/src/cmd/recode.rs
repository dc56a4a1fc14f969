use std::io::Write;

use das2stream_frame::{Frame, StreamReader, StreamWriter, WriterConfig};
use tracing::{info, warn};

use crate::cmd::{open_input, open_output, RecodeArgs};
use crate::exit::{io_error, scan_error, write_error, CliResult, SUCCESS};

pub fn run(args: RecodeArgs) -> CliResult<i32> {
    let input = open_input(Some(args.input.as_path()))?;
    let output = open_output(&args.output)?;

    let mut reader = StreamReader::with_config(input, args.scan.reader_config());
    let config = WriterConfig {
        flush_each_packet: args.flush_each_packet,
        compression_level: args.level,
        ..WriterConfig::default()
    };
    let mut writer = StreamWriter::with_config(output, config);

    let mut skipped = 0u64;
    while let Some(frame) = reader
        .read_frame()
        .map_err(|err| scan_error("stream read failed", err))?
    {
        let written = match frame {
            Frame::StreamSchema(mut schema) => {
                if let Some(compression) = args.compression {
                    schema.compression = compression.into();
                }
                writer.write_stream_schema(&schema)
            }
            Frame::PacketSchema { id, schema } => writer.write_packet_schema_as(id, &schema),
            Frame::Data(record) => writer.write_record(&record),
            Frame::Comment(comment) => writer.write_comment(&comment),
            Frame::Exception(exception) => writer.write_exception(&exception),
            Frame::Skipped { id, offset, error } => {
                warn!(%id, offset, %error, "dropping undecodable packet");
                skipped += 1;
                Ok(())
            }
        };
        written.map_err(|err| write_error("stream write failed", err))?;
    }

    let packets = writer.packets_written();
    let mut sink = writer
        .close()
        .map_err(|err| write_error("stream write failed", err))?;
    sink.flush()
        .map_err(|err| io_error("stream write failed", err))?;

    info!(packets, skipped, "recode finished");
    Ok(SUCCESS)
}
