use das2stream_frame::{Frame, StreamReader};
use tracing::info;

use crate::cmd::{open_input, DumpArgs};
use crate::exit::{scan_error, CliResult, SUCCESS};
use crate::output::{print_table, Event, OutputFormat};

pub fn run(args: DumpArgs, format: OutputFormat) -> CliResult<i32> {
    let input = open_input(args.input.as_deref())?;
    let mut reader = StreamReader::with_config(input, args.scan.reader_config());
    let mut printer = Printer::new(format);
    let mut data_packets = 0u64;

    let outcome = loop {
        if args.count.is_some_and(|limit| data_packets >= limit) {
            info!(data_packets, "packet limit reached");
            break Ok(());
        }
        match reader.read_frame() {
            Ok(Some(frame)) => {
                if matches!(frame, Frame::Data(_)) {
                    data_packets += 1;
                }
                printer.frame(&frame);
            }
            Ok(None) => {
                printer.emit(&Event::Closed);
                break Ok(());
            }
            Err(err) => break Err(err),
        }
    };

    printer.finish();
    outcome.map_err(|err| scan_error("stream read failed", err))?;
    Ok(SUCCESS)
}

struct Printer {
    format: OutputFormat,
    rows: Vec<Vec<String>>,
}

impl Printer {
    fn new(format: OutputFormat) -> Self {
        Self {
            format,
            rows: Vec::new(),
        }
    }

    fn frame(&mut self, frame: &Frame) {
        let event = match frame {
            Frame::StreamSchema(schema) => Event::StreamSchema { schema },
            Frame::PacketSchema { id, schema } => Event::PacketSchema {
                id: *id,
                byte_len: schema.byte_len(),
                schema,
            },
            Frame::Data(record) => Event::Data { record },
            Frame::Comment(comment) => Event::Comment { comment },
            Frame::Exception(exception) => Event::Exception { exception },
            Frame::Skipped { id, error, .. } => Event::Skipped {
                id: *id,
                error: error.to_string(),
            },
        };
        self.emit(&event);
    }

    fn emit(&mut self, event: &Event<'_>) {
        match self.format {
            OutputFormat::Json => println!("{}", event.to_json()),
            OutputFormat::Pretty => println!("{}", event.to_pretty()),
            OutputFormat::Table => self.rows.push(event.to_row()),
        }
    }

    /// Tables are printed once, after the last frame or the first error.
    fn finish(self) {
        if !self.rows.is_empty() {
            print_table(vec!["EVENT", "ID", "DETAIL"], self.rows);
        }
    }
}
