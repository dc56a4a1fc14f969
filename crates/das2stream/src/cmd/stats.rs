use std::collections::BTreeMap;

use das2stream_frame::{DataRecord, StreamHandler, StreamReader};
use das2stream_schema::{
    CodecError, PacketId, PacketSchema, StreamComment, StreamException, StreamSchema,
};
use serde::Serialize;

use crate::cmd::{open_input, StatsArgs};
use crate::exit::{scan_error, CliResult, SUCCESS};
use crate::output::{print_table, OutputFormat};

#[derive(Serialize, Debug, Clone, PartialEq)]
struct IdStats {
    id: PacketId,
    descriptors: u64,
    /// Packet size under the most recent descriptor.
    packet_bytes: usize,
    packets: u64,
    skipped: u64,
}

#[derive(Serialize, Default, Debug)]
struct StatsOutput {
    bytes: u64,
    compression: &'static str,
    descriptors: u64,
    packets: u64,
    skipped: u64,
    comments: u64,
    exception: Option<String>,
    ids: Vec<IdStats>,
}

#[derive(Default)]
struct Counter {
    compression: &'static str,
    comments: u64,
    exception: Option<String>,
    ids: BTreeMap<PacketId, IdStats>,
}

impl Counter {
    fn entry(&mut self, id: PacketId) -> &mut IdStats {
        self.ids.entry(id).or_insert_with(|| IdStats {
            id,
            descriptors: 0,
            packet_bytes: 0,
            packets: 0,
            skipped: 0,
        })
    }
}

impl StreamHandler for Counter {
    fn on_stream_schema(&mut self, schema: &StreamSchema) {
        self.compression = schema.compression.as_str();
    }

    fn on_packet_schema(&mut self, id: PacketId, schema: &PacketSchema) {
        let entry = self.entry(id);
        entry.descriptors += 1;
        entry.packet_bytes = schema.byte_len();
    }

    fn on_data_packet(&mut self, record: &DataRecord) {
        self.entry(record.packet_id).packets += 1;
    }

    fn on_comment(&mut self, _comment: &StreamComment) {
        self.comments += 1;
    }

    fn on_exception(&mut self, exception: &StreamException) {
        self.exception = Some(format!("{}: {}", exception.kind, exception.message));
    }

    fn on_packet_skipped(&mut self, id: PacketId, _error: &CodecError) {
        self.entry(id).skipped += 1;
    }
}

pub fn run(args: StatsArgs, format: OutputFormat) -> CliResult<i32> {
    let input = open_input(args.input.as_deref())?;
    let mut reader = StreamReader::with_config(input, args.scan.reader_config());
    let mut counter = Counter::default();
    let result = reader.run(&mut counter);

    let totals = reader.stats();
    let out = StatsOutput {
        bytes: totals.offset,
        compression: counter.compression,
        descriptors: totals.descriptors,
        packets: totals.packets,
        skipped: totals.skipped,
        comments: counter.comments,
        exception: counter.exception,
        ids: counter.ids.into_values().collect(),
    };
    print_stats(&out, format);

    result.map_err(|err| scan_error("stream read failed", err))?;
    Ok(SUCCESS)
}

fn print_stats(out: &StatsOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let rows = out
                .ids
                .iter()
                .map(|s| {
                    vec![
                        s.id.to_string(),
                        s.descriptors.to_string(),
                        s.packet_bytes.to_string(),
                        s.packets.to_string(),
                        s.skipped.to_string(),
                    ]
                })
                .collect();
            print_table(
                vec!["ID", "DESCRIPTORS", "BYTES/PACKET", "PACKETS", "SKIPPED"],
                rows,
            );
            print_summary(out);
        }
        OutputFormat::Pretty => {
            print_summary(out);
            for s in &out.ids {
                println!(
                    "  [{}] {} packets of {} bytes, {} skipped, {} descriptors",
                    s.id, s.packets, s.packet_bytes, s.skipped, s.descriptors
                );
            }
        }
    }
}

fn print_summary(out: &StatsOutput) {
    println!("Stream:");
    println!("  Bytes:       {}", out.bytes);
    println!("  Compression: {}", out.compression);
    println!("  Descriptors: {}", out.descriptors);
    println!("  Packets:     {} ({} skipped)", out.packets, out.skipped);
    println!("  Comments:    {}", out.comments);
    if let Some(exception) = &out.exception {
        println!("  Exception:   {exception}");
    }
}
