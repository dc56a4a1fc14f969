use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use das2stream_frame::DataRecord;
use das2stream_schema::{PacketId, PacketSchema, StreamComment, StreamException, StreamSchema};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// One handler callback, as printed by `dump`.
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event<'a> {
    StreamSchema {
        schema: &'a StreamSchema,
    },
    PacketSchema {
        id: PacketId,
        byte_len: usize,
        schema: &'a PacketSchema,
    },
    Data {
        #[serde(flatten)]
        record: &'a DataRecord,
    },
    Comment {
        #[serde(flatten)]
        comment: &'a StreamComment,
    },
    Exception {
        #[serde(flatten)]
        exception: &'a StreamException,
    },
    Skipped {
        id: PacketId,
        error: String,
    },
    Closed,
}

impl Event<'_> {
    pub fn name(&self) -> &'static str {
        match self {
            Event::StreamSchema { .. } => "stream",
            Event::PacketSchema { .. } => "packet",
            Event::Data { .. } => "data",
            Event::Comment { .. } => "comment",
            Event::Exception { .. } => "exception",
            Event::Skipped { .. } => "skipped",
            Event::Closed => "closed",
        }
    }

    pub fn id(&self) -> Option<PacketId> {
        match self {
            Event::PacketSchema { id, .. } | Event::Skipped { id, .. } => Some(*id),
            Event::Data { record } => Some(record.packet_id),
            _ => None,
        }
    }

    pub fn detail(&self) -> String {
        match self {
            Event::StreamSchema { schema } => format!(
                "version={} compression={} properties={}",
                schema.version.as_deref().unwrap_or("-"),
                schema.compression.as_str(),
                schema.properties.len()
            ),
            Event::PacketSchema {
                schema, byte_len, ..
            } => format!("{} fields, {byte_len} bytes", schema.fields().len()),
            Event::Data { record } => record
                .planes
                .iter()
                .map(|plane| {
                    let label = plane
                        .name
                        .clone()
                        .unwrap_or_else(|| plane.kind.to_string());
                    match plane.values.as_slice() {
                        [value] => format!("{label}={value}"),
                        values => format!("{label}=[{} values]", values.len()),
                    }
                })
                .collect::<Vec<_>>()
                .join(" "),
            Event::Comment { comment } => format!("{}={}", comment.kind, comment.value),
            Event::Exception { exception } => format!("{}: {}", exception.kind, exception.message),
            Event::Skipped { error, .. } => error.clone(),
            Event::Closed => String::new(),
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }

    pub fn to_pretty(&self) -> String {
        let id = self.id().map(|id| id.to_string()).unwrap_or_default();
        format!("{:<9} {:>2} {}", self.name(), id, self.detail())
            .trim_end()
            .to_string()
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.name().to_string(),
            self.id().map(|id| id.to_string()).unwrap_or_default(),
            self.detail(),
        ]
    }
}

pub fn print_table(header: Vec<&str>, rows: Vec<Vec<String>>) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);
    for row in rows {
        table.add_row(row);
    }
    println!("{table}");
}
