use chrono::SecondsFormat;
use serde::Serialize;

use lokube_types::LogRecord;

/// Body of the label name and label value listings.
#[derive(Debug, Serialize)]
pub struct LabelsResponse {
    pub values: Vec<String>,
}

/// The Loki JSON envelope: records grouped into streams by their
/// serialized label set, in delivery order.
#[derive(Debug, Default, Serialize)]
pub struct QueryResponse {
    pub streams: Vec<StreamResponse>,
}

#[derive(Debug, Serialize)]
pub struct StreamResponse {
    pub labels: String,
    pub entries: Vec<EntryResponse>,
}

#[derive(Debug, Serialize)]
pub struct EntryResponse {
    pub ts: String,
    pub line: String,
}

impl QueryResponse {
    /// Appends a record to the stream carrying its label set, creating the
    /// stream on first sight.
    pub fn push(&mut self, record: LogRecord) {
        let labels = record.labels.to_string();
        let entry = EntryResponse {
            ts: record
                .timestamp
                .to_rfc3339_opts(SecondsFormat::AutoSi, true),
            line: record.line,
        };
        match self.streams.iter_mut().find(|s| s.labels == labels) {
            Some(stream) => stream.entries.push(entry),
            None => self.streams.push(StreamResponse {
                labels,
                entries: vec![entry],
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}
