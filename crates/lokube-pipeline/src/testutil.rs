//! Synthetic log sources for pipeline tests.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::io::{AsyncRead, BufReader, Cursor};
use tokio::sync::mpsc;

use lokube_types::{
    LogByteStream, LogLabels, LogRecord, LogSource, LogStreamFactory, QueryOpts, Selector,
    StreamOpenError,
};

pub(crate) fn ts(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw).unwrap().with_timezone(&Utc)
}

pub(crate) fn labels(pairs: &[(&str, &str)]) -> Arc<LogLabels> {
    let mut labels = LogLabels::new();
    for (key, value) in pairs {
        labels.insert(*key, *value);
    }
    Arc::new(labels)
}

pub(crate) fn record(raw_ts: &str, line: &str) -> LogRecord {
    LogRecord {
        timestamp: ts(raw_ts),
        line: line.to_string(),
        labels: labels(&[]),
    }
}

/// One-shot query options with a wide-open time range.
pub(crate) fn query_opts() -> QueryOpts {
    QueryOpts {
        selector: Selector::default(),
        from: ts("1970-01-01T00:00:00Z"),
        to: ts("9999-01-01T00:00:00Z"),
        limit: 1000,
        filter: None,
        tail: false,
        tail_flush_interval: Duration::from_secs(1),
    }
}

pub(crate) async fn drain(mut rx: mpsc::Receiver<LogRecord>) -> Vec<LogRecord> {
    let mut records = Vec::new();
    while let Some(record) = rx.recv().await {
        records.push(record);
    }
    records
}

/// Source whose stream replays a fixed byte script and then ends.
struct ScriptedFactory {
    bytes: Vec<u8>,
}

#[async_trait]
impl LogStreamFactory for ScriptedFactory {
    async fn open(&self) -> Result<LogByteStream, StreamOpenError> {
        Ok(Box::pin(Cursor::new(self.bytes.clone())))
    }
}

pub(crate) fn scripted_source(label_pairs: &[(&str, &str)], script: &str) -> LogSource {
    LogSource::new(
        labels(label_pairs),
        false,
        Box::new(ScriptedFactory {
            bytes: script.as_bytes().to_vec(),
        }),
    )
}

/// Source that fails to open.
struct FailingFactory {
    message: String,
}

#[async_trait]
impl LogStreamFactory for FailingFactory {
    async fn open(&self) -> Result<LogByteStream, StreamOpenError> {
        Err(StreamOpenError::new(self.message.clone()))
    }
}

pub(crate) fn failing_source(label_pairs: &[(&str, &str)], message: &str) -> LogSource {
    LogSource::new(
        labels(label_pairs),
        false,
        Box::new(FailingFactory {
            message: message.to_string(),
        }),
    )
}

/// Reader that serves its script and then stays pending forever, like a
/// followed container that has gone quiet.
struct StallingReader {
    data: Vec<u8>,
    pos: usize,
}

impl AsyncRead for StallingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        if self.pos >= self.data.len() {
            // Never wakes again; the pipeline must tear it down by
            // cancellation, not by waiting for EOF.
            return Poll::Pending;
        }
        let n = (self.data.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Poll::Ready(Ok(n))
    }
}

struct StallingFactory {
    bytes: Vec<u8>,
}

#[async_trait]
impl LogStreamFactory for StallingFactory {
    async fn open(&self) -> Result<LogByteStream, StreamOpenError> {
        Ok(Box::pin(BufReader::new(StallingReader {
            data: self.bytes.clone(),
            pos: 0,
        })))
    }
}

pub(crate) fn stalling_source(label_pairs: &[(&str, &str)], script: &str) -> LogSource {
    LogSource::new(
        labels(label_pairs),
        false,
        Box::new(StallingFactory {
            bytes: script.as_bytes().to_vec(),
        }),
    )
}

/// Reader that serves its script and then fails mid-stream.
struct FailingReader {
    data: Vec<u8>,
    pos: usize,
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut [u8],
    ) -> Poll<io::Result<usize>> {
        if self.pos >= self.data.len() {
            return Poll::Ready(Err(io::Error::other("stream reset")));
        }
        let n = (self.data.len() - self.pos).min(buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        Poll::Ready(Ok(n))
    }
}

struct FailingReadFactory {
    bytes: Vec<u8>,
}

#[async_trait]
impl LogStreamFactory for FailingReadFactory {
    async fn open(&self) -> Result<LogByteStream, StreamOpenError> {
        Ok(Box::pin(BufReader::new(FailingReader {
            data: self.bytes.clone(),
            pos: 0,
        })))
    }
}

pub(crate) fn failing_read_source(label_pairs: &[(&str, &str)], script: &str) -> LogSource {
    LogSource::new(
        labels(label_pairs),
        false,
        Box::new(FailingReadFactory {
            bytes: script.as_bytes().to_vec(),
        }),
    )
}
