use std::fmt;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::io::AsyncBufRead;
use thiserror::Error;

use crate::labels::LogLabels;

/// One parsed log line with the labels of the source it came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogRecord {
    /// Timestamp parsed from the line's RFC3339Nano prefix.
    pub timestamp: DateTime<Utc>,
    /// Line body, without the timestamp prefix or trailing newline.
    pub line: String,
    /// Labels of the originating source.
    pub labels: Arc<LogLabels>,
}

/// Raw byte stream of timestamped, newline-delimited log lines.
pub type LogByteStream = Pin<Box<dyn AsyncBufRead + Send>>;

/// Failure to open a source's byte stream.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct StreamOpenError {
    pub message: String,
}

impl StreamOpenError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// True for the expected failure when a previous container has no
    /// retained logs. Readers suppress this case instead of reporting it.
    pub fn is_previous_terminated(&self) -> bool {
        self.message.starts_with("previous terminated container")
    }
}

/// Opens the byte stream behind one log source.
///
/// The Kubernetes implementation wraps a pod log request; tests substitute
/// in-memory streams.
#[async_trait]
pub trait LogStreamFactory: Send + Sync {
    async fn open(&self) -> Result<LogByteStream, StreamOpenError>;
}

/// A single (pod, container, previous?) log stream to read.
pub struct LogSource {
    labels: Arc<LogLabels>,
    previous: bool,
    factory: Box<dyn LogStreamFactory>,
}

impl LogSource {
    pub fn new(labels: Arc<LogLabels>, previous: bool, factory: Box<dyn LogStreamFactory>) -> Self {
        Self {
            labels,
            previous,
            factory,
        }
    }

    pub fn labels(&self) -> &Arc<LogLabels> {
        &self.labels
    }

    pub fn previous(&self) -> bool {
        self.previous
    }

    pub async fn open(&self) -> Result<LogByteStream, StreamOpenError> {
        self.factory.open().await
    }
}

impl fmt::Debug for LogSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSource")
            .field("labels", &self.labels)
            .field("previous", &self.previous)
            .finish_non_exhaustive()
    }
}
