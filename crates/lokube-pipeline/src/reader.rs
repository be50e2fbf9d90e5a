use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::{AsyncBufReadExt, TryStreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use lokube_types::{LogLabels, LogRecord, LogSource, PipelineError};

/// Starts the reader task for one source and returns its record and error
/// channels. The error channel carries at most one error.
pub fn fetch(
    source: LogSource,
    cancel: CancellationToken,
) -> (mpsc::Receiver<LogRecord>, mpsc::Receiver<PipelineError>) {
    let (tx, rx) = mpsc::channel(1);
    let (err_tx, err_rx) = mpsc::channel(1);
    tokio::spawn(async move {
        run_reader(source, cancel, tx, err_tx).await;
    });
    (rx, err_rx)
}

async fn run_reader(
    source: LogSource,
    cancel: CancellationToken,
    tx: mpsc::Sender<LogRecord>,
    err_tx: mpsc::Sender<PipelineError>,
) {
    debug!(labels = %source.labels(), "opening log stream");

    let stream = tokio::select! {
        _ = cancel.cancelled() => return,
        opened = source.open() => match opened {
            Ok(stream) => stream,
            Err(err) => {
                // A previous container without retained logs is expected
                // and stays silent; everything else is reported once.
                if !err.is_previous_terminated() {
                    let _ = err_tx.try_send(PipelineError::SourceOpen {
                        labels: source.labels().to_string(),
                        message: err.message,
                    });
                }
                return;
            }
        },
    };

    let mut lines = stream.lines();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            next = lines.try_next() => match next {
                Ok(Some(line)) => {
                    let Some(record) = parse_line(&line, source.labels()) else {
                        continue;
                    };
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        sent = tx.send(record) => {
                            if sent.is_err() {
                                return;
                            }
                        }
                    }
                }
                Ok(None) => {
                    debug!(labels = %source.labels(), "log stream ended");
                    return;
                }
                Err(err) => {
                    let _ = err_tx.try_send(PipelineError::StreamRead {
                        labels: source.labels().to_string(),
                        message: err.to_string(),
                    });
                    return;
                }
            }
        }
    }
}

/// Parses one `<RFC3339Nano timestamp> <body>` line. Lines without the
/// timestamp prefix are dropped.
fn parse_line(line: &str, labels: &Arc<LogLabels>) -> Option<LogRecord> {
    let Some((raw_ts, body)) = line.split_once(' ') else {
        debug!("dropping log line without a timestamp prefix");
        return None;
    };
    let Ok(timestamp) = DateTime::parse_from_rfc3339(raw_ts) else {
        debug!("dropping log line with an unparseable timestamp");
        return None;
    };
    Some(LogRecord {
        timestamp: timestamp.with_timezone(&Utc),
        line: body.to_string(),
        labels: Arc::clone(labels),
    })
}
