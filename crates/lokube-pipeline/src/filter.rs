use chrono::{DateTime, Utc};
use regex::Regex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use lokube_types::LogRecord;

/// Drops records outside `[from, to]`. Both bounds are inclusive.
pub fn filter_time_range(
    cancel: CancellationToken,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    mut input: mpsc::Receiver<LogRecord>,
) -> mpsc::Receiver<LogRecord> {
    let (tx, rx) = mpsc::channel(1);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                received = input.recv() => {
                    let Some(record) = received else { break };
                    if record.timestamp < from || to < record.timestamp {
                        continue;
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        sent = tx.send(record) => {
                            if sent.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        }
        debug!("finished time range filtering");
    });

    rx
}

/// Forwards only records whose body matches the pattern. Without a pattern
/// the stage is the identity and the input is returned untouched.
pub fn filter_regex(
    cancel: CancellationToken,
    filter: Option<Regex>,
    mut input: mpsc::Receiver<LogRecord>,
) -> mpsc::Receiver<LogRecord> {
    let Some(filter) = filter else {
        return input;
    };
    let (tx, rx) = mpsc::channel(1);

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                received = input.recv() => {
                    let Some(record) = received else { break };
                    if !filter.is_match(&record.line) {
                        continue;
                    }
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        sent = tx.send(record) => {
                            if sent.is_err() {
                                return;
                            }
                        }
                    }
                }
            }
        }
        debug!("finished regex filtering");
    });

    rx
}
