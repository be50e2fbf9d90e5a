use std::time::Instant;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use lokube_types::{LogRecord, QueryOpts};

/// Buffers records and emits them sorted by timestamp, newest first.
///
/// In tail mode the buffer is flushed whenever a record arrives and the
/// configured interval has passed since the previous flush; the first
/// window flushes promptly. The remaining buffer is always flushed when
/// the input closes. Ordering within a window is descending by timestamp
/// with ties kept in arrival order; no ordering holds across windows.
pub fn sort_windows(
    cancel: CancellationToken,
    opts: &QueryOpts,
    mut input: mpsc::Receiver<LogRecord>,
) -> mpsc::Receiver<LogRecord> {
    let (tx, rx) = mpsc::channel(1);
    let tail = opts.tail;
    let flush_interval = opts.tail_flush_interval;

    tokio::spawn(async move {
        let mut buffer: Vec<LogRecord> = Vec::new();
        // None marks "never flushed" so the first tail window goes out
        // immediately instead of waiting a full interval.
        let mut last_flush: Option<Instant> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return,
                received = input.recv() => {
                    let Some(record) = received else { break };
                    buffer.push(record);
                    let due = last_flush.is_none_or(|at| at.elapsed() > flush_interval);
                    if tail && due {
                        if !flush(&cancel, &tx, &mut buffer).await {
                            return;
                        }
                        last_flush = Some(Instant::now());
                    }
                }
            }
        }

        if !buffer.is_empty() {
            flush(&cancel, &tx, &mut buffer).await;
        }
        debug!("finished sorting");
    });

    rx
}

/// Sorts the buffer newest-first and sends it downstream. Returns false if
/// the flush was cut short by cancellation or a closed output.
async fn flush(
    cancel: &CancellationToken,
    tx: &mpsc::Sender<LogRecord>,
    buffer: &mut Vec<LogRecord>,
) -> bool {
    // Stable sort: equal timestamps keep their arrival order.
    buffer.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    for record in buffer.drain(..) {
        tokio::select! {
            _ = cancel.cancelled() => return false,
            sent = tx.send(record) => {
                if sent.is_err() {
                    return false;
                }
            }
        }
    }
    true
}
