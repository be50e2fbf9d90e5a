use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use lokube_types::LogRecord;

/// Forwards at most `limit` records, then cancels the pipeline so the
/// upstream stages tear down instead of producing output nobody reads.
/// One-shot queries only; tail queries are paced by the sorter instead.
pub fn limit_lines(
    cancel: CancellationToken,
    limit: usize,
    mut input: mpsc::Receiver<LogRecord>,
) -> mpsc::Receiver<LogRecord> {
    let (tx, rx) = mpsc::channel(1);

    tokio::spawn(async move {
        let mut count = 0;
        while count < limit {
            tokio::select! {
                _ = cancel.cancelled() => return,
                received = input.recv() => {
                    let Some(record) = received else {
                        debug!("finished line limiting");
                        return;
                    };
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        sent = tx.send(record) => {
                            if sent.is_err() {
                                return;
                            }
                            count += 1;
                        }
                    }
                }
            }
        }
        debug!(limit, "line limit reached");
        cancel.cancel();
    });

    rx
}
