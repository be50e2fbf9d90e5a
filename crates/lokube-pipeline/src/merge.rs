use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use lokube_types::{LogRecord, PipelineError};

/// Multiplexes all reader outputs onto one channel. The output closes once
/// every input has closed or cancellation fires; no ordering is preserved
/// across inputs.
pub fn merge(
    cancel: CancellationToken,
    inputs: Vec<mpsc::Receiver<LogRecord>>,
) -> mpsc::Receiver<LogRecord> {
    let (tx, rx) = mpsc::channel(inputs.len().max(1));

    for mut input in inputs {
        let tx = tx.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => return,
                    received = input.recv() => {
                        let Some(record) = received else { return };
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
        });
    }

    // The forwarding tasks hold the only sender clones; the channel closes
    // when the last of them exits.
    rx
}

/// Fans every reader's one-shot error channel into a single receiver. The
/// output buffer fits one error per source, so teardown never blocks on an
/// undrained error channel.
pub fn merge_errors(inputs: Vec<mpsc::Receiver<PipelineError>>) -> mpsc::Receiver<PipelineError> {
    let (tx, rx) = mpsc::channel(inputs.len().max(1));

    for mut input in inputs {
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Some(err) = input.recv().await {
                if tx.send(err).await.is_err() {
                    return;
                }
            }
            debug!("source error channel drained");
        });
    }

    rx
}
