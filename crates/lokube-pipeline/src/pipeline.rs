use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use lokube_types::{LogRecord, LogSource, PipelineError, QueryOpts};

use crate::filter::{filter_regex, filter_time_range};
use crate::limit::limit_lines;
use crate::merge::{merge, merge_errors};
use crate::reader::fetch;
use crate::sort::sort_windows;

/// Wires the full pipeline for the given sources and returns the terminal
/// record and error channels.
///
/// All stages run under a child of `parent`: cancelling the parent tears
/// the pipeline down, and in one-shot mode the line limiter cancels the
/// child once the limit is reached. Both returned channels close when the
/// pipeline is quiescent; teardown never waits for the error channel to be
/// drained.
pub fn fetch_container_logs(
    parent: &CancellationToken,
    sources: Vec<LogSource>,
    opts: &QueryOpts,
) -> (mpsc::Receiver<LogRecord>, mpsc::Receiver<PipelineError>) {
    let cancel = parent.child_token();
    debug!(sources = sources.len(), tail = opts.tail, "starting log pipeline");

    let mut record_channels = Vec::with_capacity(sources.len());
    let mut error_channels = Vec::with_capacity(sources.len());
    for source in sources {
        let (records, errors) = fetch(source, cancel.clone());
        record_channels.push(records);
        error_channels.push(errors);
    }

    let merged = merge(cancel.clone(), record_channels);
    let sorted = sort_windows(cancel.clone(), opts, merged);
    let in_range = filter_time_range(cancel.clone(), opts.from, opts.to, sorted);
    let matched = filter_regex(cancel.clone(), opts.filter.clone(), in_range);

    let records = if opts.tail {
        // Tail output is paced by the sorter's flush cadence; no limit.
        matched
    } else {
        limit_lines(cancel, opts.limit, matched)
    };
    let errors = merge_errors(error_channels);

    (records, errors)
}
