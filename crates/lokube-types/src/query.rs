use std::time::Duration;

use chrono::{DateTime, Utc};
use regex::Regex;

use crate::matcher::Selector;

/// Options of one log query, built by the HTTP layer and passed read-only
/// through the pipeline.
#[derive(Clone, Debug)]
pub struct QueryOpts {
    /// Label matchers selecting the sources to read.
    pub selector: Selector,
    /// Lower time bound, inclusive.
    pub from: DateTime<Utc>,
    /// Upper time bound, inclusive. Tail queries use a far-future bound.
    pub to: DateTime<Utc>,
    /// Hard cap on delivered records. Ignored in tail mode.
    pub limit: usize,
    /// Optional unanchored filter applied to line bodies.
    pub filter: Option<Regex>,
    /// Streaming query with periodic flushes instead of a line limit.
    pub tail: bool,
    /// Minimum wall-clock gap between sorted flushes in tail mode.
    pub tail_flush_interval: Duration,
}
