//! Log streaming pipeline for lokube
//!
//! Stages are independent tasks connected by bounded channels: per-source
//! readers feed a fan-in merger, a windowed sorter, time-range and regex
//! filters, and either a line limiter (one-shot queries) or a direct
//! passthrough (tail queries). A single cancellation token spans the
//! pipeline; every channel operation is multiplexed with it.

mod filter;
mod limit;
mod merge;
mod pipeline;
mod reader;
mod sort;

#[cfg(test)]
mod testutil;

pub use filter::{filter_regex, filter_time_range};
pub use limit::limit_lines;
pub use merge::{merge, merge_errors};
pub use pipeline::fetch_container_logs;
pub use reader::fetch;
pub use sort::sort_windows;
