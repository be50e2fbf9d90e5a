//! Shared types for lokube
//!
//! This crate contains the data model used across the lokube crates:
//! label sets, log records, log sources, label matchers, and query options.

mod error;
mod labels;
mod matcher;
mod query;
mod record;

pub use error::PipelineError;
pub use labels::{LogLabels, normalize_label_key};
pub use matcher::{LabelMatcher, MatchOp, Selector};
pub use query::QueryOpts;
pub use record::{LogByteStream, LogRecord, LogSource, LogStreamFactory, StreamOpenError};
