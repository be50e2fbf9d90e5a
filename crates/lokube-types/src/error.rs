use thiserror::Error;

/// Errors surfaced by the log pipeline.
///
/// Source-scoped variants are delivered on the pipeline's error channel
/// and never abort the query; resolution failure is fatal to the query.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to list pods: {0}")]
    Resolve(String),

    #[error("failed to open log stream for {labels}: {message}")]
    SourceOpen { labels: String, message: String },

    #[error("failed reading log stream for {labels}: {message}")]
    StreamRead { labels: String, message: String },
}
