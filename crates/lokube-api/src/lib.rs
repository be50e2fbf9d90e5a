//! Loki-compatible HTTP API for lokube
//!
//! Serves label listings, one-shot log queries, and WebSocket tails. The
//! handlers translate query parameters into pipeline options, resolve log
//! sources from the pod cache, and stream the pipeline's output into the
//! Loki JSON envelope.

mod error;
mod handlers;
mod parser;
mod query;
mod response;
mod routes;
mod tail;

pub use error::{ApiError, ApiResult};
pub use handlers::ApiState;
pub use parser::{MatcherParseError, parse_matchers};
pub use query::{RawQueryParams, build_query_opts};
pub use response::{LabelsResponse, QueryResponse};
pub use routes::create_router;
