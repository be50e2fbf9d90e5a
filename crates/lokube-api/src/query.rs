use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use serde::Deserialize;
use tracing::debug;

use lokube_types::QueryOpts;

use crate::error::ApiError;
use crate::parser::parse_matchers;

/// Default cap on returned lines for one-shot queries.
pub const DEFAULT_LINE_LIMIT: usize = 1000;

/// Cadence of sorted flush windows while tailing.
pub const TAIL_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

/// Raw query string parameters shared by the query and tail endpoints.
/// Timestamps are nanoseconds since the epoch.
#[derive(Debug, Default, Deserialize)]
pub struct RawQueryParams {
    pub query: Option<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub limit: Option<String>,
    pub regexp: Option<String>,
}

/// Validates raw parameters into pipeline options, applying the Loki
/// defaults: last hour, 1000 lines. Tail queries ignore the limit and
/// push the upper time bound a day into the future so the range filter
/// keeps passing live records.
pub fn build_query_opts(params: &RawQueryParams, tail: bool) -> Result<QueryOpts, ApiError> {
    let filter = match params.regexp.as_deref() {
        Some(pattern) => Some(
            Regex::new(pattern).map_err(|_| ApiError::bad_request("invalid regex param"))?,
        ),
        None => None,
    };

    let query = params
        .query
        .as_deref()
        .ok_or_else(|| ApiError::bad_request("missing query parameter"))?;
    let selector = parse_matchers(query).map_err(|err| {
        debug!(error = %err, query, "failed to parse label matchers");
        ApiError::bad_request("malformed query parameter")
    })?;

    let from = match params.start.as_deref() {
        Some(raw) => parse_ns_timestamp(raw)
            .ok_or_else(|| ApiError::bad_request("malformed start parameter"))?,
        None => Utc::now() - TimeDelta::hours(1),
    };
    let mut to = match params.end.as_deref() {
        Some(raw) => parse_ns_timestamp(raw)
            .ok_or_else(|| ApiError::bad_request("malformed end parameter"))?,
        None => Utc::now(),
    };
    if tail {
        to = Utc::now() + TimeDelta::hours(24);
    }

    let limit = match params.limit.as_deref() {
        Some(raw) => match raw.parse::<i64>() {
            Ok(n) if n >= 1 => n as usize,
            _ => return Err(ApiError::bad_request("malformed limit parameter")),
        },
        None => DEFAULT_LINE_LIMIT,
    };

    Ok(QueryOpts {
        selector,
        from,
        to,
        limit,
        filter,
        tail,
        tail_flush_interval: TAIL_FLUSH_INTERVAL,
    })
}

fn parse_ns_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let ns = raw.parse::<i64>().ok()?;
    Some(DateTime::from_timestamp_nanos(ns))
}
