use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use kube::Client;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use lokube_k8s::{PodCacheSet, resolve_sources};
use lokube_pipeline::fetch_container_logs;
use lokube_types::PipelineError;

use crate::error::{ApiError, ApiResult};
use crate::query::{RawQueryParams, build_query_opts};
use crate::response::{LabelsResponse, QueryResponse};

/// Labels injected by the resolver, always present on every source.
const SYNTHETIC_LABELS: [&str; 7] = [
    "namespace",
    "namespace_name",
    "instance",
    "pod",
    "pod_name",
    "container",
    "container_name",
];

/// Shared state of the API handlers.
pub struct ApiState {
    pub client: Client,
    pub cache: Arc<PodCacheSet>,
}

/// Handle GET /api/prom/label - all known label names.
pub async fn get_labels(State(state): State<Arc<ApiState>>) -> Json<LabelsResponse> {
    let mut values: Vec<String> = SYNTHETIC_LABELS.iter().map(|l| l.to_string()).collect();
    values.extend(state.cache.label_names());
    Json(LabelsResponse { values })
}

/// Handle GET /api/prom/label/{label}/values - known values for a label.
/// The synthetic names map onto cache listings; `instance`, `pod` and
/// `pod_name` all enumerate pod names.
pub async fn get_label_values(
    State(state): State<Arc<ApiState>>,
    Path(label): Path<String>,
) -> Json<LabelsResponse> {
    let values = match label.as_str() {
        "namespace" | "namespace_name" => state.cache.namespaces(),
        "instance" | "pod" | "pod_name" => state.cache.pod_names(),
        "container" | "container_name" => state.cache.container_names(),
        other => state.cache.label_values(other),
    };
    Json(LabelsResponse { values })
}

/// Handle GET /api/prom/query - one-shot log query.
pub async fn query(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<RawQueryParams>,
) -> ApiResult<Json<QueryResponse>> {
    let opts = build_query_opts(&params, false)?;
    let sources = resolve_sources(&state.client, &state.cache, &opts)
        .map_err(|err| ApiError::Resolve(err.to_string()))?;
    debug!(sources = sources.len(), "starting one-shot log query");

    // Dropping the guard on any exit path (including the client going
    // away) cancels the whole pipeline.
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let (mut records, errors) = fetch_container_logs(&cancel, sources, &opts);
    tokio::spawn(log_pipeline_errors(errors));

    let mut response = QueryResponse::default();
    while let Some(record) = records.recv().await {
        response.push(record);
    }
    debug!("writing query response");
    Ok(Json(response))
}

/// Per-source failures are reported to the operator, not the client.
pub(crate) async fn log_pipeline_errors(mut errors: mpsc::Receiver<PipelineError>) {
    while let Some(err) = errors.recv().await {
        warn!(error = %err, "log source failed");
    }
}
