use std::sync::Arc;
use std::time::Instant;

use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade, close_code};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use lokube_k8s::resolve_sources;
use lokube_pipeline::fetch_container_logs;
use lokube_types::{LogSource, QueryOpts};

use crate::error::ApiError;
use crate::handlers::{ApiState, log_pipeline_errors};
use crate::query::{RawQueryParams, build_query_opts};
use crate::response::QueryResponse;

/// Handle GET /api/prom/tail - upgrade to a WebSocket and push one JSON
/// envelope per flush window until either side goes away.
pub async fn tail(
    State(state): State<Arc<ApiState>>,
    Query(params): Query<RawQueryParams>,
    ws: WebSocketUpgrade,
) -> Response {
    let opts = match build_query_opts(&params, true) {
        Ok(opts) => opts,
        Err(err) => return err.into_response(),
    };
    let sources = match resolve_sources(&state.client, &state.cache, &opts) {
        Ok(sources) => sources,
        Err(err) => return ApiError::Resolve(err.to_string()).into_response(),
    };
    debug!(sources = sources.len(), "starting tail query");

    ws.on_upgrade(move |socket| run_tail(socket, sources, opts))
}

async fn run_tail(mut socket: WebSocket, sources: Vec<LogSource>, opts: QueryOpts) {
    let cancel = CancellationToken::new();
    let _guard = cancel.clone().drop_guard();
    let (mut records, errors) = fetch_container_logs(&cancel, sources, &opts);
    tokio::spawn(log_pipeline_errors(errors));

    let mut batch = QueryResponse::default();
    // None makes the first batch go out with the first record.
    let mut last_write: Option<Instant> = None;

    loop {
        tokio::select! {
            received = records.recv() => {
                let Some(record) = received else {
                    debug!("tail pipeline ended");
                    return;
                };
                batch.push(record);
                let due = last_write.is_none_or(|at| at.elapsed() > opts.tail_flush_interval);
                if !due {
                    continue;
                }
                let payload = match serde_json::to_string(&batch) {
                    Ok(payload) => payload,
                    Err(err) => {
                        warn!(error = %err, "failed to serialize tail batch");
                        continue;
                    }
                };
                if socket.send(Message::Text(payload.into())).await.is_err() {
                    warn!("failed to write tail batch to websocket");
                    let _ = socket
                        .send(Message::Close(Some(CloseFrame {
                            code: close_code::ERROR,
                            reason: "log delivery failed".into(),
                        })))
                        .await;
                    return;
                }
                last_write = Some(Instant::now());
                batch = QueryResponse::default();
            }

            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | None => {
                    debug!("tail client disconnected");
                    return;
                }
                Some(Ok(_)) => {}
                Some(Err(err)) => {
                    debug!(error = %err, "websocket receive error");
                    return;
                }
            },
        }
    }
}
