use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Query, Request, State};
use axum::http::{StatusCode, Uri};
use axum::http::header::CONTENT_TYPE;
use axum::response::{IntoResponse, Response};

use super::AppState;

// ═══════════════════════════════════════════════════════════════
//  POST {prefix}/{*path}?sharedKey=
// ═══════════════════════════════════════════════════════════════

const SHARED_KEY_PARAM: &str = "sharedKey";

/// First `sharedKey` value of the query string. Unparseable query strings
/// count as a missing key.
fn shared_key(uri: &Uri) -> Option<String> {
    let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(uri).ok()?;
    pairs
        .into_iter()
        .find(|(name, _)| name == SHARED_KEY_PARAM)
        .map(|(_, value)| value)
}

/// Publish one changefeed file. The status is only sent once the whole body
/// has been read and every line has an outcome.
pub(crate) async fn handle_ingest(State(state): State<AppState>, request: Request) -> StatusCode {
    let _in_flight = state.bridge.drain().enter();
    let uri = request.uri().clone();

    if state.keys.is_enabled() && !state.keys.accepts(shared_key(&uri).as_deref()) {
        let remote = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        tracing::warn!(%remote, "invalid sharedKey parameter");
        return StatusCode::UNAUTHORIZED;
    }

    let path = uri.path();
    let Some(route) = state.bridge.route(path) else {
        tracing::warn!(%path, "unexpected filename");
        return StatusCode::NOT_FOUND;
    };

    let body = request.into_body().into_data_stream();
    match state.bridge.publisher().publish(&route, path, body).await {
        Ok(summary) => {
            tracing::info!(
                topic = %route.topic,
                table = %route.table,
                records = summary.records,
                "published file"
            );
            StatusCode::CREATED
        }
        Err(e) => {
            tracing::error!(url = %uri, error = %e, "publish failed");
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

// ═══════════════════════════════════════════════════════════════
//  GET /healthz
// ═══════════════════════════════════════════════════════════════

pub(crate) async fn handle_healthz(State(state): State<AppState>) -> Response {
    if state.shutdown.is_cancelled() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }
    ([(CONTENT_TYPE, "text/plain")], "OK").into_response()
}
