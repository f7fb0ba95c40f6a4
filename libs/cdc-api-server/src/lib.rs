mod auth;
mod http;


use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tokio::net::TcpListener;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use cdc_engine::Bridge;

pub use auth::SharedKeys;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("bind {addr}: {source}")]
    Bind { addr: String, source: std::io::Error },

    #[error("serve: {0}")]
    Serve(#[from] std::io::Error),

    #[error("server task: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) bridge: Arc<Bridge>,
    pub(crate) keys: Arc<SharedKeys>,
    pub(crate) shutdown: CancellationToken,
}

/// Webhook endpoint under the configured prefix plus `/healthz`.
pub fn router(bridge: Arc<Bridge>, shutdown: CancellationToken) -> Router {
    let ingest_path = format!("{}/{{*path}}", bridge.config().mount_prefix());
    let state = AppState {
        keys: Arc::new(SharedKeys::new(bridge.config().shared_keys.iter().cloned())),
        bridge,
        shutdown,
    };

    Router::new()
        .route("/healthz", get(http::handle_healthz))
        .route(&ingest_path, post(http::handle_ingest))
        .with_state(state)
}

/// Bind the configured address and serve until `shutdown` is cancelled and
/// in-flight requests have drained (or the grace period ran out).
pub async fn run(bridge: Arc<Bridge>, shutdown: CancellationToken) -> Result<(), ServerError> {
    let addr = bridge.config().bind_addr.clone();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    serve(listener, bridge, shutdown).await
}

/// Serve on an already bound listener. See [`run`].
pub async fn serve(
    listener: TcpListener,
    bridge: Arc<Bridge>,
    shutdown: CancellationToken,
) -> Result<(), ServerError> {
    let local_addr = listener.local_addr()?;
    let app = router(bridge.clone(), shutdown.clone())
        .into_make_service_with_connect_info::<SocketAddr>();

    let serve_token = shutdown.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(serve_token.cancelled_owned())
            .await
    });
    tracing::info!(addr = %local_addr, "listening");

    tokio::select! {
        result = &mut server => {
            // Listener died without a shutdown request.
            result??;
            return Ok(());
        }
        _ = shutdown.cancelled() => {}
    }

    // The listener no longer accepts connections from here on.
    let drain = bridge.drain();
    drain.close();
    let grace = bridge.config().grace_period();
    let deadline = Instant::now() + grace;
    tracing::info!(in_flight = drain.in_flight(), grace_period = ?grace, "draining in-flight requests");

    tokio::select! {
        _ = drain.drained() => tracing::info!("all in-flight requests finished"),
        _ = tokio::time::sleep_until(deadline) => {
            tracing::warn!(grace_period = ?grace, in_flight = drain.in_flight(), "grace period expired");
        }
    }

    // Let finished requests flush their responses, within the same deadline.
    let outcome = tokio::select! {
        result = &mut server => Some(result),
        _ = tokio::time::sleep_until(deadline) => None,
    };
    match outcome {
        Some(Ok(Ok(()))) => {}
        Some(Ok(Err(e))) => tracing::error!(error = %e, "listener shutdown error"),
        Some(Err(e)) => tracing::error!(error = %e, "server task failed"),
        None => {
            tracing::warn!("aborting open connections");
            server.abort();
        }
    }

    tracing::info!("server stopped");
    Ok(())
}
