pub mod error;

use std::time::Duration;

use axum::{Json, Router, extract::State, routing::get};
use co2_core::Reading;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::store::ReadingStore;
use error::ApiError;

pub fn router(store: ReadingStore) -> Router {
    Router::new()
        .route("/data", get(latest_reading))
        .route("/health", get(health_handler))
        .with_state(store)
}

/// GET /data
async fn latest_reading(State(store): State<ReadingStore>) -> Result<Json<Reading>, ApiError> {
    store
        .latest()
        .map(|reading| Json(Reading::clone(&reading)))
        .ok_or_else(|| ApiError::Unavailable("no data".to_owned()))
}

async fn health_handler() -> &'static str {
    "OK"
}

/// Serve the API on `listener` until `cancel` fires.
///
/// After cancellation no new connections are accepted, and requests already
/// in flight get `grace` to finish before the server is dropped.
pub async fn serve(
    listener: TcpListener,
    store: ReadingStore,
    cancel: CancellationToken,
    grace: Duration,
) -> std::io::Result<()> {
    let shutdown = cancel.clone();
    let server = axum::serve(listener, router(store))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .into_future();
    tokio::pin!(server);

    tokio::select! {
        result = &mut server => return result,
        _ = cancel.cancelled() => {
            info!("Shutting down HTTP server...");
        }
    }

    match tokio::time::timeout(grace, server).await {
        Ok(result) => {
            info!("HTTP server stopped");
            result
        }
        Err(_) => {
            warn!(?grace, "Requests still in flight after grace period, closing");
            Ok(())
        }
    }
}
