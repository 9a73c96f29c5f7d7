//! Read-only HTTP endpoint republishing the stored offers.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use tracing::{error, info};

use crate::models::{ErrorResponse, OffersResponse};
use crate::store;

/// Shared cache lifetime of 15 minutes, serving stale for up to a day while
/// revalidating.
pub const CACHE_CONTROL: &str = "s-maxage=900, stale-while-revalidate=86400";
pub const CONTENT_TYPE: &str = "application/json; charset=utf-8";

#[derive(Clone)]
pub struct ApiState {
    pub data_path: Arc<PathBuf>,
}

impl ApiState {
    pub fn new(data_path: impl Into<PathBuf>) -> Self {
        Self {
            data_path: Arc::new(data_path.into()),
        }
    }
}

pub fn build_app(state: ApiState) -> Router {
    Router::new()
        .route("/api/offers", get(list_offers))
        .route("/offers", get(list_offers))
        .with_state(state)
}

/// Reads the data file on every request; `count` is recomputed from the
/// offers found, never taken from the file.
async fn list_offers(State(state): State<ApiState>) -> Response {
    match store::load(&state.data_path).await {
        Ok(stored) => {
            let body = OffersResponse::from(stored);
            let mut response = (StatusCode::OK, Json(body)).into_response();
            let headers = response.headers_mut();
            headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(CONTENT_TYPE));
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(CACHE_CONTROL));
            response
        }
        Err(e) => {
            error!("Failed to read offers: {e}");
            let body = ErrorResponse {
                ok: false,
                error: e.to_string(),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

/// Serves the API until Ctrl-C or SIGTERM.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn serve(bind_addr: SocketAddr, state: ApiState) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(
        "Serving offers from {} on http://{}",
        state.data_path.display(),
        listener.local_addr()?
    );

    axum::serve(listener, build_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Received shutdown signal, stopping API");
}
