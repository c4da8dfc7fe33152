use axum::Json;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use shared::models::OkResponse;
use tracing::warn;

use super::AppState;
use super::errors::service_unavailable_response;

/// Liveness only; touches no dependency.
pub(super) async fn health() -> Json<OkResponse> {
    Json(OkResponse { ok: true })
}

/// The chat pipeline cannot answer without its catalog and history
/// store, so readiness is a database ping.
pub(super) async fn ready(State(state): State<AppState>) -> Response {
    if let Err(err) = state.store.ping().await {
        warn!("readiness check failed: {err}");
        return service_unavailable_response("db_unavailable", "Database not ready");
    }

    Json(OkResponse { ok: true }).into_response()
}
