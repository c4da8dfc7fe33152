use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Router, middleware};
use shared::dialogue::DialogueEngine;
use shared::repos::Store;

mod authn;
mod chat;
mod errors;
mod health;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub engine: Arc<DialogueEngine>,
    pub jwt_secret: String,
}

#[derive(Clone, Copy)]
pub(super) struct AuthUser {
    pub(super) user_id: i64,
}

pub fn build_router(app_state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health::health))
        .route("/api/ready", get(health::ready))
        .with_state(app_state.clone());

    let auth_layer_state = app_state.clone();

    let protected_routes = Router::new()
        .route("/api/chat", post(chat::chat))
        .layer(middleware::from_fn_with_state(
            auth_layer_state,
            authn::auth_middleware,
        ))
        .with_state(app_state);

    public_routes.merge(protected_routes)
}
