use axum::extract::{Extension, State};
use axum::response::{IntoResponse, Response};
use axum::{Json, http::StatusCode};
use chrono::Utc;
use shared::models::{ChatMessage, ChatRequest, ChatResponse};
use tracing::{info, warn};
use uuid::Uuid;

use super::errors::bad_request_response;
use super::{AppState, AuthUser};

/// One conversation turn: replay the user's stored history, append the
/// new message, run the dialogue engine, persist the exchange. History
/// and persistence failures degrade with a warning; the turn itself
/// always answers.
pub(super) async fn chat(
    State(state): State<AppState>,
    Extension(auth_user): Extension<AuthUser>,
    Json(request): Json<ChatRequest>,
) -> Response {
    if request.message.trim().is_empty() {
        return bad_request_response("empty_message", "Message must not be empty");
    }

    let request_id = Uuid::new_v4();
    let user_id = auth_user.user_id;

    let mut messages = match state.store.load_history(user_id).await {
        Ok(messages) => messages,
        Err(err) => {
            warn!(%request_id, "history load failed, starting fresh: {err}");
            Vec::new()
        }
    };
    messages.push(ChatMessage::human(&request.message));

    let turn = state.engine.run_turn(messages).await;

    if let Err(err) = state
        .store
        .persist_turn(user_id, &request.message, &turn.final_response)
        .await
    {
        warn!(%request_id, "turn persistence failed: {err}");
    }

    info!(%request_id, user_id, "chat turn served");

    (
        StatusCode::OK,
        Json(ChatResponse {
            user_id,
            response: turn.final_response,
            session_id: request.session_id,
            timestamp: Utc::now(),
        }),
    )
        .into_response()
}
