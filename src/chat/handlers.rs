use axum::{extract::State, routing::post, Json, Router};
use tracing::{info, instrument};

use crate::{
    auth::extractors::AuthUser,
    chat::{
        dto::{ChatRequest, ChatResponse, MessagesRequest, MessagesResponse},
        services::run_exchange,
    },
    error::{required, AppJson, AppResult},
    state::AppState,
};

pub fn chat_routes() -> Router<AppState> {
    Router::new()
        .route("/chat", post(chat))
        .route("/get-messages", post(get_messages))
}

#[instrument(skip(state, claims, payload), fields(caller = %claims.user_id))]
pub async fn chat(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    AppJson(payload): AppJson<ChatRequest>,
) -> AppResult<Json<ChatResponse>> {
    let message = required(&payload.message, "Message and user are required")?;
    let user_id = required(&payload.user_id, "Message and user are required")?;

    info!(%user_id, "processing chat request");
    let reply = run_exchange(&state, user_id, message).await?;
    Ok(Json(ChatResponse { reply }))
}

#[instrument(skip(state, claims, payload), fields(caller = %claims.user_id))]
pub async fn get_messages(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    AppJson(payload): AppJson<MessagesRequest>,
) -> AppResult<Json<MessagesResponse>> {
    let user_id = required(&payload.user_id, "User ID is required")?;
    let messages = state.chats.list_for_user(user_id).await?;
    Ok(Json(MessagesResponse { messages }))
}
