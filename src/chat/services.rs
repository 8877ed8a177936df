//! The chat exchange as a linear pipeline of fallible stages.
//!
//! A failing stage aborts the exchange; earlier side effects are kept.

use std::future::Future;

use tracing::{error, info, instrument, warn, Level};

use crate::{
    chat::repo_types::ChatTurn,
    error::{AppError, AppResult},
    llm::ChatMessage,
    state::AppState,
};

pub const HISTORY_LIMIT: i64 = 10;
pub const BOT_USER_ID: &str = "ai_bot";
pub const CHANNEL_PREFIX: &str = "chat-";
pub const CHANNEL_NAME: &str = "AI Chat";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DirectoryLookup,
    UserLookup,
    LoadHistory,
    Completion,
    PersistTurn,
    Mirror,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::DirectoryLookup => "directory_lookup",
            Stage::UserLookup => "user_lookup",
            Stage::LoadHistory => "load_history",
            Stage::Completion => "completion",
            Stage::PersistTurn => "persist_turn",
            Stage::Mirror => "mirror",
        }
    }
}

/// Client-caused stage failures are warnings, everything else is an error.
fn failure_level(err: &AppError) -> Level {
    if err.status().is_client_error() {
        Level::WARN
    } else {
        Level::ERROR
    }
}

async fn stage<T, F>(stage: Stage, fut: F) -> AppResult<T>
where
    F: Future<Output = AppResult<T>>,
{
    fut.await.inspect_err(|e| {
        if failure_level(e) == Level::WARN {
            warn!(stage = stage.as_str(), error = %e, "chat stage rejected");
        } else {
            error!(stage = stage.as_str(), error = %e, "chat stage failed");
        }
    })
}

pub fn mirror_channel_id(user_id: &str) -> String {
    format!("{CHANNEL_PREFIX}{user_id}")
}

/// Flattens prior turns into user/assistant pairs and appends the new message.
pub fn build_conversation(history: &[ChatTurn], message: &str) -> Vec<ChatMessage> {
    history
        .iter()
        .flat_map(|turn| {
            [
                ChatMessage::user(turn.message.as_str()),
                ChatMessage::assistant(turn.reply.as_str()),
            ]
        })
        .chain(std::iter::once(ChatMessage::user(message)))
        .collect()
}

async fn ensure_in_directory(state: &AppState, user_id: &str) -> AppResult<()> {
    if state.messaging.user_exists(user_id).await? {
        Ok(())
    } else {
        Err(AppError::NotFound("User not found. Please register first".into()))
    }
}

async fn ensure_registered(state: &AppState, user_id: &str) -> AppResult<()> {
    if state.users.exists(user_id).await? {
        Ok(())
    } else {
        Err(AppError::NotFound(
            "User not found in database, please register".into(),
        ))
    }
}

async fn load_history(state: &AppState, user_id: &str) -> AppResult<Vec<ChatTurn>> {
    Ok(state.chats.recent_for_user(user_id, HISTORY_LIMIT).await?)
}

async fn complete(state: &AppState, conversation: &[ChatMessage]) -> AppResult<String> {
    state.llm.complete(conversation).await.map_err(|e| {
        AppError::Upstream(format!("Failed to get response from AI service: {e}"))
    })
}

async fn persist_turn(
    state: &AppState,
    user_id: &str,
    message: &str,
    reply: &str,
) -> AppResult<ChatTurn> {
    Ok(state.chats.insert(user_id, message, reply).await?)
}

async fn mirror_reply(state: &AppState, user_id: &str, reply: &str) -> AppResult<()> {
    let channel_id = mirror_channel_id(user_id);
    state
        .messaging
        .ensure_channel(&channel_id, CHANNEL_NAME, BOT_USER_ID)
        .await?;
    state
        .messaging
        .send_message(&channel_id, reply, BOT_USER_ID)
        .await?;
    Ok(())
}

/// Runs one exchange for `user_id` and returns the model's reply.
#[instrument(skip(state, message))]
pub async fn run_exchange(state: &AppState, user_id: &str, message: &str) -> AppResult<String> {
    stage(Stage::DirectoryLookup, ensure_in_directory(state, user_id)).await?;
    stage(Stage::UserLookup, ensure_registered(state, user_id)).await?;
    let history = stage(Stage::LoadHistory, load_history(state, user_id)).await?;

    let conversation = build_conversation(&history, message);

    let reply = stage(Stage::Completion, complete(state, &conversation)).await?;
    let turn = stage(Stage::PersistTurn, persist_turn(state, user_id, message, &reply)).await?;
    stage(Stage::Mirror, mirror_reply(state, user_id, &reply)).await?;

    info!(turn_id = turn.id, history = history.len(), "chat exchange completed");
    Ok(reply)
}
