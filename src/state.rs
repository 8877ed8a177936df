use std::sync::Arc;

use crate::{
    auth::{jwt::JwtKeys, repo::UserRepo},
    chat::repo::ChatRepo,
    config::AppConfig,
    db,
    llm::{CompletionClient, OpenRouterClient},
    messaging::{MessagingClient, StreamClient},
};

/// Request-independent dependencies, built once at startup.
#[derive(Clone)]
pub struct AppState {
    pub jwt: JwtKeys,
    pub users: Arc<dyn UserRepo>,
    pub chats: Arc<dyn ChatRepo>,
    pub messaging: Arc<dyn MessagingClient>,
    pub llm: Arc<dyn CompletionClient>,
}

impl AppState {
    pub async fn init(config: &AppConfig) -> anyhow::Result<Self> {
        let pool = db::connect(&config.database_url).await?;
        db::migrate(&pool).await;

        let messaging = Arc::new(StreamClient::new(&config.stream)?) as Arc<dyn MessagingClient>;
        let llm = Arc::new(OpenRouterClient::new(&config.openrouter)?) as Arc<dyn CompletionClient>;

        Ok(Self {
            jwt: JwtKeys::new(&config.jwt),
            users: Arc::new(pool.clone()),
            chats: Arc::new(pool),
            messaging,
            llm,
        })
    }
}
