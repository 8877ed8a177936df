//! In-memory stand-ins for the database and the two HTTP collaborators.

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;

use crate::{
    app::build_app,
    auth::{
        jwt::{tests::test_config, JwtKeys},
        password::hash_password,
        repo::UserRepo,
        repo_types::{NewUser, User},
    },
    chat::{repo::ChatRepo, repo_types::ChatTurn},
    llm::{ChatMessage, CompletionClient, LlmError},
    messaging::{DirectoryUser, MessagingClient},
    state::AppState,
};

pub const TEST_PASSWORD: &str = "correct-password";

pub fn turn(id: i32, user_id: &str, message: &str, reply: &str) -> ChatTurn {
    ChatTurn {
        id,
        user_id: user_id.to_string(),
        message: message.to_string(),
        reply: reply.to_string(),
        created_at: OffsetDateTime::UNIX_EPOCH + Duration::seconds(id as i64),
    }
}

#[derive(Default)]
pub struct FakeUsers {
    rows: Mutex<HashMap<String, User>>,
    lookups: AtomicUsize,
}

impl FakeUsers {
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    pub fn get(&self, user_id: &str) -> Option<User> {
        self.rows.lock().unwrap().get(user_id).cloned()
    }

    pub fn insert(&self, user: User) {
        self.rows.lock().unwrap().insert(user.user_id.clone(), user);
    }
}

#[async_trait]
impl UserRepo for FakeUsers {
    async fn find_by_id(&self, user_id: &str) -> anyhow::Result<Option<User>> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        Ok(self.get(user_id))
    }

    async fn create(&self, user: NewUser<'_>) -> anyhow::Result<Option<User>> {
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(user.user_id) {
            return Ok(None);
        }
        let row = User {
            user_id: user.user_id.to_string(),
            name: user.name.to_string(),
            email: user.email.to_string(),
            password_hash: Some(user.password_hash.to_string()),
            created_at: OffsetDateTime::now_utc(),
        };
        rows.insert(row.user_id.clone(), row.clone());
        Ok(Some(row))
    }
}

#[derive(Default)]
pub struct FakeChats {
    rows: Mutex<Vec<ChatTurn>>,
    reads: AtomicUsize,
}

impl FakeChats {
    pub fn push(&self, user_id: &str, message: &str, reply: &str) -> ChatTurn {
        let mut rows = self.rows.lock().unwrap();
        let row = turn(rows.len() as i32 + 1, user_id, message, reply);
        rows.push(row.clone());
        row
    }

    pub fn all(&self) -> Vec<ChatTurn> {
        self.rows.lock().unwrap().clone()
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ChatRepo for FakeChats {
    /// Same window as the Postgres query: newest `limit` rows, oldest first.
    async fn recent_for_user(&self, user_id: &str, limit: i64) -> anyhow::Result<Vec<ChatTurn>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        let mine: Vec<ChatTurn> = self
            .all()
            .into_iter()
            .filter(|t| t.user_id == user_id)
            .collect();
        let skip = mine.len().saturating_sub(limit as usize);
        Ok(mine.into_iter().skip(skip).collect())
    }

    async fn list_for_user(&self, user_id: &str) -> anyhow::Result<Vec<ChatTurn>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .all()
            .into_iter()
            .filter(|t| t.user_id == user_id)
            .collect())
    }

    async fn insert(&self, user_id: &str, message: &str, reply: &str) -> anyhow::Result<ChatTurn> {
        Ok(self.push(user_id, message, reply))
    }
}

#[derive(Default)]
pub struct FakeMessaging {
    directory: Mutex<HashSet<String>>,
    upserts: Mutex<Vec<DirectoryUser>>,
    channels: Mutex<Vec<String>>,
    messages: Mutex<Vec<(String, String, String)>>,
    fail_sends: AtomicBool,
}

impl FakeMessaging {
    pub fn add(&self, user_id: &str) {
        self.directory.lock().unwrap().insert(user_id.to_string());
    }

    pub fn upserts(&self) -> Vec<DirectoryUser> {
        self.upserts.lock().unwrap().clone()
    }

    pub fn channels(&self) -> Vec<String> {
        self.channels.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<(String, String, String)> {
        self.messages.lock().unwrap().clone()
    }

    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl MessagingClient for FakeMessaging {
    async fn user_exists(&self, user_id: &str) -> anyhow::Result<bool> {
        Ok(self.directory.lock().unwrap().contains(user_id))
    }

    async fn upsert_user(&self, user: &DirectoryUser) -> anyhow::Result<()> {
        self.add(&user.id);
        self.upserts.lock().unwrap().push(user.clone());
        Ok(())
    }

    async fn ensure_channel(
        &self,
        channel_id: &str,
        _name: &str,
        _created_by: &str,
    ) -> anyhow::Result<()> {
        let mut channels = self.channels.lock().unwrap();
        if !channels.iter().any(|c| c == channel_id) {
            channels.push(channel_id.to_string());
        }
        Ok(())
    }

    async fn send_message(&self, channel_id: &str, text: &str, user_id: &str) -> anyhow::Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            anyhow::bail!("send message failed with HTTP 503");
        }
        self.messages.lock().unwrap().push((
            channel_id.to_string(),
            text.to_string(),
            user_id.to_string(),
        ));
        Ok(())
    }
}

pub struct FakeLlm {
    reply: Mutex<Result<String, String>>,
    calls: Mutex<Vec<Vec<ChatMessage>>>,
}

impl Default for FakeLlm {
    fn default() -> Self {
        Self {
            reply: Mutex::new(Ok("ok".to_string())),
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeLlm {
    pub fn set_reply(&self, reply: &str) {
        *self.reply.lock().unwrap() = Ok(reply.to_string());
    }

    /// Subsequent completions fail with an invalid-response error.
    pub fn fail_with(&self, detail: &str) {
        *self.reply.lock().unwrap() = Err(detail.to_string());
    }

    pub fn calls(&self) -> Vec<Vec<ChatMessage>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl CompletionClient for FakeLlm {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.reply
            .lock()
            .unwrap()
            .clone()
            .map_err(LlmError::InvalidResponse)
    }
}

#[derive(Clone, Default)]
pub struct Fakes {
    pub users: Arc<FakeUsers>,
    pub chats: Arc<FakeChats>,
    pub messaging: Arc<FakeMessaging>,
    pub llm: Arc<FakeLlm>,
}

impl Fakes {
    pub fn jwt() -> JwtKeys {
        JwtKeys::new(&test_config("test-secret", 60))
    }

    pub fn state(&self) -> AppState {
        AppState {
            jwt: Self::jwt(),
            users: self.users.clone(),
            chats: self.chats.clone(),
            messaging: self.messaging.clone(),
            llm: self.llm.clone(),
        }
    }

    /// Registers the user in both the database and the messaging directory,
    /// with `TEST_PASSWORD` as password.
    pub fn seed_user(&self, user_id: &str, email: &str) {
        self.users.insert(User {
            user_id: user_id.to_string(),
            name: user_id.to_string(),
            email: email.to_string(),
            password_hash: Some(hash_password(TEST_PASSWORD).unwrap()),
            created_at: OffsetDateTime::now_utc(),
        });
        self.messaging.add(user_id);
    }

    pub fn bearer(user_id: &str, email: &str) -> String {
        format!("Bearer {}", Self::jwt().sign(user_id, email).unwrap())
    }
}

/// Sends a JSON POST through the full router and returns status and body.
pub async fn post_json(
    state: AppState,
    path: &str,
    body: serde_json::Value,
    authorization: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let mut req = Request::builder()
        .method("POST")
        .uri(path)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(auth) = authorization {
        req = req.header(header::AUTHORIZATION, auth);
    }
    let res = build_app(state)
        .oneshot(req.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, json)
}
