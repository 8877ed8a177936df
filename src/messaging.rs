use std::collections::HashMap;

use anyhow::Context;
use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, instrument};

use crate::config::StreamConfig;

/// Identity mirrored into the messaging platform's user directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DirectoryUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: String,
}

impl DirectoryUser {
    pub fn member(id: &str, name: &str, email: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            email: email.to_string(),
            role: "user".to_string(),
        }
    }
}

/// Hosted chat platform: user directory plus channel publishing.
#[async_trait]
pub trait MessagingClient: Send + Sync {
    async fn user_exists(&self, user_id: &str) -> anyhow::Result<bool>;
    async fn upsert_user(&self, user: &DirectoryUser) -> anyhow::Result<()>;
    /// Get-or-create; calling it for an existing channel is a no-op.
    async fn ensure_channel(&self, channel_id: &str, name: &str, created_by: &str)
        -> anyhow::Result<()>;
    async fn send_message(&self, channel_id: &str, text: &str, user_id: &str)
        -> anyhow::Result<()>;
}

/// Stream Chat server-side REST client.
pub struct StreamClient {
    http: reqwest::Client,
    api_key: String,
    server_token: SecretString,
    base_url: String,
}

const CHANNEL_TYPE: &str = "messaging";

#[derive(Debug, Deserialize)]
struct QueryUsersResponse {
    #[serde(default)]
    users: Vec<serde_json::Value>,
}

impl StreamClient {
    pub fn new(cfg: &StreamConfig) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .build()
            .context("build messaging http client")?;
        let server_token = server_token(cfg.api_secret.expose_secret())?;
        Ok(Self {
            http,
            api_key: cfg.api_key.clone(),
            server_token: SecretString::from(server_token),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .query(&[("api_key", self.api_key.as_str())])
            .header("Authorization", self.server_token.expose_secret())
            .header("stream-auth-type", "jwt")
    }
}

/// Server-side token: HS256 over `{"server": true}` with the API secret.
fn server_token(api_secret: &str) -> anyhow::Result<String> {
    encode(
        &Header::default(),
        &json!({ "server": true }),
        &EncodingKey::from_secret(api_secret.as_bytes()),
    )
    .context("sign messaging server token")
}

async fn check(resp: Response, what: &str) -> anyhow::Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    anyhow::bail!("{what} failed with HTTP {status}: {body}")
}

#[async_trait]
impl MessagingClient for StreamClient {
    #[instrument(skip(self))]
    async fn user_exists(&self, user_id: &str) -> anyhow::Result<bool> {
        let payload = json!({
            "filter_conditions": { "id": { "$eq": user_id } },
            "limit": 1,
            "presence": false,
        })
        .to_string();
        let resp = self
            .request(Method::GET, "/users")
            .query(&[("payload", payload.as_str())])
            .send()
            .await
            .context("query messaging users")?;
        let body: QueryUsersResponse = check(resp, "query users")
            .await?
            .json()
            .await
            .context("decode query users response")?;
        debug!(found = body.users.len(), "messaging directory lookup");
        Ok(!body.users.is_empty())
    }

    #[instrument(skip(self, user), fields(user_id = %user.id))]
    async fn upsert_user(&self, user: &DirectoryUser) -> anyhow::Result<()> {
        let users = HashMap::from([(user.id.as_str(), user)]);
        let resp = self
            .request(Method::POST, "/users")
            .json(&json!({ "users": users }))
            .send()
            .await
            .context("upsert messaging user")?;
        check(resp, "upsert user").await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn ensure_channel(
        &self,
        channel_id: &str,
        name: &str,
        created_by: &str,
    ) -> anyhow::Result<()> {
        let resp = self
            .request(
                Method::POST,
                &format!("/channels/{CHANNEL_TYPE}/{channel_id}/query"),
            )
            .json(&json!({
                "data": { "name": name, "created_by_id": created_by },
                "state": false,
            }))
            .send()
            .await
            .context("get or create channel")?;
        check(resp, "get or create channel").await?;
        Ok(())
    }

    #[instrument(skip(self, text))]
    async fn send_message(&self, channel_id: &str, text: &str, user_id: &str) -> anyhow::Result<()> {
        let resp = self
            .request(
                Method::POST,
                &format!("/channels/{CHANNEL_TYPE}/{channel_id}/message"),
            )
            .json(&json!({ "message": { "text": text, "user_id": user_id } }))
            .send()
            .await
            .context("send channel message")?;
        check(resp, "send message").await?;
        Ok(())
    }
}
