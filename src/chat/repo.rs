use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::chat::repo_types::ChatTurn;

#[async_trait]
pub trait ChatRepo: Send + Sync {
    /// The `limit` most recent turns for the user, oldest first.
    async fn recent_for_user(&self, user_id: &str, limit: i64) -> anyhow::Result<Vec<ChatTurn>>;

    /// Every turn for the user in storage order.
    async fn list_for_user(&self, user_id: &str) -> anyhow::Result<Vec<ChatTurn>>;

    async fn insert(&self, user_id: &str, message: &str, reply: &str) -> anyhow::Result<ChatTurn>;
}

#[async_trait]
impl ChatRepo for PgPool {
    async fn recent_for_user(&self, user_id: &str, limit: i64) -> anyhow::Result<Vec<ChatTurn>> {
        let rows = sqlx::query_as::<_, ChatTurn>(
            r#"
            SELECT id, user_id, message, reply, created_at
            FROM (
                SELECT id, user_id, message, reply, created_at
                FROM chats
                WHERE user_id = $1
                ORDER BY created_at DESC, id DESC
                LIMIT $2
            ) recent
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(self)
        .await
        .context("select recent chats")?;
        Ok(rows)
    }

    async fn list_for_user(&self, user_id: &str) -> anyhow::Result<Vec<ChatTurn>> {
        let rows = sqlx::query_as::<_, ChatTurn>(
            r#"
            SELECT id, user_id, message, reply, created_at
            FROM chats
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_all(self)
        .await
        .context("select chats by user")?;
        Ok(rows)
    }

    async fn insert(&self, user_id: &str, message: &str, reply: &str) -> anyhow::Result<ChatTurn> {
        let row = sqlx::query_as::<_, ChatTurn>(
            r#"
            INSERT INTO chats (user_id, message, reply)
            VALUES ($1, $2, $3)
            RETURNING id, user_id, message, reply, created_at
            "#,
        )
        .bind(user_id)
        .bind(message)
        .bind(reply)
        .fetch_one(self)
        .await
        .context("insert chat")?;
        Ok(row)
    }
}
