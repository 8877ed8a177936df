use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;

use crate::auth::repo_types::{NewUser, User};

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, user_id: &str) -> anyhow::Result<Option<User>>;

    async fn exists(&self, user_id: &str) -> anyhow::Result<bool> {
        Ok(self.find_by_id(user_id).await?.is_some())
    }

    /// Inserts the user; `None` means the user id was already taken.
    async fn create(&self, user: NewUser<'_>) -> anyhow::Result<Option<User>>;
}

#[async_trait]
impl UserRepo for PgPool {
    async fn find_by_id(&self, user_id: &str) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT user_id, name, email, password_hash, created_at
            FROM users
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(self)
        .await
        .context("select user by id")?;
        Ok(user)
    }

    async fn create(&self, user: NewUser<'_>) -> anyhow::Result<Option<User>> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (user_id, name, email, password_hash)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id) DO NOTHING
            RETURNING user_id, name, email, password_hash, created_at
            "#,
        )
        .bind(user.user_id)
        .bind(user.name)
        .bind(user.email)
        .bind(user.password_hash)
        .fetch_optional(self)
        .await
        .context("insert user")?;
        Ok(created)
    }
}
