use sqlx::FromRow;
use time::OffsetDateTime;

/// User record in the database.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: String,               // derived from email, primary key
    pub name: String,
    pub email: String,
    pub password_hash: Option<String>, // Argon2 PHC string, never serialized
    pub created_at: OffsetDateTime,
}

/// Insert payload for a new user.
#[derive(Debug, Clone, Copy)]
pub struct NewUser<'a> {
    pub user_id: &'a str,
    pub name: &'a str,
    pub email: &'a str,
    pub password_hash: &'a str,
}
