use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;

/// One completed exchange, as stored and as returned by `/get-messages`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub id: i32,
    pub user_id: String,
    pub message: String,
    pub reply: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}
