use sqlx::FromRow;
use time::OffsetDateTime;

/// Administrator account.
#[derive(Debug, Clone, FromRow)]
pub struct Admin {
    pub id: i64,
    pub username: String,
    pub password_hash: String, // Argon2 PHC string
    pub created_at: OffsetDateTime,
}
