use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Persisted credential record. Never serialized directly into a response.
#[derive(Clone, FromRow)]
pub struct User {
    pub id: Uuid,                   // assigned by the store
    pub email: String,              // stored exactly as registered
    pub password_hash: String,      // Argon2 PHC string
    pub created_at: OffsetDateTime, // set once on insert
}

impl std::fmt::Debug for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}
