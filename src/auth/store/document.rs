use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use super::CredentialStore;
use crate::{auth::repo_types::User, error::StoreError};

/// Shape of a user document in `user_documents.doc`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserDocument {
    id: Uuid,
    email: String,
    password_hash: String,
    #[serde(with = "time::serde::rfc3339")]
    created_at: OffsetDateTime,
}

impl UserDocument {
    fn from_value(value: serde_json::Value) -> Result<Self, StoreError> {
        serde_json::from_value(value).map_err(|e| StoreError::Corrupt(e.to_string()))
    }
}

impl From<UserDocument> for User {
    fn from(doc: UserDocument) -> Self {
        User {
            id: doc.id,
            email: doc.email,
            password_hash: doc.password_hash,
            created_at: doc.created_at,
        }
    }
}

/// JSON-document backend. Uniqueness comes from the expression index on `doc->>'email'`.
pub struct DocumentStore {
    pool: PgPool,
}

impl DocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CredentialStore for DocumentStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        let doc = sqlx::query_scalar::<_, Json<serde_json::Value>>(
            r#"
            SELECT doc
            FROM user_documents
            WHERE doc->>'email' = $1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        doc.map(|Json(value)| UserDocument::from_value(value).map(User::from))
            .transpose()
    }

    async fn create(&self, email: &str, password_hash: &str) -> Result<User, StoreError> {
        let now = OffsetDateTime::now_utc();
        let doc = UserDocument {
            id: Uuid::new_v4(),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            // match timestamptz precision so reads compare equal to writes
            created_at: now.replace_nanosecond(now.microsecond() * 1_000).unwrap_or(now),
        };
        sqlx::query(
            r#"
            INSERT INTO user_documents (id, doc)
            VALUES ($1, $2)
            "#,
        )
        .bind(doc.id)
        .bind(Json(&doc))
        .execute(&self.pool)
        .await?;
        Ok(doc.into())
    }
}
