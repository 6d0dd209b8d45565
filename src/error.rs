use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Failures raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required setting: {0}")]
    Missing(&'static str),

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Credential store failures.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("email already registered")]
    Conflict,

    #[error("store backend error: {0}")]
    Backend(String),

    #[error("stored record is corrupt: {0}")]
    Corrupt(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if let Some(db_err) = e.as_database_error() {
            if db_err.is_unique_violation() {
                return StoreError::Conflict;
            }
        }
        StoreError::Backend(e.to_string())
    }
}

/// Token verification outcome. Reasons are deliberately collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("invalid token")]
    Invalid,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("email and password are required")]
    MissingFields { email: bool, password: bool },

    #[error("{0}")]
    Validation(String),

    #[error("user already exists")]
    Conflict,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("token missing")]
    TokenMissing,

    #[error("token invalid")]
    TokenInvalid,

    #[error(transparent)]
    Store(StoreError),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Conflict => AuthError::Conflict,
            other => AuthError::Store(other),
        }
    }
}

impl From<TokenError> for AuthError {
    fn from(_: TokenError) -> Self {
        AuthError::TokenInvalid
    }
}

impl AuthError {
    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingFields { .. } | AuthError::Validation(_) | AuthError::Conflict => {
                StatusCode::BAD_REQUEST
            }
            AuthError::InvalidCredentials | AuthError::TokenMissing | AuthError::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::Store(_) | AuthError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            AuthError::MissingFields { email, password } => json!({
                "message": self.to_string(),
                "received": { "email": email, "password": password },
            }),
            AuthError::Store(_) | AuthError::Internal(_) => {
                error!(error = %self, "request failed");
                json!({ "message": "internal server error" })
            }
            _ => json!({ "message": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn body_json(err: AuthError) -> (StatusCode, serde_json::Value) {
        let res = err.into_response();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn internal_detail_is_not_echoed() {
        let (status, body) =
            body_json(AuthError::Store(StoreError::Backend("connection refused to 10.0.0.5".into())))
                .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "internal server error");
        assert!(!body.to_string().contains("10.0.0.5"));
    }

    #[tokio::test]
    async fn missing_fields_reports_what_was_received() {
        let (status, body) = body_json(AuthError::MissingFields {
            email: true,
            password: false,
        })
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["received"]["email"], true);
        assert_eq!(body["received"]["password"], false);
    }

    #[tokio::test]
    async fn signing_failure_is_a_generic_500() {
        let (status, body) = body_json(AuthError::Internal("jwt encode: InvalidKeyFormat".into())).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "message": "internal server error" }));
    }

    #[test]
    fn store_conflict_maps_to_conflict() {
        let err: AuthError = StoreError::Conflict.into();
        assert!(matches!(err, AuthError::Conflict));
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn token_errors_are_unauthorized() {
        let err: AuthError = TokenError::Invalid.into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(AuthError::TokenMissing.status(), StatusCode::UNAUTHORIZED);
    }
}
