use axum::{
    async_trait,
    extract::{FromRequest, Request, State},
    http::{header::CONTENT_TYPE, StatusCode},
    routing::{get, post},
    Form, Json, Router,
};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};

use crate::{
    auth::{
        dto::{
            LoginRequest, LoginResponse, MessageResponse, ProtectedResponse, PublicUser,
            RegisterRequest,
        },
        gate::AuthUser,
    },
    error::AuthError,
    state::AppState,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
}

pub fn protected_routes() -> Router<AppState> {
    Router::new().route("/protected", get(protected))
}

/// Credentials body, accepted as JSON or as an urlencoded form.
pub struct Credentials<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for Credentials<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.starts_with("application/x-www-form-urlencoded"))
            .unwrap_or(false);

        let parsed = if is_form {
            Form::<T>::from_request(req, state)
                .await
                .map(|Form(v)| v)
                .map_err(|e| e.body_text())
        } else {
            Json::<T>::from_request(req, state)
                .await
                .map(|Json(v)| v)
                .map_err(|e| e.body_text())
        };

        parsed.map(Credentials).map_err(|reason| {
            warn!(error = %reason, "rejected request body");
            AuthError::Validation("invalid request body".into())
        })
    }
}

#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    Credentials(req): Credentials<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), AuthError> {
    state
        .auth
        .register(req.email.as_deref(), req.password.as_deref())
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::new("user created")),
    ))
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    Credentials(req): Credentials<LoginRequest>,
) -> Result<Json<LoginResponse>, AuthError> {
    let outcome = state
        .auth
        .login(req.email.as_deref(), req.password.as_deref())
        .await?;
    Ok(Json(LoginResponse {
        user: PublicUser::from(&outcome.user),
        token: outcome.token,
    }))
}

#[instrument(skip_all)]
pub async fn protected(AuthUser(claims): AuthUser) -> Json<ProtectedResponse> {
    debug!(user_id = %claims.sub, "protected route granted");
    Json(ProtectedResponse {
        message: "protected route accessible".into(),
        user: claims.into(),
    })
}
