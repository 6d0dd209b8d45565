use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts, HeaderValue},
};
use tracing::warn;

use super::{claims::Claims, jwt::JwtKeys};
use crate::error::AuthError;

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    Missing,
    Invalid,
}

/// Outcome of checking a request's bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Gate {
    Authenticated(Claims),
    Rejected(GateRejection),
}

/// Evaluates an `Authorization` header value. Stateless; keys are the only input besides the header.
pub fn evaluate(header: Option<&HeaderValue>, keys: &JwtKeys) -> Gate {
    let Some(header) = header else {
        return Gate::Rejected(GateRejection::Missing);
    };
    let Ok(raw) = header.to_str() else {
        return Gate::Rejected(GateRejection::Invalid);
    };

    let mut parts = raw.split_whitespace();
    let scheme = parts.next();
    let token = parts.next();
    let (Some(scheme), Some(token)) = (scheme, token) else {
        return Gate::Rejected(GateRejection::Missing);
    };
    if !scheme.eq_ignore_ascii_case("bearer") || parts.next().is_some() {
        return Gate::Rejected(GateRejection::Invalid);
    }

    match keys.verify(token) {
        Ok(claims) => Gate::Authenticated(claims),
        Err(_) => Gate::Rejected(GateRejection::Invalid),
    }
}

/// Extracts and validates the bearer token, yielding its claims.
pub struct AuthUser(pub Claims);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        match evaluate(parts.headers.get(AUTHORIZATION), &keys) {
            Gate::Authenticated(claims) => Ok(AuthUser(claims)),
            Gate::Rejected(GateRejection::Missing) => {
                warn!(uri = %parts.uri, "token missing");
                Err(AuthError::TokenMissing)
            }
            Gate::Rejected(GateRejection::Invalid) => {
                warn!(uri = %parts.uri, "token invalid");
                Err(AuthError::TokenInvalid)
            }
        }
    }
}
