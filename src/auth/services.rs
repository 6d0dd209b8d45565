use std::sync::Arc;

use lazy_static::lazy_static;
use regex::Regex;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

use super::{jwt::JwtKeys, password::PasswordHasher, repo_types::User, store::CredentialStore};
use crate::error::AuthError;

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Rejects absent or blank fields, reporting which ones arrived.
fn require_fields<'a>(
    email: Option<&'a str>,
    password: Option<&'a str>,
) -> Result<(&'a str, &'a str), AuthError> {
    let email = email.filter(|e| !e.trim().is_empty());
    let password = password.filter(|p| !p.is_empty());
    match (email, password) {
        (Some(e), Some(p)) => Ok((e, p)),
        (e, p) => Err(AuthError::MissingFields {
            email: e.is_some(),
            password: p.is_some(),
        }),
    }
}

/// Successful login: a bearer token and the user it was issued for.
#[derive(Debug)]
pub struct LoginOutcome {
    pub token: String,
    pub user: User,
}

/// Verified against when the email is unknown, so both login failures cost one hash check.
const DUMMY_PASSWORD: &str = "authsvc-dummy-password";

/// Registration and login over an injected credential store.
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    hasher: PasswordHasher,
    keys: JwtKeys,
    dummy_hash: OnceCell<String>,
}

impl AuthService {
    pub fn new(store: Arc<dyn CredentialStore>, hasher: PasswordHasher, keys: JwtKeys) -> Self {
        Self {
            store,
            hasher,
            keys,
            dummy_hash: OnceCell::new(),
        }
    }

    pub fn keys(&self) -> &JwtKeys {
        &self.keys
    }

    pub async fn register(
        &self,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<User, AuthError> {
        let (email, password) = require_fields(email, password)?;

        if !is_valid_email(email) {
            warn!("register with invalid email");
            return Err(AuthError::Validation("invalid email".into()));
        }

        if self.store.find_by_email(email).await?.is_some() {
            debug!(email = %email, "email already registered");
            warn!("register rejected: email already registered");
            return Err(AuthError::Conflict);
        }

        let hash = self.hash(password).await?;

        // a concurrent registration can still win between lookup and insert;
        // the store reports that as Conflict
        let user = self.store.create(email, &hash).await.map_err(|e| {
            warn!(error = %e, "create user failed");
            AuthError::from(e)
        })?;

        info!(user_id = %user.id, "user registered");
        Ok(user)
    }

    pub async fn login(
        &self,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<LoginOutcome, AuthError> {
        let (email, password) = require_fields(email, password)?;

        let user = match self.store.find_by_email(email).await? {
            Some(u) => u,
            None => {
                let dummy = self.dummy_hash().await?;
                let _ = self.verify(password, dummy).await?;
                debug!(email = %email, "login unknown email");
                warn!("login rejected: unknown account");
                return Err(AuthError::InvalidCredentials);
            }
        };

        if !self.verify(password, &user.password_hash).await? {
            warn!(user_id = %user.id, "login rejected: invalid password");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.keys.issue(&user)?;
        info!(user_id = %user.id, "user logged in");
        Ok(LoginOutcome { token, user })
    }

    /// Hash of a fixed password under this service's cost parameters, built on first use.
    async fn dummy_hash(&self) -> Result<&str, AuthError> {
        self.dummy_hash
            .get_or_try_init(|| self.hash(DUMMY_PASSWORD))
            .await
            .map(String::as_str)
    }

    async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| {
                error!(error = %e, "hash task failed");
                AuthError::Internal(e.to_string())
            })?
    }

    async fn verify(&self, password: &str, hash: &str) -> Result<bool, AuthError> {
        let hasher = self.hasher.clone();
        let password = password.to_owned();
        let hash = hash.to_owned();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| {
                error!(error = %e, "verify task failed");
                AuthError::Internal(e.to_string())
            })
    }
}
