use std::sync::Arc;

use crate::auth::{jwt::JwtKeys, password::PasswordHasher, services::AuthService, store};
use crate::config::AppConfig;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
}

impl AppState {
    pub async fn init(config: &AppConfig) -> anyhow::Result<Self> {
        let keys = JwtKeys::new(&config.jwt)?;
        let hasher = PasswordHasher::new(&config.hash)?;
        let store = store::connect(config).await?;

        Ok(Self {
            auth: Arc::new(AuthService::new(store, hasher, keys)),
        })
    }

    /// In-memory store, cheapest hasher cost and a fixed secret.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::auth::store::MemoryStore;
        use crate::config::JwtConfig;

        let keys = JwtKeys::new(&JwtConfig {
            secret: "test-secret".into(),
            issuer: "test-issuer".into(),
            audience: "test-aud".into(),
        })
        .expect("test keys");
        let auth = AuthService::new(
            Arc::new(MemoryStore::default()),
            PasswordHasher::cheap(),
            keys,
        );
        Self {
            auth: Arc::new(auth),
        }
    }
}
