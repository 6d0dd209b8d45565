use sqlx::postgres::PgConnectOptions;

use crate::error::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Relational,
    Document,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "relational" | "postgres" | "sql" => Ok(Self::Relational),
            "document" | "doc" => Ok(Self::Document),
            "memory" => Ok(Self::Memory),
            other => Err(ConfigError::Invalid {
                key: "STORE_BACKEND",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub user: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub max_connections: u32,
}

impl DatabaseConfig {
    /// Connection options, preferring `DATABASE_URL` over the individual parts.
    pub fn connect_options(&self) -> Result<PgConnectOptions, ConfigError> {
        if let Some(url) = &self.url {
            return url.parse().map_err(|_| ConfigError::Invalid {
                key: "DATABASE_URL",
                value: "<redacted>".into(),
            });
        }
        let name = self.name.as_deref().ok_or(ConfigError::Missing("DATABASE_URL or DB_NAME"))?;
        let mut opts = PgConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .database(name);
        if let Some(user) = &self.user {
            opts = opts.username(user);
        }
        if let Some(password) = &self.password {
            opts = opts.password(password);
        }
        Ok(opts)
    }
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
}

#[derive(Debug, Clone)]
pub struct HashConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for HashConfig {
    fn default() -> Self {
        Self {
            memory_kib: argon2::Params::DEFAULT_M_COST,
            iterations: argon2::Params::DEFAULT_T_COST,
            parallelism: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub backend: StoreBackend,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub hash: HashConfig,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let secret = get("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        let jwt = JwtConfig {
            secret,
            issuer: get("JWT_ISSUER").unwrap_or_else(|| "authsvc".into()),
            audience: get("JWT_AUDIENCE").unwrap_or_else(|| "authsvc-users".into()),
        };

        let defaults = HashConfig::default();
        let hash = HashConfig {
            memory_kib: parse_or(&get, "HASH_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parse_or(&get, "HASH_ITERATIONS", defaults.iterations)?,
            parallelism: parse_or(&get, "HASH_PARALLELISM", defaults.parallelism)?,
        };

        let database = DatabaseConfig {
            url: get("DATABASE_URL"),
            host: get("DB_HOST").unwrap_or_else(|| "localhost".into()),
            port: parse_or(&get, "DB_PORT", 5432)?,
            user: get("DB_USER"),
            password: get("DB_PASSWORD"),
            name: get("DB_NAME"),
            max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 10)?,
        };

        let backend = match get("STORE_BACKEND") {
            Some(v) => v.parse()?,
            None => StoreBackend::Relational,
        };

        let port = match get("PORT") {
            Some(_) => parse_or(&get, "PORT", 3001)?,
            None => parse_or(&get, "APP_PORT", 3001)?,
        };

        Ok(Self {
            host: get("APP_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            port,
            backend,
            database,
            jwt,
            hash,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: raw }),
        None => Ok(default),
    }
}
