use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

/// Argon2id cost parameters used when hashing new passwords.
#[derive(Debug, Clone, Deserialize)]
pub struct PasswordConfig {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for PasswordConfig {
    fn default() -> Self {
        Self {
            memory_kib: 19 * 1024,
            iterations: 3,
            parallelism: 1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    /// `APP_HOST:APP_PORT`.
    pub listen_addr: String,
    pub jwt: JwtConfig,
    pub password: PasswordConfig,
}

const DEFAULT_TTL_MINUTES: i64 = 7 * 24 * 60;

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|v| !v.trim().is_empty());
        let jwt = JwtConfig {
            secret: std::env::var("JWT_SECRET")
                .map_err(|_| anyhow::anyhow!("JWT_SECRET must be set"))?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "taskdesk".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "taskdesk-users".into()),
            ttl_minutes: env_parse("JWT_TTL_MINUTES").unwrap_or(DEFAULT_TTL_MINUTES),
        };
        let defaults = PasswordConfig::default();
        let password = PasswordConfig {
            memory_kib: env_parse("PASSWORD_MEMORY_KIB").unwrap_or(defaults.memory_kib),
            iterations: env_parse("PASSWORD_ITERATIONS").unwrap_or(defaults.iterations),
            parallelism: env_parse("PASSWORD_PARALLELISM").unwrap_or(defaults.parallelism),
        };
        Ok(Self {
            database_url,
            database_max_connections: env_parse("DATABASE_MAX_CONNECTIONS").unwrap_or(10),
            listen_addr: format!(
                "{}:{}",
                std::env::var("APP_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
                env_parse::<u16>("APP_PORT").unwrap_or(8080)
            ),
            jwt,
            password,
        })
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}
