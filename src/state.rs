use std::sync::Arc;

use tracing::warn;

use crate::{
    auth::{
        jwt::JwtKeys,
        password::PasswordHashing,
        repo::{PgUserRepo, UserRepo},
    },
    categories::repo::{CategoryRepo, PgCategoryRepo, TodoReferences},
    config::AppConfig,
    db,
    memory::MemoryStore,
    todos::repo::{PgTodoRepo, TodoRepo},
};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub keys: JwtKeys,
    pub hashing: PasswordHashing,
    pub users: Arc<dyn UserRepo>,
    pub categories: Arc<dyn CategoryRepo>,
    pub todos: Arc<dyn TodoRepo>,
    pub todo_refs: Arc<dyn TodoReferences>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = AppConfig::from_env()?;

        let state = match config.database_url.clone() {
            Some(url) => {
                let db = db::connect(&url, &config).await?;
                let todos = Arc::new(PgTodoRepo::new(db.clone()));
                Self::from_parts(
                    config,
                    Arc::new(PgUserRepo::new(db.clone())),
                    Arc::new(PgCategoryRepo::new(db)),
                    todos.clone(),
                    todos,
                )?
            }
            None => {
                warn!("DATABASE_URL not set; using the in-memory store, data is lost on exit");
                Self::in_memory(config)?
            }
        };
        Ok(state)
    }

    pub fn in_memory(config: AppConfig) -> anyhow::Result<Self> {
        let store = MemoryStore::new();
        Self::from_parts(config, store.clone(), store.clone(), store.clone(), store)
    }

    pub fn from_parts(
        config: AppConfig,
        users: Arc<dyn UserRepo>,
        categories: Arc<dyn CategoryRepo>,
        todos: Arc<dyn TodoRepo>,
        todo_refs: Arc<dyn TodoReferences>,
    ) -> anyhow::Result<Self> {
        let keys = JwtKeys::from_config(&config.jwt);
        let hashing = PasswordHashing::from_config(&config.password)?;
        Ok(Self {
            config: Arc::new(config),
            keys,
            hashing,
            users,
            categories,
            todos,
            todo_refs,
        })
    }

    /// In-memory state with cheap hashing and a fixed secret.
    #[cfg(test)]
    pub fn fake() -> Self {
        use crate::config::{JwtConfig, PasswordConfig};

        let config = AppConfig {
            database_url: None,
            database_max_connections: 1,
            listen_addr: "127.0.0.1:0".into(),
            jwt: JwtConfig {
                secret: "test-secret".into(),
                issuer: "taskdesk".into(),
                audience: "taskdesk-users".into(),
                ttl_minutes: 5,
            },
            password: PasswordConfig {
                memory_kib: 8,
                iterations: 1,
                parallelism: 1,
            },
        };
        Self::in_memory(config).expect("fake state")
    }
}
