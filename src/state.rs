use crate::config::{AppConfig, DatabaseConfig};
use crate::db::Database;
use crate::users::{
    memory::InMemoryUserStore,
    repo::{MySqlUserStore, UserStore},
};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub users: Arc<dyn UserStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Connects the shared pool and wires the MySQL-backed store.
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let db = Arc::new(Database::new(config.database.clone()));
        db.initialize(None).await?;

        let users = Arc::new(MySqlUserStore::new(db.clone())) as Arc<dyn UserStore>;

        Ok(Self { db, users, config })
    }

    pub fn from_parts(db: Arc<Database>, users: Arc<dyn UserStore>, config: Arc<AppConfig>) -> Self {
        Self { db, users, config }
    }

    /// In-memory store and an uninitialized pool; nothing touches the network.
    pub fn fake() -> Self {
        let config = Arc::new(AppConfig {
            database: DatabaseConfig {
                host: "localhost".into(),
                port: 3306,
                user: "test".into(),
                password: "test".into(),
                database: Some("test".into()),
                connection_limit: 1,
            },
            allow_raw_query: false,
            app_host: "127.0.0.1".into(),
            app_port: 0,
        });

        let db = Arc::new(Database::new(config.database.clone()));
        let users = Arc::new(InMemoryUserStore::new()) as Arc<dyn UserStore>;
        Self::from_parts(db, users, config)
    }
}
