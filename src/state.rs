use std::sync::Arc;

use crate::auth::repo::{PgUserStore, UserStore};
use crate::config::AppConfig;
use crate::db;
use crate::memory::MemoryStore;
use crate::receipts::repo::{PgReceiptStore, ReceiptStore};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserStore>,
    pub receipts: Arc<dyn ReceiptStore>,
}

impl AppState {
    pub async fn init(config: AppConfig) -> anyhow::Result<Self> {
        let config = Arc::new(config);

        let state = match &config.database {
            Some(database) => {
                let pool = db::connect(database).await?;
                tracing::info!(max_connections = database.max_connections, "postgres store ready");
                Self {
                    users: Arc::new(PgUserStore::new(pool.clone())),
                    receipts: Arc::new(PgReceiptStore::new(pool)),
                    config: config.clone(),
                }
            }
            None => {
                tracing::warn!("DATABASE_URL not set; records are kept in memory and lost on exit");
                Self::in_memory(config.clone())
            }
        };
        Ok(state)
    }

    /// Both stores backed by one shared `MemoryStore`, so receipts can resolve their owner.
    pub fn in_memory(config: Arc<AppConfig>) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self {
            config,
            users: store.clone(),
            receipts: store,
        }
    }

    #[cfg(test)]
    pub fn fake() -> Self {
        Self::in_memory(Arc::new(AppConfig {
            database: None,
            host: "127.0.0.1".into(),
            port: 0,
            max_upload_mb: 1,
            cors_allowed_origin: None,
        }))
    }
}
