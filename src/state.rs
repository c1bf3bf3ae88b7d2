use std::sync::Arc;

use sqlx::AnyPool;

use crate::config::Config;
use crate::storage::FileStore;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: AnyPool,
    pub files: FileStore,
}

impl AppState {
    pub fn new(config: Config, db: AnyPool) -> Self {
        let files = FileStore::new(config.storage_dir.clone());
        Self {
            config: Arc::new(config),
            db,
            files,
        }
    }
}
