use std::sync::Arc;

use super::{config::Config, database::Database, error::AppError};

pub struct AppState {
    pub config: Config,
    pub db: Database,
}

impl AppState {
    pub fn new(config: Config) -> Result<Arc<Self>, AppError> {
        let db = Database::open(&config.database_path)?;

        Ok(Self::with_database(config, db))
    }

    pub fn with_database(config: Config, db: Database) -> Arc<Self> {
        Arc::new(Self { config, db })
    }
}
