// Connection configuration for the PostgreSQL stores

use std::time::Duration;

/// Configuration shared by the PostgreSQL store implementations.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub database_url: String,
    pub connection_pool_size: u32,

    /// Statement timeout applied to commit-log reads.
    pub read_timeout: Duration,

    /// Statement timeout applied to commit-log writes.
    pub write_timeout: Duration,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: "postgresql://localhost/follower_engine".to_string(),
            connection_pool_size: 10,
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(3),
        }
    }
}

impl StorageConfig {
    /// Resolve the database URL from the environment (`DATABASE_URL`),
    /// loading a `.env` file when present.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();
        if let Ok(url) = std::env::var("DATABASE_URL") {
            config.database_url = url;
        }
        config
    }

    pub fn with_database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = url.into();
        self
    }

    pub fn with_pool_size(mut self, size: u32) -> Self {
        self.connection_pool_size = size;
        self
    }
}
