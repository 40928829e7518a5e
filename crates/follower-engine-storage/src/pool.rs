// r2d2 connection pooling shared by the store implementations

use std::sync::Arc;

use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::PgConnection;
use follower_engine_core::{FollowerError, FollowerResult};

use crate::config::StorageConfig;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;
pub type PgPooledConnection = PooledConnection<ConnectionManager<PgConnection>>;

/// Build a connection pool for the configured database.
pub fn build_pool(config: &StorageConfig) -> FollowerResult<Arc<PgPool>> {
    let manager = ConnectionManager::<PgConnection>::new(&config.database_url);
    let pool = Pool::builder()
        .max_size(config.connection_pool_size)
        .build(manager)
        .map_err(|error| FollowerError::StorageError {
            message: format!("failed to create connection pool: {}", error),
        })?;
    Ok(Arc::new(pool))
}

pub fn checkout(pool: &PgPool) -> FollowerResult<PgPooledConnection> {
    pool.get().map_err(|error| FollowerError::StorageError {
        message: format!("failed to get database connection: {}", error),
    })
}
