// PostgreSQL-backed transactional commit log

use std::sync::Arc;

use async_trait::async_trait;
use diesel::prelude::*;
use diesel::result::{DatabaseErrorKind, Error as DieselError};

use follower_engine_core::{
    AppendRequest, FollowerError, FollowerResult, TransactionStatus, TransactionStore,
};

use crate::config::StorageConfig;
use crate::pool::{build_pool, checkout, PgPool};
use crate::schema::transaction_log;

#[derive(Debug, Clone, Queryable, Insertable, Selectable)]
#[diesel(table_name = transaction_log)]
struct TransactionRecord {
    unit_name: String,
    transaction_id: i64,
    data: String,
    status: i32,
}

impl TransactionRecord {
    fn from_request(request: &AppendRequest) -> Self {
        Self {
            unit_name: request.unit_name.clone(),
            transaction_id: request.transaction_id,
            data: request.data.clone(),
            status: request.status.as_i32(),
        }
    }

    fn into_request(self) -> FollowerResult<AppendRequest> {
        Ok(AppendRequest {
            unit_name: self.unit_name,
            transaction_id: self.transaction_id,
            data: self.data,
            status: TransactionStatus::from_i32(self.status)?,
        })
    }
}

/// Commit log rows in PostgreSQL. The (unit_name, transaction_id) primary
/// key is the dedup point the append coalescer relies on.
pub struct PostgresTransactionStore {
    pool: Arc<PgPool>,
    config: StorageConfig,
}

impl PostgresTransactionStore {
    pub fn new(config: StorageConfig) -> FollowerResult<Self> {
        let pool = build_pool(&config)?;
        Ok(Self { pool, config })
    }

    pub fn from_pool(pool: Arc<PgPool>, config: StorageConfig) -> Self {
        Self { pool, config }
    }

    fn apply_statement_timeout(
        conn: &mut PgConnection,
        timeout: std::time::Duration,
    ) -> QueryResult<()> {
        diesel::sql_query(format!(
            "SET LOCAL statement_timeout = {}",
            timeout.as_millis()
        ))
        .execute(conn)
        .map(|_| ())
    }
}

#[async_trait]
impl TransactionStore for PostgresTransactionStore {
    async fn append_batch(&self, rows: &[AppendRequest]) -> FollowerResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let records: Vec<TransactionRecord> =
            rows.iter().map(TransactionRecord::from_request).collect();

        let mut conn = checkout(&self.pool)?;
        conn.transaction::<_, DieselError, _>(|conn| {
            // Repeatable read is Postgres' snapshot isolation.
            diesel::sql_query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ").execute(conn)?;
            Self::apply_statement_timeout(conn, self.config.write_timeout)?;
            diesel::insert_into(transaction_log::table)
                .values(&records)
                .execute(conn)?;
            Ok(())
        })
        .map_err(|error| FollowerError::StorageError {
            message: format!("bulk append transaction aborted: {}", error),
        })?;

        tracing::debug!(rows = records.len(), "bulk append committed");
        Ok(())
    }

    async fn append_one(&self, row: &AppendRequest) -> FollowerResult<bool> {
        let record = TransactionRecord::from_request(row);
        let mut conn = checkout(&self.pool)?;

        let result = diesel::insert_into(transaction_log::table)
            .values(&record)
            .execute(&mut conn);
        match result {
            Ok(_) => Ok(true),
            // An existing (unit_name, transaction_id) row is the normal
            // "already appended" signal, not a failure.
            Err(DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _)) => Ok(false),
            Err(error) => Err(FollowerError::StorageError {
                message: format!("failed to insert commit row: {}", error),
            }),
        }
    }

    async fn delete(&self, unit_name: &str, transaction_id: i64) -> FollowerResult<()> {
        let mut conn = checkout(&self.pool)?;
        diesel::delete(
            transaction_log::table
                .filter(transaction_log::unit_name.eq(unit_name))
                .filter(transaction_log::transaction_id.eq(transaction_id)),
        )
        .execute(&mut conn)
        .map_err(|error| FollowerError::StorageError {
            message: format!("failed to delete commit row: {}", error),
        })?;
        Ok(())
    }

    async fn get_rows(&self, unit_name: &str) -> FollowerResult<Vec<AppendRequest>> {
        let mut conn = checkout(&self.pool)?;

        let records: Vec<TransactionRecord> = conn
            .transaction::<_, DieselError, _>(|conn| {
                Self::apply_statement_timeout(conn, self.config.read_timeout)?;
                transaction_log::table
                    .filter(transaction_log::unit_name.eq(unit_name))
                    .order(transaction_log::transaction_id.asc())
                    .load(conn)
            })
            .map_err(|error| FollowerError::StorageError {
                message: format!("failed to load commit rows: {}", error),
            })?;

        records
            .into_iter()
            .map(TransactionRecord::into_request)
            .collect()
    }

    async fn update_status(
        &self,
        unit_name: &str,
        transaction_id: i64,
        status: TransactionStatus,
    ) -> FollowerResult<bool> {
        let mut conn = checkout(&self.pool)?;

        let updated = conn
            .transaction::<_, DieselError, _>(|conn| {
                Self::apply_statement_timeout(conn, self.config.write_timeout)?;
                diesel::update(
                    transaction_log::table
                        .filter(transaction_log::unit_name.eq(unit_name))
                        .filter(transaction_log::transaction_id.eq(transaction_id)),
                )
                .set(transaction_log::status.eq(status.as_i32()))
                .execute(conn)
            })
            .map_err(|error| FollowerError::StorageError {
                message: format!("failed to update commit status: {}", error),
            })?;

        Ok(updated > 0)
    }
}
