use crate::database::error::{DatabaseError, DatabaseErrorKind, DbResult};
use sqlx::postgres::PgConnection;
use sqlx::Transaction as SqlxTransaction;
use sqlx::{PgPool, Postgres};
use tracing::{debug, error as log_error};

/// Database transaction wrapper for atomic operations.
///
/// Dropping the wrapper without committing rolls the transaction back.
pub struct DatabaseTransaction {
    transaction: Option<SqlxTransaction<'static, Postgres>>,
}

impl DatabaseTransaction {
    /// Begin a new transaction
    pub async fn begin(pool: &PgPool) -> DbResult<Self> {
        debug!("Beginning database transaction");

        let transaction = pool.begin().await.map_err(|e| {
            log_error!("Failed to begin transaction: {}", e);
            DatabaseError::from_sqlx(e)
        })?;

        Ok(Self {
            transaction: Some(transaction),
        })
    }

    /// Commit the transaction
    pub async fn commit(mut self) -> DbResult<()> {
        let tx = self.transaction.take().ok_or_else(completed)?;
        debug!("Committing transaction");

        tx.commit().await.map_err(|e| {
            log_error!("Failed to commit transaction: {}", e);
            DatabaseError::from_sqlx(e)
        })
    }

    /// Rollback the transaction
    pub async fn rollback(mut self) -> DbResult<()> {
        let tx = self.transaction.take().ok_or_else(completed)?;
        debug!("Rolling back transaction");

        tx.rollback().await.map_err(|e| {
            log_error!("Failed to rollback transaction: {}", e);
            DatabaseError::from_sqlx(e)
        })
    }

    /// Connection to run queries on inside the transaction
    pub fn conn(&mut self) -> DbResult<&mut PgConnection> {
        self.transaction
            .as_deref_mut()
            .ok_or_else(completed)
    }
}

fn completed() -> DatabaseError {
    DatabaseError::new(DatabaseErrorKind::TransactionError {
        message: "Transaction already completed".to_string(),
    })
}
