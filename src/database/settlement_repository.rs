use crate::database::error::{DatabaseError, DbResult};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

/// A Konnect payment reference that has been applied to an order
#[derive(Debug, Clone, FromRow)]
pub struct SettlementRecord {
    pub payment_ref: String,
    pub channel_id: Uuid,
    pub order_code: String,
    pub settled_at: chrono::DateTime<chrono::Utc>,
}

pub struct SettlementRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> SettlementRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Insert the ledger row for `payment_ref`.
    ///
    /// Returns `false` when a row already exists. A concurrent claim on the same
    /// reference blocks on the primary key until the other transaction ends.
    pub async fn claim(
        &mut self,
        payment_ref: &str,
        channel_id: Uuid,
        order_code: &str,
    ) -> DbResult<bool> {
        let result = sqlx::query(
            "INSERT INTO konnect_settlements (payment_ref, channel_id, order_code, settled_at)
             VALUES ($1, $2, $3, NOW())
             ON CONFLICT (payment_ref) DO NOTHING",
        )
        .bind(payment_ref)
        .bind(channel_id)
        .bind(order_code)
        .execute(&mut *self.conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(result.rows_affected() == 1)
    }

    pub async fn find(&mut self, payment_ref: &str) -> DbResult<Option<SettlementRecord>> {
        sqlx::query_as::<_, SettlementRecord>(
            "SELECT payment_ref, channel_id, order_code, settled_at
             FROM konnect_settlements WHERE payment_ref = $1",
        )
        .bind(payment_ref)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
