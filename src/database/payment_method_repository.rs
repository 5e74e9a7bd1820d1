use crate::database::error::{DatabaseError, DbResult};
use crate::host::{ConfigArg, ConfigurableOperation, PaymentMethod};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

const COLUMNS: &str =
    "id, code, name, enabled, handler_code, handler_args, eligible_currencies";

/// Payment method as stored, handler arguments kept as JSON
#[derive(Debug, Clone, FromRow)]
pub struct PaymentMethodRow {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub enabled: bool,
    pub handler_code: String,
    pub handler_args: serde_json::Value,
    pub eligible_currencies: Option<Vec<String>>,
}

impl TryFrom<PaymentMethodRow> for PaymentMethod {
    type Error = DatabaseError;

    fn try_from(row: PaymentMethodRow) -> Result<Self, Self::Error> {
        let args: Vec<ConfigArg> = serde_json::from_value(row.handler_args).map_err(|e| {
            DatabaseError::decode(format!("handler_args of payment method {}: {}", row.code, e))
        })?;

        Ok(PaymentMethod {
            id: row.id.to_string(),
            code: row.code,
            name: row.name,
            enabled: row.enabled,
            handler: ConfigurableOperation {
                code: row.handler_code,
                args,
            },
            eligible_currencies: row.eligible_currencies,
        })
    }
}

pub struct PaymentMethodRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> PaymentMethodRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// Payment methods of a channel, optionally restricted to enabled ones
    pub async fn list_for_channel(
        &mut self,
        channel_id: Uuid,
        enabled_only: bool,
    ) -> DbResult<Vec<PaymentMethod>> {
        let rows = sqlx::query_as::<_, PaymentMethodRow>(&format!(
            "SELECT {} FROM payment_methods
             WHERE channel_id = $1 AND ($2 = false OR enabled = true)
             ORDER BY created_at ASC",
            COLUMNS
        ))
        .bind(channel_id)
        .bind(enabled_only)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        rows.into_iter().map(PaymentMethod::try_from).collect()
    }

    pub async fn find_by_code(
        &mut self,
        channel_id: Uuid,
        code: &str,
    ) -> DbResult<Option<PaymentMethod>> {
        let row = sqlx::query_as::<_, PaymentMethodRow>(&format!(
            "SELECT {} FROM payment_methods WHERE channel_id = $1 AND code = $2",
            COLUMNS
        ))
        .bind(channel_id)
        .bind(code)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        row.map(PaymentMethod::try_from).transpose()
    }

    pub async fn insert(&mut self, channel_id: Uuid, method: &PaymentMethod) -> DbResult<Uuid> {
        let args = serde_json::to_value(&method.handler.args)
            .map_err(|e| DatabaseError::decode(e.to_string()))?;

        sqlx::query_scalar::<_, Uuid>(
            "INSERT INTO payment_methods
                 (channel_id, code, name, enabled, handler_code, handler_args, eligible_currencies)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id",
        )
        .bind(channel_id)
        .bind(&method.code)
        .bind(&method.name)
        .bind(method.enabled)
        .bind(&method.handler.code)
        .bind(args)
        .bind(&method.eligible_currencies)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
