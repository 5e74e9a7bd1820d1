use crate::database::error::{DatabaseError, DbResult};
use crate::host::{Customer, Order, OrderState, Payment, PaymentState};
use sqlx::{FromRow, PgConnection};
use uuid::Uuid;

const ORDER_SELECT: &str = "SELECT o.id, o.code, o.state, o.active, o.currency_code,
        o.sub_total, o.sub_total_with_tax,
        c.user_id AS customer_user_id, c.first_name, c.last_name, c.email_address, c.phone_number
     FROM orders o
     LEFT JOIN customers c ON c.id = o.customer_id";

/// Order joined with its customer
#[derive(Debug, Clone, FromRow)]
pub struct OrderRow {
    pub id: Uuid,
    pub code: String,
    pub state: String,
    pub active: bool,
    pub currency_code: String,
    pub sub_total: i64,
    pub sub_total_with_tax: i64,
    pub customer_user_id: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email_address: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct PaymentRow {
    pub id: Uuid,
    pub method: String,
    pub amount: i64,
    pub state: String,
    pub transaction_id: Option<String>,
    pub metadata: serde_json::Value,
}

impl TryFrom<PaymentRow> for Payment {
    type Error = DatabaseError;

    fn try_from(row: PaymentRow) -> Result<Self, Self::Error> {
        let state = PaymentState::parse(&row.state).ok_or_else(|| {
            DatabaseError::decode(format!("payment {} has unknown state '{}'", row.id, row.state))
        })?;

        Ok(Payment {
            id: row.id.to_string(),
            method: row.method,
            amount: row.amount,
            state,
            transaction_id: row.transaction_id,
            metadata: row.metadata,
        })
    }
}

impl OrderRow {
    fn into_order(self, payments: Vec<Payment>) -> DbResult<Order> {
        let state = OrderState::parse(&self.state).ok_or_else(|| {
            DatabaseError::decode(format!(
                "order {} has unknown state '{}'",
                self.code, self.state
            ))
        })?;

        let customer = match (self.first_name, self.last_name, self.email_address) {
            (Some(first_name), Some(last_name), Some(email_address)) => Some(Customer {
                first_name,
                last_name,
                email_address,
                phone_number: self.phone_number,
            }),
            _ => None,
        };

        Ok(Order {
            id: self.id.to_string(),
            code: self.code,
            state,
            active: self.active,
            currency_code: self.currency_code,
            total: self.sub_total,
            total_with_tax: self.sub_total_with_tax,
            customer,
            customer_user_id: self.customer_user_id,
            payments,
        })
    }
}

pub struct OrderRepository<'c> {
    conn: &'c mut PgConnection,
}

impl<'c> OrderRepository<'c> {
    pub fn new(conn: &'c mut PgConnection) -> Self {
        Self { conn }
    }

    /// The active order of the customer linked to `user_id`
    pub async fn find_active_for_user(
        &mut self,
        channel_id: Uuid,
        user_id: &str,
    ) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "{} WHERE o.channel_id = $1 AND c.user_id = $2 AND o.active = true
             ORDER BY o.updated_at DESC LIMIT 1",
            ORDER_SELECT
        ))
        .bind(channel_id)
        .bind(user_id)
        .fetch_optional(&mut *self.conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        self.hydrate(row).await
    }

    /// Order by code. With `lock` the order row stays locked until the
    /// surrounding transaction ends.
    pub async fn find_by_code(
        &mut self,
        channel_id: Uuid,
        code: &str,
        lock: bool,
    ) -> DbResult<Option<Order>> {
        let mut sql = format!("{} WHERE o.channel_id = $1 AND o.code = $2", ORDER_SELECT);
        if lock {
            sql.push_str(" FOR UPDATE OF o");
        }

        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(channel_id)
            .bind(code)
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        self.hydrate(row).await
    }

    pub async fn insert_payment(&mut self, order_id: Uuid, payment: &Payment) -> DbResult<()> {
        let payment_id = super::parse_id("Payment", &payment.id)?;

        sqlx::query(
            "INSERT INTO payments (id, order_id, method, amount, state, transaction_id, metadata)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(payment_id)
        .bind(order_id)
        .bind(&payment.method)
        .bind(payment.amount)
        .bind(payment.state.as_str())
        .bind(&payment.transaction_id)
        .bind(&payment.metadata)
        .execute(&mut *self.conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }

    pub async fn update_state(
        &mut self,
        order_id: Uuid,
        state: OrderState,
        active: bool,
    ) -> DbResult<()> {
        sqlx::query("UPDATE orders SET state = $2, active = $3, updated_at = NOW() WHERE id = $1")
            .bind(order_id)
            .bind(state.as_str())
            .bind(active)
            .execute(&mut *self.conn)
            .await
            .map_err(DatabaseError::from_sqlx)?;

        Ok(())
    }

    async fn payments_for(&mut self, order_id: Uuid) -> DbResult<Vec<Payment>> {
        let rows = sqlx::query_as::<_, PaymentRow>(
            "SELECT id, method, amount, state, transaction_id, metadata
             FROM payments WHERE order_id = $1 ORDER BY created_at ASC",
        )
        .bind(order_id)
        .fetch_all(&mut *self.conn)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        rows.into_iter().map(Payment::try_from).collect()
    }

    async fn hydrate(&mut self, row: Option<OrderRow>) -> DbResult<Option<Order>> {
        match row {
            Some(row) => {
                let payments = self.payments_for(row.id).await?;
                row.into_order(payments).map(Some)
            }
            None => Ok(None),
        }
    }
}
