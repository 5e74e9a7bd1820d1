//! Host platform backed by Postgres
//!
//! Reads go through the pool. A [`PgHostTransaction`] wraps one database
//! transaction; the order being paid is locked with `FOR UPDATE` so concurrent
//! settlements of the same order serialize.

use crate::database::channel_repository::ChannelRepository;
use crate::database::error::{DatabaseError, DbResult};
use crate::database::order_repository::OrderRepository;
use crate::database::payment_method_repository::PaymentMethodRepository;
use crate::database::settlement_repository::SettlementRepository;
use crate::database::parse_id;
use crate::database::transaction::DatabaseTransaction;
use crate::error::{AppError, AppResult};
use crate::host::{
    next_order_state, prepare_payment, AddPaymentInput, AddPaymentResult, ApiType,
    HandlerRegistry, HostPlatform, HostTransaction, Order, PaymentMethod, PaymentMethodHandler,
    RequestContext,
};
use async_trait::async_trait;
use sqlx::pool::PoolConnection;
use sqlx::{PgPool, Postgres};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgHost {
    pool: PgPool,
    handlers: HandlerRegistry,
}

impl PgHost {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            handlers: HandlerRegistry::new(),
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn PaymentMethodHandler>) -> Self {
        self.handlers.register(handler);
        self
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn acquire(&self) -> DbResult<PoolConnection<Postgres>> {
        self.pool.acquire().await.map_err(DatabaseError::from_sqlx)
    }
}

fn channel_id(ctx: &RequestContext) -> DbResult<Uuid> {
    parse_id("Channel", &ctx.channel_id)
}

#[async_trait]
impl HostPlatform for PgHost {
    async fn create_context(
        &self,
        channel_token: &str,
        api_type: ApiType,
    ) -> AppResult<RequestContext> {
        let mut conn = self.acquire().await?;
        let channel = ChannelRepository::new(&mut conn)
            .find_by_token(channel_token)
            .await?
            .ok_or_else(|| AppError::not_found("Channel", channel_token))?;

        Ok(RequestContext {
            channel_id: channel.id.to_string(),
            channel_token: channel.token,
            api_type,
            user_id: None,
            authorized_as_owner_only: false,
        })
    }

    async fn active_order(&self, ctx: &RequestContext) -> AppResult<Option<Order>> {
        let Some(user_id) = ctx.user_id.as_deref() else {
            return Ok(None);
        };
        let mut conn = self.acquire().await?;
        Ok(OrderRepository::new(&mut conn)
            .find_active_for_user(channel_id(ctx)?, user_id)
            .await?)
    }

    async fn payment_methods(
        &self,
        ctx: &RequestContext,
        enabled_only: bool,
    ) -> AppResult<Vec<PaymentMethod>> {
        let mut conn = self.acquire().await?;
        Ok(PaymentMethodRepository::new(&mut conn)
            .list_for_channel(channel_id(ctx)?, enabled_only)
            .await?)
    }

    async fn eligible_payment_methods(
        &self,
        ctx: &RequestContext,
        order: &Order,
    ) -> AppResult<Vec<PaymentMethod>> {
        let methods = self.payment_methods(ctx, true).await?;
        Ok(methods
            .into_iter()
            .filter(|m| m.is_eligible_for(order))
            .collect())
    }

    async fn begin(&self, ctx: &RequestContext) -> AppResult<Box<dyn HostTransaction>> {
        let channel_id = channel_id(ctx)?;
        let tx = DatabaseTransaction::begin(&self.pool).await?;

        Ok(Box::new(PgHostTransaction {
            tx,
            channel_id,
            ctx: ctx.clone(),
            handlers: self.handlers.clone(),
        }))
    }
}

pub struct PgHostTransaction {
    tx: DatabaseTransaction,
    channel_id: Uuid,
    ctx: RequestContext,
    handlers: HandlerRegistry,
}

#[async_trait]
impl HostTransaction for PgHostTransaction {
    async fn find_order_by_code(&mut self, code: &str) -> AppResult<Option<Order>> {
        let conn = self.tx.conn()?;
        Ok(OrderRepository::new(conn)
            .find_by_code(self.channel_id, code, true)
            .await?)
    }

    async fn add_payment_to_order(
        &mut self,
        order_code: &str,
        input: AddPaymentInput,
    ) -> AppResult<AddPaymentResult> {
        let mut order = OrderRepository::new(self.tx.conn()?)
            .find_by_code(self.channel_id, order_code, true)
            .await?
            .ok_or_else(|| AppError::not_found("Order", order_code))?;
        let method = PaymentMethodRepository::new(self.tx.conn()?)
            .find_by_code(self.channel_id, &input.method)
            .await?;

        let payment =
            match prepare_payment(&self.ctx, &self.handlers, &order, method.as_ref(), input)
                .await?
            {
                Ok(payment) => payment,
                Err(rejection) => return Ok(AddPaymentResult::Rejected(rejection)),
            };

        let order_id = parse_id("Order", &order.id)?;
        let mut orders = OrderRepository::new(self.tx.conn()?);
        orders.insert_payment(order_id, &payment).await?;

        order.payments.push(payment);
        let (state, active) = next_order_state(&order);
        orders.update_state(order_id, state, active).await?;
        order.state = state;
        order.active = active;

        debug!(order_code = %order.code, state = state.as_str(), "payment stored");
        Ok(AddPaymentResult::Added(order))
    }

    async fn claim_settlement(&mut self, reference: &str, order_code: &str) -> AppResult<bool> {
        Ok(SettlementRepository::new(self.tx.conn()?)
            .claim(reference, self.channel_id, order_code)
            .await?)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let this = *self;
        Ok(this.tx.commit().await?)
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        let this = *self;
        Ok(this.tx.rollback().await?)
    }
}
