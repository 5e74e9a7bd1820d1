//! In-process host platform
//!
//! Keeps channels, orders, payment methods and the settlement ledger in memory.
//! Transactions are serialized: a transaction holds the state lock for its whole
//! lifetime and works on a copy that replaces the shared state on commit.

use super::{
    next_order_state, prepare_payment, AddPaymentInput, AddPaymentResult, ApiType,
    HandlerRegistry, HostPlatform, HostTransaction, Order, PaymentMethod, PaymentMethodHandler,
    RequestContext,
};
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredOrder {
    channel_id: String,
    order: Order,
}

#[derive(Debug, Clone)]
struct StoredPaymentMethod {
    channel_id: String,
    method: PaymentMethod,
}

#[derive(Debug, Clone, Default)]
struct HostState {
    /// channel token -> channel id
    channels: HashMap<String, String>,
    orders: Vec<StoredOrder>,
    payment_methods: Vec<StoredPaymentMethod>,
    /// payment reference -> order code
    settlements: HashMap<String, String>,
}

impl HostState {
    fn order_mut(&mut self, channel_id: &str, code: &str) -> Option<&mut Order> {
        self.orders
            .iter_mut()
            .find(|o| o.channel_id == channel_id && o.order.code == code)
            .map(|o| &mut o.order)
    }

    fn methods(&self, channel_id: &str) -> impl Iterator<Item = &PaymentMethod> {
        let channel_id = channel_id.to_string();
        self.payment_methods
            .iter()
            .filter(move |m| m.channel_id == channel_id)
            .map(|m| &m.method)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryHost {
    state: Arc<Mutex<HostState>>,
    handlers: HandlerRegistry,
}

impl InMemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_handler(mut self, handler: Arc<dyn PaymentMethodHandler>) -> Self {
        self.handlers.register(handler);
        self
    }

    pub async fn add_channel(&self, channel_id: &str, token: &str) {
        let mut state = self.state.lock().await;
        state
            .channels
            .insert(token.to_string(), channel_id.to_string());
    }

    pub async fn add_order(&self, channel_id: &str, order: Order) {
        let mut state = self.state.lock().await;
        state.orders.push(StoredOrder {
            channel_id: channel_id.to_string(),
            order,
        });
    }

    pub async fn add_payment_method(&self, channel_id: &str, method: PaymentMethod) {
        let mut state = self.state.lock().await;
        state.payment_methods.push(StoredPaymentMethod {
            channel_id: channel_id.to_string(),
            method,
        });
    }

    /// Committed view of an order of one channel
    pub async fn order(&self, channel_id: &str, code: &str) -> Option<Order> {
        let mut state = self.state.lock().await;
        state.order_mut(channel_id, code).map(|o| o.clone())
    }

    /// Number of references in the committed settlement ledger
    pub async fn settlement_count(&self) -> usize {
        self.state.lock().await.settlements.len()
    }
}

#[async_trait]
impl HostPlatform for InMemoryHost {
    async fn create_context(
        &self,
        channel_token: &str,
        api_type: ApiType,
    ) -> AppResult<RequestContext> {
        let state = self.state.lock().await;
        let channel_id = state
            .channels
            .get(channel_token)
            .ok_or_else(|| AppError::not_found("Channel", channel_token))?;

        Ok(RequestContext {
            channel_id: channel_id.clone(),
            channel_token: channel_token.to_string(),
            api_type,
            user_id: None,
            authorized_as_owner_only: false,
        })
    }

    async fn active_order(&self, ctx: &RequestContext) -> AppResult<Option<Order>> {
        let Some(user_id) = ctx.user_id.as_deref() else {
            return Ok(None);
        };
        let state = self.state.lock().await;
        Ok(state
            .orders
            .iter()
            .filter(|o| o.channel_id == ctx.channel_id)
            .map(|o| &o.order)
            .find(|o| o.active && o.customer_user_id.as_deref() == Some(user_id))
            .cloned())
    }

    async fn payment_methods(
        &self,
        ctx: &RequestContext,
        enabled_only: bool,
    ) -> AppResult<Vec<PaymentMethod>> {
        let state = self.state.lock().await;
        Ok(state
            .methods(&ctx.channel_id)
            .filter(|m| !enabled_only || m.enabled)
            .cloned()
            .collect())
    }

    async fn eligible_payment_methods(
        &self,
        ctx: &RequestContext,
        order: &Order,
    ) -> AppResult<Vec<PaymentMethod>> {
        let state = self.state.lock().await;
        Ok(state
            .methods(&ctx.channel_id)
            .filter(|m| m.is_eligible_for(order))
            .cloned()
            .collect())
    }

    async fn begin(&self, ctx: &RequestContext) -> AppResult<Box<dyn HostTransaction>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        debug!(channel = %ctx.channel_token, "in-memory transaction started");

        Ok(Box::new(InMemoryTransaction {
            guard,
            working,
            ctx: ctx.clone(),
            handlers: self.handlers.clone(),
        }))
    }
}

pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<HostState>,
    working: HostState,
    ctx: RequestContext,
    handlers: HandlerRegistry,
}

#[async_trait]
impl HostTransaction for InMemoryTransaction {
    async fn find_order_by_code(&mut self, code: &str) -> AppResult<Option<Order>> {
        Ok(self
            .working
            .order_mut(&self.ctx.channel_id, code)
            .map(|o| o.clone()))
    }

    async fn add_payment_to_order(
        &mut self,
        order_code: &str,
        input: AddPaymentInput,
    ) -> AppResult<AddPaymentResult> {
        let channel_id = self.ctx.channel_id.clone();
        let order = self
            .working
            .order_mut(&channel_id, order_code)
            .map(|o| o.clone())
            .ok_or_else(|| AppError::not_found("Order", order_code))?;
        let method = self
            .working
            .methods(&channel_id)
            .find(|m| m.code == input.method)
            .cloned();

        let payment =
            match prepare_payment(&self.ctx, &self.handlers, &order, method.as_ref(), input)
                .await?
            {
                Ok(payment) => payment,
                Err(rejection) => return Ok(AddPaymentResult::Rejected(rejection)),
            };

        let stored = self
            .working
            .order_mut(&channel_id, order_code)
            .ok_or_else(|| AppError::not_found("Order", order_code))?;
        stored.payments.push(payment);
        let (state, active) = next_order_state(stored);
        stored.state = state;
        stored.active = active;

        Ok(AddPaymentResult::Added(stored.clone()))
    }

    async fn claim_settlement(&mut self, reference: &str, order_code: &str) -> AppResult<bool> {
        if self.working.settlements.contains_key(reference) {
            return Ok(false);
        }
        self.working
            .settlements
            .insert(reference.to_string(), order_code.to_string());
        Ok(true)
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let InMemoryTransaction {
            mut guard, working, ..
        } = *self;
        *guard = working;
        debug!("in-memory transaction committed");
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> AppResult<()> {
        debug!("in-memory transaction rolled back");
        Ok(())
    }
}
