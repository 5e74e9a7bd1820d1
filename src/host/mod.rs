//! Contract with the host order-management platform
//!
//! Orders, payment methods, payments and channels belong to the host. The Konnect
//! flows only talk to it through [`HostPlatform`] and [`HostTransaction`], so the
//! same flows run against the Postgres adapter or the in-process [`memory::InMemoryHost`].

pub mod memory;
pub mod types;

use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

pub use types::*;

/// Read side of the host platform plus the entry point into a transaction
#[async_trait]
pub trait HostPlatform: Send + Sync {
    /// Build a context scoped to the channel identified by `channel_token`.
    ///
    /// Fails with a not-found error when the token does not name a known channel.
    async fn create_context(&self, channel_token: &str, api_type: ApiType)
        -> AppResult<RequestContext>;

    /// The active order of the session behind `ctx`, if any
    async fn active_order(&self, ctx: &RequestContext) -> AppResult<Option<Order>>;

    /// Payment method records of the context's channel
    async fn payment_methods(
        &self,
        ctx: &RequestContext,
        enabled_only: bool,
    ) -> AppResult<Vec<PaymentMethod>>;

    /// Payment methods eligible for `order` under the host's business rules
    async fn eligible_payment_methods(
        &self,
        ctx: &RequestContext,
        order: &Order,
    ) -> AppResult<Vec<PaymentMethod>>;

    /// Open an all-or-nothing unit of work
    async fn begin(&self, ctx: &RequestContext) -> AppResult<Box<dyn HostTransaction>>;
}

/// Writes performed inside one transaction. Nothing is visible to other callers
/// until [`HostTransaction::commit`] succeeds; dropping without commit discards it.
#[async_trait]
pub trait HostTransaction: Send {
    async fn find_order_by_code(&mut self, code: &str) -> AppResult<Option<Order>>;

    async fn add_payment_to_order(
        &mut self,
        order_code: &str,
        input: AddPaymentInput,
    ) -> AppResult<AddPaymentResult>;

    /// Record that `reference` has been applied to `order_code`.
    ///
    /// Returns `false` when the reference was already claimed by a committed transaction.
    async fn claim_settlement(&mut self, reference: &str, order_code: &str) -> AppResult<bool>;

    async fn commit(self: Box<Self>) -> AppResult<()>;

    async fn rollback(self: Box<Self>) -> AppResult<()>;
}

/// Declared argument of a payment method handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfigArgDefinition {
    pub name: &'static str,
    pub arg_type: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePaymentResult {
    pub amount: i64,
    pub state: PaymentState,
    pub transaction_id: Option<String>,
    pub error_message: Option<String>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlePaymentResult {
    pub success: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelPaymentResult {
    pub success: bool,
    pub error_message: Option<String>,
}

/// Integration hook the host calls when payments are created, settled or cancelled
/// for a payment method whose handler code matches [`PaymentMethodHandler::code`].
#[async_trait]
pub trait PaymentMethodHandler: Send + Sync {
    fn code(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn args(&self) -> &'static [ConfigArgDefinition];

    async fn create_payment(
        &self,
        ctx: &RequestContext,
        order: &Order,
        amount: i64,
        args: &[ConfigArg],
        metadata: serde_json::Value,
    ) -> AppResult<CreatePaymentResult>;

    async fn settle_payment(
        &self,
        ctx: &RequestContext,
        order: &Order,
        payment: &Payment,
        args: &[ConfigArg],
    ) -> AppResult<SettlePaymentResult>;

    async fn cancel_payment(
        &self,
        ctx: &RequestContext,
        order: &Order,
        payment: &Payment,
        args: &[ConfigArg],
    ) -> AppResult<CancelPaymentResult>;
}

/// Payment method handlers known to a host, keyed by handler code
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn PaymentMethodHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Arc<dyn PaymentMethodHandler>) {
        self.handlers.insert(handler.code().to_string(), handler);
    }

    pub fn get(&self, code: &str) -> Option<Arc<dyn PaymentMethodHandler>> {
        self.handlers.get(code).cloned()
    }
}

/// Run the handler of `method` for a new payment on `order`.
///
/// Shared by every host adapter so the acceptance rules stay identical.
/// Returns the payment to persist, or the rejection to report to the caller.
pub(crate) async fn prepare_payment(
    ctx: &RequestContext,
    handlers: &HandlerRegistry,
    order: &Order,
    method: Option<&PaymentMethod>,
    input: AddPaymentInput,
) -> AppResult<Result<Payment, PaymentRejection>> {
    if !order.active
        || matches!(order.state, OrderState::PaymentSettled | OrderState::Cancelled)
    {
        return Ok(Err(PaymentRejection::new(
            "ORDER_PAYMENT_STATE_ERROR",
            format!(
                "A Payment may not be added to order {} in state \"{}\"",
                order.code,
                order.state.as_str()
            ),
        )));
    }

    let method = match method {
        Some(m) if m.enabled => m,
        _ => {
            return Ok(Err(PaymentRejection::new(
                "INELIGIBLE_PAYMENT_METHOD_ERROR",
                format!("Payment method '{}' is not available", input.method),
            )))
        }
    };

    let handler = handlers.get(&method.handler.code).ok_or_else(|| {
        AppError::host(format!(
            "No PaymentMethodHandler registered for code '{}'",
            method.handler.code
        ))
    })?;

    let amount = order.total_with_tax - order.settled_amount();
    let result = handler
        .create_payment(ctx, order, amount, &method.handler.args, input.metadata)
        .await?;

    debug!(
        order_code = %order.code,
        method = %method.code,
        state = result.state.as_str(),
        "payment handler returned"
    );

    match result.state {
        PaymentState::Declined => Ok(Err(PaymentRejection::new(
            "PAYMENT_DECLINED_ERROR",
            result
                .error_message
                .unwrap_or_else(|| "The payment was declined".to_string()),
        ))),
        PaymentState::Error => Ok(Err(PaymentRejection::new(
            "PAYMENT_FAILED_ERROR",
            result
                .error_message
                .unwrap_or_else(|| "The payment failed".to_string()),
        ))),
        state => Ok(Ok(Payment {
            id: Uuid::new_v4().to_string(),
            method: method.code.clone(),
            amount: result.amount,
            state,
            transaction_id: result.transaction_id,
            metadata: result.metadata,
        })),
    }
}

/// Order state after `payment` has been attached
pub(crate) fn next_order_state(order: &Order) -> (OrderState, bool) {
    if order.settled_amount() >= order.total_with_tax {
        (OrderState::PaymentSettled, false)
    } else if order
        .payments
        .iter()
        .any(|p| p.state == PaymentState::Authorized)
    {
        (OrderState::PaymentAuthorized, order.active)
    } else {
        (order.state, order.active)
    }
}
