//! Webhook reconciliation
//!
//! Konnect calls back with a payment reference only. The payment is looked up at
//! Konnect, and when it reports `completed` the payment is appended to the order it
//! was opened for. Settlement runs inside one host transaction: claiming the
//! reference, loading the order and appending the payment either all commit or
//! none do.

use crate::error::{AppError, AppResult};
use crate::host::{
    AddPaymentInput, AddPaymentResult, ApiType, HostPlatform, HostTransaction, PaymentMethod,
    RequestContext,
};
use crate::konnect::{resolver, LOG_TARGET};
use crate::payments::traits::PaymentProvider;
use crate::payments::types::{KonnectCredentials, PaymentDetails, PaymentStatus};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

/// What a webhook delivery led to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The delivery carried no payment reference
    MissingReference,
    /// Konnect still reports the payment as pending
    Pending { order_id: Option<String> },
    /// Konnect reported a status other than pending/completed
    Ignored {
        status: PaymentStatus,
        order_id: Option<String>,
    },
    /// The reference had already been applied by an earlier delivery
    AlreadySettled { reference: String },
    Settled {
        order_code: String,
        payment_id: Option<String>,
    },
    /// The host refused the payment; nothing was written
    Rejected { order_code: String, message: String },
}

#[derive(Clone)]
pub struct WebhookService {
    host: Arc<dyn HostPlatform>,
    provider: Arc<dyn PaymentProvider>,
    deduplicate: bool,
}

impl WebhookService {
    pub fn new(
        host: Arc<dyn HostPlatform>,
        provider: Arc<dyn PaymentProvider>,
        deduplicate: bool,
    ) -> Self {
        Self {
            host,
            provider,
            deduplicate,
        }
    }

    /// Administrative context for the installation named by `channel_token`
    pub async fn resolve_context(&self, channel_token: &str) -> AppResult<RequestContext> {
        self.host
            .create_context(channel_token, ApiType::Admin)
            .await
            .map_err(|e| e.with_context("resolving webhook installation"))
    }

    pub async fn reconcile(
        &self,
        ctx: &RequestContext,
        payment_ref: Option<&str>,
    ) -> AppResult<ReconcileOutcome> {
        let Some(reference) = payment_ref.map(str::trim).filter(|r| !r.is_empty()) else {
            warn!(target: LOG_TARGET, "Konnect webhook received without payment_ref");
            return Ok(ReconcileOutcome::MissingReference);
        };
        info!(
            target: LOG_TARGET,
            payment_ref = %reference,
            channel = %ctx.channel_token,
            "Konnect webhook received"
        );

        let method = self.konnect_method(ctx).await?;
        let credentials = KonnectCredentials::from_method(&method)?;
        let payment = self.provider.fetch_payment(&credentials, reference).await?;

        match &payment.status {
            PaymentStatus::Pending => {
                warn!(
                    target: LOG_TARGET,
                    "Payment {} for order {} is still pending",
                    reference,
                    payment.order_id.as_deref().unwrap_or("<unknown>")
                );
                Ok(ReconcileOutcome::Pending {
                    order_id: payment.order_id,
                })
            }
            PaymentStatus::Other(_) => {
                info!(
                    target: LOG_TARGET,
                    "Received {} status update for order {}",
                    payment.status,
                    payment.order_id.as_deref().unwrap_or("<unknown>")
                );
                Ok(ReconcileOutcome::Ignored {
                    status: payment.status.clone(),
                    order_id: payment.order_id,
                })
            }
            PaymentStatus::Completed => self.settle(ctx, &method, reference, &payment).await,
        }
    }

    async fn konnect_method(&self, ctx: &RequestContext) -> AppResult<PaymentMethod> {
        let methods = self.host.payment_methods(ctx, false).await?;
        resolver::find_konnect_method(&methods)
            .cloned()
            .map_err(|e| e.with_context("Could not find Konnect PaymentMethod"))
    }

    async fn settle(
        &self,
        ctx: &RequestContext,
        method: &PaymentMethod,
        reference: &str,
        payment: &PaymentDetails,
    ) -> AppResult<ReconcileOutcome> {
        let order_code = payment.order_id.as_deref().ok_or_else(|| {
            AppError::not_found("Order", "<missing>")
                .with_context(format!("payment {} carries no orderId", reference))
        })?;

        let mut tx = self.host.begin(ctx).await?;
        let result = self
            .apply(tx.as_mut(), method, reference, order_code, payment)
            .await;

        match result {
            Ok(outcome @ ReconcileOutcome::Settled { .. }) => {
                tx.commit().await?;
                Ok(outcome)
            }
            Ok(outcome) => {
                tx.rollback().await?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(
                        target: LOG_TARGET,
                        "Rollback after failed settlement also failed: {}", rollback_err
                    );
                }
                Err(e)
            }
        }
    }

    async fn apply(
        &self,
        tx: &mut dyn HostTransaction,
        method: &PaymentMethod,
        reference: &str,
        order_code: &str,
        payment: &PaymentDetails,
    ) -> AppResult<ReconcileOutcome> {
        if self.deduplicate && !tx.claim_settlement(reference, order_code).await? {
            info!(
                target: LOG_TARGET,
                "Payment {} was already applied to order {}", reference, order_code
            );
            return Ok(ReconcileOutcome::AlreadySettled {
                reference: reference.to_string(),
            });
        }

        let order = tx.find_order_by_code(order_code).await?.ok_or_else(|| {
            AppError::not_found("Order", order_code).with_context("unable to settle payment")
        })?;

        let input = AddPaymentInput {
            method: method.code.clone(),
            metadata: json!({
                "paymentId": payment.id,
                "paymentAmountReceived": payment.amount,
            }),
        };

        match tx.add_payment_to_order(&order.code, input).await? {
            AddPaymentResult::Added(_) => {
                info!(
                    target: LOG_TARGET,
                    "Payment id {} added to order {}",
                    payment.id.as_deref().unwrap_or("<unknown>"),
                    order.code
                );
                Ok(ReconcileOutcome::Settled {
                    order_code: order.code,
                    payment_id: payment.id.clone(),
                })
            }
            AddPaymentResult::Rejected(rejection) => {
                error!(
                    target: LOG_TARGET,
                    "Error adding payment to order {}: {}", order.code, rejection.message
                );
                Ok(ReconcileOutcome::Rejected {
                    order_code: order.code,
                    message: rejection.message,
                })
            }
        }
    }
}
