//! Shop-side payment initiation: turns the caller's active order into a hosted
//! Konnect payment page URL.

use crate::error::{AppError, AppResult};
use crate::host::{HostPlatform, Order, RequestContext};
use crate::konnect::{resolver, LOG_TARGET};
use crate::payments::traits::PaymentProvider;
use crate::payments::types::{CustomerDetails, InitPaymentRequest, KonnectCredentials};
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct InitiationService {
    host: Arc<dyn HostPlatform>,
    provider: Arc<dyn PaymentProvider>,
    webhook_url: String,
}

impl InitiationService {
    pub fn new(
        host: Arc<dyn HostPlatform>,
        provider: Arc<dyn PaymentProvider>,
        webhook_url: impl Into<String>,
    ) -> Self {
        Self {
            host,
            provider,
            webhook_url: webhook_url.into(),
        }
    }

    /// Resolver for the `initPayment` shop mutation.
    ///
    /// Returns the hosted payment URL, or `None` when Konnect did not send one back.
    pub async fn init_payment(&self, ctx: &RequestContext) -> AppResult<Option<String>> {
        if !ctx.authorized_as_owner_only {
            return Err(AppError::unauthorized());
        }

        let order = self
            .host
            .active_order(ctx)
            .await?
            .ok_or_else(|| AppError::invalid_input("No active order found for session"))?;

        let credentials = self.credentials_for(ctx, &order).await?;

        let request = InitPaymentRequest {
            currency: order.currency_code.clone(),
            amount: order.total_with_tax,
            customer: customer_details(&order),
            order_id: order.code.clone(),
            webhook_url: self.webhook_url.clone(),
        };

        let response = self.provider.init_payment(&credentials, request).await?;
        if response.pay_url.is_none() {
            info!(
                target: LOG_TARGET,
                order_code = %order.code,
                "Konnect returned no payUrl"
            );
        }
        Ok(response.pay_url)
    }

    /// Credentials of the enabled Konnect method, provided it is eligible for `order`
    async fn credentials_for(
        &self,
        ctx: &RequestContext,
        order: &Order,
    ) -> AppResult<KonnectCredentials> {
        let (eligible, enabled) = tokio::try_join!(
            self.host.eligible_payment_methods(ctx, order),
            self.host.payment_methods(ctx, true),
        )?;

        let method = resolver::find_konnect_method(&enabled)
            .map_err(|_| AppError::invalid_input("No enabled Konnect payment method found"))?;

        if !eligible.iter().any(|pm| pm.code == method.code) {
            return Err(AppError::invalid_input(format!(
                "Konnect payment method is not eligible for order {}",
                order.code
            )));
        }

        KonnectCredentials::from_method(method)
    }
}

fn customer_details(order: &Order) -> CustomerDetails {
    match &order.customer {
        Some(customer) => CustomerDetails {
            first_name: Some(customer.first_name.clone()),
            last_name: Some(customer.last_name.clone()),
            phone_number: customer.phone_number.clone(),
            email: Some(customer.email_address.clone()),
        },
        None => CustomerDetails::default(),
    }
}
