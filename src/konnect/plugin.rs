use crate::api;
use crate::config::KonnectOptions;
use crate::error::AppResult;
use crate::host::{HostPlatform, PaymentMethodHandler, RequestContext};
use crate::konnect::{
    InitiationService, KonnectPaymentHandler, WebhookService, SHOP_API_EXTENSION,
};
use crate::payments::providers::KonnectProvider;
use crate::payments::traits::PaymentProvider;
use axum::Router;
use std::sync::Arc;

/// Wires the Konnect integration into a host.
///
/// The host hands over its platform adapter; the plugin hands back the webhook
/// routes, the `initPayment` resolver, the payment method handler and the shop
/// schema extension.
#[derive(Clone)]
pub struct KonnectPlugin {
    options: Arc<KonnectOptions>,
    provider: Arc<dyn PaymentProvider>,
    initiation: InitiationService,
    webhook: WebhookService,
}

impl KonnectPlugin {
    /// Build the plugin with the Konnect REST client
    pub fn init(options: KonnectOptions, host: Arc<dyn HostPlatform>) -> AppResult<Self> {
        let provider = Arc::new(KonnectProvider::new(&options)?);
        Ok(Self::with_provider(options, host, provider))
    }

    /// Build the plugin around any payment provider implementation
    pub fn with_provider(
        options: KonnectOptions,
        host: Arc<dyn HostPlatform>,
        provider: Arc<dyn PaymentProvider>,
    ) -> Self {
        let initiation =
            InitiationService::new(host.clone(), provider.clone(), options.webhook_url.clone());
        let webhook = WebhookService::new(host, provider.clone(), options.deduplicate_settlements);

        Self {
            options: Arc::new(options),
            provider,
            initiation,
            webhook,
        }
    }

    pub fn options(&self) -> &KonnectOptions {
        &self.options
    }

    pub fn provider(&self) -> Arc<dyn PaymentProvider> {
        self.provider.clone()
    }

    pub fn webhook_service(&self) -> &WebhookService {
        &self.webhook
    }

    /// Handler the host must register for payment methods with code `konnect`
    pub fn payment_handler() -> Arc<dyn PaymentMethodHandler> {
        Arc::new(KonnectPaymentHandler)
    }

    pub fn shop_api_extensions() -> &'static str {
        SHOP_API_EXTENSION
    }

    /// `initPayment` mutation resolver
    pub async fn init_payment(&self, ctx: &RequestContext) -> AppResult<Option<String>> {
        self.initiation.init_payment(ctx).await
    }

    /// Webhook routes, ready to merge into the host's router
    pub fn router(&self) -> Router {
        api::webhook::routes(self.clone())
    }
}
