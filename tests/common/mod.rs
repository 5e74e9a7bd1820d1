//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use konnect_payments::config::KonnectOptions;
use konnect_payments::error::{AppResult, ExternalError};
use konnect_payments::host::memory::InMemoryHost;
use konnect_payments::host::{
    ConfigArg, ConfigurableOperation, Customer, Order, OrderState, PaymentMethod, RequestContext,
};
use konnect_payments::konnect::KonnectPlugin;
use konnect_payments::payments::providers::konnect::sign_payload;
use konnect_payments::payments::traits::PaymentProvider;
use konnect_payments::payments::types::{
    InitPaymentRequest, InitPaymentResponse, KonnectCredentials, PaymentDetails, PaymentStatus,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub const CHANNEL_ID: &str = "1";
pub const CHANNEL_TOKEN: &str = "default-channel";
pub const USER_ID: &str = "user-1";
pub const ORDER_CODE: &str = "ORD1";
pub const API_KEY: &str = "test-api-key";
pub const WALLET_ID: &str = "wallet-123";

pub fn konnect_method(enabled: bool) -> PaymentMethod {
    PaymentMethod {
        id: "pm-1".to_string(),
        code: "konnect".to_string(),
        name: "Konnect".to_string(),
        enabled,
        handler: ConfigurableOperation {
            code: "konnect".to_string(),
            args: vec![
                ConfigArg::new("apiKey", API_KEY),
                ConfigArg::new("receiverWalletId", WALLET_ID),
            ],
        },
        eligible_currencies: None,
    }
}

pub fn active_order() -> Order {
    Order {
        id: "order-1".to_string(),
        code: ORDER_CODE.to_string(),
        state: OrderState::ArrangingPayment,
        active: true,
        currency_code: "TND".to_string(),
        total: 10_000,
        total_with_tax: 11_900,
        customer: Some(Customer {
            first_name: "Amira".to_string(),
            last_name: "Ben Salah".to_string(),
            email_address: "amira@example.com".to_string(),
            phone_number: Some("+21620000000".to_string()),
        }),
        customer_user_id: Some(USER_ID.to_string()),
        payments: vec![],
    }
}

/// Host with one channel, an enabled Konnect method and an active order
pub async fn seeded_host() -> InMemoryHost {
    let host = InMemoryHost::new().with_handler(KonnectPlugin::payment_handler());
    host.add_channel(CHANNEL_ID, CHANNEL_TOKEN).await;
    host.add_payment_method(CHANNEL_ID, konnect_method(true)).await;
    host.add_order(CHANNEL_ID, active_order()).await;
    host
}

pub fn shop_ctx() -> RequestContext {
    RequestContext::shop_owner(CHANNEL_ID, CHANNEL_TOKEN, USER_ID)
}

pub fn options() -> KonnectOptions {
    KonnectOptions {
        default_channel_token: Some(CHANNEL_TOKEN.to_string()),
        webhook_url: "https://shop.example.com/payments/konnect".to_string(),
        ..KonnectOptions::default()
    }
}

pub fn completed(reference: &str, order_code: &str) -> PaymentDetails {
    PaymentDetails {
        id: Some(reference.to_string()),
        status: PaymentStatus::Completed,
        order_id: Some(order_code.to_string()),
        amount: Some(11_900),
    }
}

pub fn with_status(reference: &str, status: PaymentStatus) -> PaymentDetails {
    PaymentDetails {
        status,
        ..completed(reference, ORDER_CODE)
    }
}

/// In-process payment provider recording every call it receives
#[derive(Default)]
pub struct FakeProvider {
    payments: Mutex<HashMap<String, PaymentDetails>>,
    pay_url: Mutex<Option<String>>,
    fail_fetch: Mutex<bool>,
    webhook_secret: Option<String>,
    pub init_calls: Mutex<Vec<(KonnectCredentials, InitPaymentRequest)>>,
    pub fetch_calls: Mutex<Vec<(KonnectCredentials, String)>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self {
            pay_url: Mutex::new(Some("https://pay.konnect.network/pay/abc".to_string())),
            ..Self::default()
        }
    }

    pub fn with_secret(secret: &str) -> Self {
        Self {
            webhook_secret: Some(secret.to_string()),
            ..Self::new()
        }
    }

    pub fn set_payment(&self, reference: &str, details: PaymentDetails) {
        self.payments
            .lock()
            .unwrap()
            .insert(reference.to_string(), details);
    }

    pub fn set_pay_url(&self, url: Option<&str>) {
        *self.pay_url.lock().unwrap() = url.map(str::to_string);
    }

    pub fn fail_fetches(&self) {
        *self.fail_fetch.lock().unwrap() = true;
    }

    pub fn init_count(&self) -> usize {
        self.init_calls.lock().unwrap().len()
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentProvider for FakeProvider {
    async fn init_payment(
        &self,
        credentials: &KonnectCredentials,
        request: InitPaymentRequest,
    ) -> AppResult<InitPaymentResponse> {
        self.init_calls
            .lock()
            .unwrap()
            .push((credentials.clone(), request));
        Ok(InitPaymentResponse {
            pay_url: self.pay_url.lock().unwrap().clone(),
            payment_ref: Some("ref-init".to_string()),
        })
    }

    async fn fetch_payment(
        &self,
        credentials: &KonnectCredentials,
        reference: &str,
    ) -> AppResult<PaymentDetails> {
        self.fetch_calls
            .lock()
            .unwrap()
            .push((credentials.clone(), reference.to_string()));

        if *self.fail_fetch.lock().unwrap() {
            return Err(ExternalError::PaymentProvider {
                provider: "Konnect".to_string(),
                message: "HTTP 503 Service Unavailable".to_string(),
                is_retryable: true,
            }
            .into());
        }

        Ok(self
            .payments
            .lock()
            .unwrap()
            .get(reference)
            .cloned()
            .unwrap_or_else(|| with_status(reference, PaymentStatus::Other(None))))
    }

    fn validate_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        match &self.webhook_secret {
            Some(secret) => sign_payload(secret, payload).as_deref() == Some(signature),
            None => false,
        }
    }
}

pub fn plugin(
    options: KonnectOptions,
    host: &InMemoryHost,
    provider: &Arc<FakeProvider>,
) -> KonnectPlugin {
    KonnectPlugin::with_provider(options, Arc::new(host.clone()), provider.clone())
}
