//! Konnect payment provider implementation
//!
//! Thin wrapper over the Konnect REST API: open a hosted payment session and look up
//! a payment by reference. Calls are made once; failures propagate to the caller.

use crate::config::KonnectOptions;
use crate::error::{AppError, AppResult, ExternalError};
use crate::payments::traits::PaymentProvider;
use crate::payments::types::{
    InitPaymentRequest, InitPaymentResponse, KonnectCredentials, PaymentDetails, PaymentEnvelope,
};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::Sha256;
use std::time::Duration;
use tracing::{debug, error, info};

const PROVIDER: &str = "Konnect";
const API_KEY_HEADER: &str = "x-api-key";

type HmacSha256 = Hmac<Sha256>;

/// Session settings sent with every init-payment call
#[derive(Debug, Clone)]
struct SessionSettings {
    accepted_payment_methods: Vec<String>,
    lifespan: u32,
    add_payment_fees_to_amount: bool,
    silent_webhook: bool,
    success_url: String,
    fail_url: String,
    theme: String,
}

pub struct KonnectProvider {
    base_url: String,
    session: SessionSettings,
    webhook_secret: Option<String>,
    client: Client,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct InitPaymentBody<'a> {
    receiver_wallet_id: &'a str,
    token: &'a str,
    amount: i64,
    #[serde(rename = "type")]
    kind: &'static str,
    accepted_payment_methods: &'a [String],
    lifespan: u32,
    add_payment_fees_to_amount: bool,
    first_name: Option<&'a str>,
    last_name: Option<&'a str>,
    phone_number: Option<&'a str>,
    email: Option<&'a str>,
    order_id: &'a str,
    webhook: &'a str,
    silent_webhook: bool,
    success_url: &'a str,
    fail_url: &'a str,
    theme: &'a str,
}

impl KonnectProvider {
    pub fn new(options: &KonnectOptions) -> AppResult<Self> {
        let mut builder = Client::builder().user_agent(concat!(
            env!("CARGO_PKG_NAME"),
            "/",
            env!("CARGO_PKG_VERSION")
        ));
        if let Some(secs) = options.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder.build().map_err(|e| {
            AppError::configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        Ok(Self {
            base_url: options.base_url.trim_end_matches('/').to_string(),
            session: SessionSettings {
                accepted_payment_methods: options.accepted_payment_methods.clone(),
                lifespan: options.lifespan,
                add_payment_fees_to_amount: options.add_payment_fees_to_amount,
                silent_webhook: options.silent_webhook,
                success_url: options.success_url.clone(),
                fail_url: options.fail_url.clone(),
                theme: options.theme.clone(),
            },
            webhook_secret: options.webhook_secret.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `base_url` with `segments` appended, each percent-encoded as a single path segment
    fn endpoint(&self, segments: &[&str]) -> AppResult<Url> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            AppError::configuration(format!("Invalid Konnect base URL {}: {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                AppError::configuration(format!(
                    "Konnect base URL {} cannot carry a path",
                    self.base_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Make an authenticated request to the Konnect API
    async fn make_request<T, B>(
        &self,
        method: Method,
        url: Url,
        api_key: &str,
        body: Option<&B>,
    ) -> AppResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        debug!(%method, %url, "calling Konnect");

        let mut request = self
            .client
            .request(method, url.clone())
            .header(API_KEY_HEADER, api_key);
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|e| {
            error!("Konnect request to {} failed: {}", url, e);
            AppError::from(ExternalError::Transport {
                provider: PROVIDER.to_string(),
                message: e.to_string(),
            })
        })?;

        let status = response.status();
        let response_text = response.text().await.map_err(|e| {
            AppError::from(ExternalError::Transport {
                provider: PROVIDER.to_string(),
                message: format!("Failed to read response body: {}", e),
            })
        })?;

        if !status.is_success() {
            error!("Konnect API error: HTTP {}: {}", status, response_text);
            return Err(ExternalError::PaymentProvider {
                provider: PROVIDER.to_string(),
                message: format!("HTTP {}: {}", status, response_text),
                is_retryable: status.is_server_error() || status.as_u16() == 429,
            }
            .into());
        }

        serde_json::from_str::<T>(&response_text).map_err(|e| {
            error!("Failed to parse Konnect response: {}", e);
            ExternalError::InvalidResponse {
                provider: PROVIDER.to_string(),
                message: format!("Invalid response format: {}", e),
            }
            .into()
        })
    }
}

#[async_trait]
impl PaymentProvider for KonnectProvider {
    async fn init_payment(
        &self,
        credentials: &KonnectCredentials,
        request: InitPaymentRequest,
    ) -> AppResult<InitPaymentResponse> {
        info!(
            "Initiating Konnect payment: {} {} order={}",
            request.amount, request.currency, request.order_id
        );

        let body = InitPaymentBody {
            receiver_wallet_id: &credentials.receiver_wallet_id,
            token: &request.currency,
            amount: request.amount,
            kind: "immediate",
            accepted_payment_methods: &self.session.accepted_payment_methods,
            lifespan: self.session.lifespan,
            add_payment_fees_to_amount: self.session.add_payment_fees_to_amount,
            first_name: request.customer.first_name.as_deref(),
            last_name: request.customer.last_name.as_deref(),
            phone_number: request.customer.phone_number.as_deref(),
            email: request.customer.email.as_deref(),
            order_id: &request.order_id,
            webhook: &request.webhook_url,
            silent_webhook: self.session.silent_webhook,
            success_url: &self.session.success_url,
            fail_url: &self.session.fail_url,
            theme: &self.session.theme,
        };

        let response: InitPaymentResponse = self
            .make_request(
                Method::POST,
                self.endpoint(&["payments", "init-payment"])?,
                &credentials.api_key,
                Some(&body),
            )
            .await?;

        info!(
            "Konnect payment initiated: order={}, payment_ref={}",
            request.order_id,
            response.payment_ref.as_deref().unwrap_or("<none>")
        );

        Ok(response)
    }

    async fn fetch_payment(
        &self,
        credentials: &KonnectCredentials,
        reference: &str,
    ) -> AppResult<PaymentDetails> {
        info!("Fetching Konnect payment: reference={}", reference);

        // `.` and `..` are dropped by segment encoding and would address the collection
        if matches!(reference, "" | "." | "..") {
            return Err(AppError::invalid_input(format!(
                "Invalid Konnect payment reference '{}'",
                reference
            )));
        }

        let envelope: PaymentEnvelope = self
            .make_request::<_, ()>(
                Method::GET,
                self.endpoint(&["payments", reference])?,
                &credentials.api_key,
                None,
            )
            .await?;

        let details = PaymentDetails::from(envelope);
        info!(
            "Konnect payment fetched: reference={}, status={}",
            reference, details.status
        );
        Ok(details)
    }

    fn validate_webhook_signature(&self, payload: &[u8], signature: &str) -> bool {
        let Some(secret) = self.webhook_secret.as_deref() else {
            return false;
        };
        let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
            return false;
        };
        mac.update(payload);

        let Ok(provided) = hex::decode(signature.trim()) else {
            return false;
        };
        mac.verify_slice(&provided).is_ok()
    }
}

/// Hex-encoded HMAC-SHA256 of `payload` under `secret`, as Konnect signs webhooks
pub fn sign_payload(secret: &str, payload: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(hex::encode(mac.finalize().into_bytes()))
}
