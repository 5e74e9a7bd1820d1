//! Payment provider trait definitions
//!
//! Defines the interface the Konnect flows use to talk to the payment processor.

use crate::error::AppResult;
use crate::payments::types::{
    InitPaymentRequest, InitPaymentResponse, KonnectCredentials, PaymentDetails,
};
use async_trait::async_trait;

/// Stateless client for the payment processor's REST API
///
/// Credentials travel with each call; implementations must not cache them.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Open a hosted payment session
    ///
    /// # Arguments
    /// * `credentials` - API key and receiver wallet of the installation
    /// * `request` - Amount, currency, customer details and callback URL
    ///
    /// # Returns
    /// * `InitPaymentResponse` - Contains the hosted payment URL when the processor returned one
    async fn init_payment(
        &self,
        credentials: &KonnectCredentials,
        request: InitPaymentRequest,
    ) -> AppResult<InitPaymentResponse>;

    /// Fetch the current state of a payment by its processor reference
    async fn fetch_payment(
        &self,
        credentials: &KonnectCredentials,
        reference: &str,
    ) -> AppResult<PaymentDetails>;

    /// Validate webhook signature
    ///
    /// Verifies that a webhook request is authentic and came from the payment provider.
    ///
    /// # Arguments
    /// * `payload` - Raw signed bytes
    /// * `signature` - Signature from webhook header
    ///
    /// # Returns
    /// * `bool` - True if signature is valid, false otherwise
    fn validate_webhook_signature(&self, payload: &[u8], signature: &str) -> bool;
}
