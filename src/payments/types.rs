//! Payment processor request/response types
//!
//! The processor has returned payment details both as a flat object and nested under
//! a `payment` key across API versions. [`PaymentEnvelope`] accepts either shape and
//! [`PaymentDetails`] is the single normalized form the rest of the crate uses.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-installation credentials stored on the payment method record.
///
/// Passed with every call; the client never keeps them.
#[derive(Clone, PartialEq, Eq)]
pub struct KonnectCredentials {
    pub api_key: String,
    pub receiver_wallet_id: String,
}

impl fmt::Debug for KonnectCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KonnectCredentials")
            .field("api_key", &"***")
            .field("receiver_wallet_id", &self.receiver_wallet_id)
            .finish()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerDetails {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone_number: Option<String>,
    pub email: Option<String>,
}

/// Request to open a hosted payment session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitPaymentRequest {
    /// Currency code, sent as the processor's `token`
    pub currency: String,
    /// Tax-inclusive amount in minor units
    pub amount: i64,
    pub customer: CustomerDetails,
    /// Host order code echoed back by the processor as `orderId`
    pub order_id: String,
    /// Callback the processor notifies on status changes
    pub webhook_url: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitPaymentResponse {
    #[serde(default)]
    pub pay_url: Option<String>,
    #[serde(default)]
    pub payment_ref: Option<String>,
}

/// Processor-side payment status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentStatus {
    Pending,
    Completed,
    /// Any other value, or no value at all
    Other(Option<String>),
}

impl PaymentStatus {
    pub fn from_wire(value: Option<&str>) -> Self {
        match value {
            Some("pending") => PaymentStatus::Pending,
            Some("completed") => PaymentStatus::Completed,
            other => PaymentStatus::Other(other.map(str::to_string)),
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Completed => write!(f, "completed"),
            PaymentStatus::Other(Some(s)) => write!(f, "{}", s),
            PaymentStatus::Other(None) => write!(f, "<missing>"),
        }
    }
}

/// Normalized payment as reported by the processor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentDetails {
    pub id: Option<String>,
    pub status: PaymentStatus,
    /// Host order code the payment was opened for
    pub order_id: Option<String>,
    /// Amount received, minor units
    pub amount: Option<i64>,
}

/// Payment object as it appears on the wire
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WirePayment {
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    /// Older responses carried the status under `type`
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub order_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_amount")]
    pub amount: Option<i64>,
}

/// Either `{ "payment": {...} }` or the flat payment object
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PaymentEnvelope {
    Nested { payment: WirePayment },
    Flat(WirePayment),
}

impl From<WirePayment> for PaymentDetails {
    fn from(wire: WirePayment) -> Self {
        let status = wire.status.as_deref().or(wire.kind.as_deref());
        PaymentDetails {
            id: wire.id,
            status: PaymentStatus::from_wire(status),
            order_id: wire.order_id,
            amount: wire.amount,
        }
    }
}

impl From<PaymentEnvelope> for PaymentDetails {
    fn from(envelope: PaymentEnvelope) -> Self {
        match envelope {
            PaymentEnvelope::Nested { payment } => payment.into(),
            PaymentEnvelope::Flat(payment) => payment.into(),
        }
    }
}

fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::String(s)) => Ok(Some(s)),
        Some(serde_json::Value::Number(n)) => Ok(Some(n.to_string())),
        Some(other) => Err(de::Error::custom(format!(
            "expected string or number, got {}",
            other
        ))),
    }
}

fn lenient_amount<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(None),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.round() as i64))
            .map(Some)
            .ok_or_else(|| de::Error::custom("amount out of range")),
        Some(serde_json::Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(|f| Some(f.round() as i64))
            .map_err(|_| de::Error::custom(format!("invalid amount '{}'", s))),
        Some(other) => Err(de::Error::custom(format!(
            "expected numeric amount, got {}",
            other
        ))),
    }
}
