//! Host-platform entities read and mutated by the Konnect flows

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which API surface a request came in through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiType {
    Shop,
    Admin,
}

impl fmt::Display for ApiType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiType::Shop => write!(f, "shop"),
            ApiType::Admin => write!(f, "admin"),
        }
    }
}

/// Per-request context scoped to one installation (channel) of the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    pub channel_id: String,
    pub channel_token: String,
    pub api_type: ApiType,
    /// Authenticated user, if any
    pub user_id: Option<String>,
    /// True when the caller is only authorized through ownership of their own entities
    pub authorized_as_owner_only: bool,
}

impl RequestContext {
    /// Shop context for an authenticated customer acting on their own session
    pub fn shop_owner(channel_id: &str, channel_token: &str, user_id: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            channel_token: channel_token.to_string(),
            api_type: ApiType::Shop,
            user_id: Some(user_id.to_string()),
            authorized_as_owner_only: true,
        }
    }

    /// Administrative context with no associated user
    pub fn admin(channel_id: &str, channel_token: &str) -> Self {
        Self {
            channel_id: channel_id.to_string(),
            channel_token: channel_token.to_string(),
            api_type: ApiType::Admin,
            user_id: None,
            authorized_as_owner_only: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub first_name: String,
    pub last_name: String,
    pub email_address: String,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderState {
    AddingItems,
    ArrangingPayment,
    PaymentAuthorized,
    PaymentSettled,
    Cancelled,
}

impl OrderState {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderState::AddingItems => "AddingItems",
            OrderState::ArrangingPayment => "ArrangingPayment",
            OrderState::PaymentAuthorized => "PaymentAuthorized",
            OrderState::PaymentSettled => "PaymentSettled",
            OrderState::Cancelled => "Cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "AddingItems" => Some(OrderState::AddingItems),
            "ArrangingPayment" => Some(OrderState::ArrangingPayment),
            "PaymentAuthorized" => Some(OrderState::PaymentAuthorized),
            "PaymentSettled" => Some(OrderState::PaymentSettled),
            "Cancelled" => Some(OrderState::Cancelled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentState {
    Created,
    Authorized,
    Settled,
    Declined,
    Error,
    Cancelled,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Created => "Created",
            PaymentState::Authorized => "Authorized",
            PaymentState::Settled => "Settled",
            PaymentState::Declined => "Declined",
            PaymentState::Error => "Error",
            PaymentState::Cancelled => "Cancelled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Created" => Some(PaymentState::Created),
            "Authorized" => Some(PaymentState::Authorized),
            "Settled" => Some(PaymentState::Settled),
            "Declined" => Some(PaymentState::Declined),
            "Error" => Some(PaymentState::Error),
            "Cancelled" => Some(PaymentState::Cancelled),
            _ => None,
        }
    }
}

/// Payment record attached to an order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub method: String,
    /// Amount in minor currency units
    pub amount: i64,
    pub state: PaymentState,
    pub transaction_id: Option<String>,
    pub metadata: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub code: String,
    pub state: OrderState,
    pub active: bool,
    pub currency_code: String,
    /// Total before tax, minor units
    pub total: i64,
    /// Tax-inclusive total, minor units
    pub total_with_tax: i64,
    pub customer: Option<Customer>,
    pub customer_user_id: Option<String>,
    pub payments: Vec<Payment>,
}

impl Order {
    /// Sum of all settled payments
    pub fn settled_amount(&self) -> i64 {
        self.payments
            .iter()
            .filter(|p| p.state == PaymentState::Settled)
            .map(|p| p.amount)
            .sum()
    }
}

/// One stored argument of a configurable operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigArg {
    pub name: String,
    pub value: String,
}

impl ConfigArg {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: value.to_string(),
        }
    }
}

/// Handler reference stored on a payment method: handler code plus its arguments
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigurableOperation {
    pub code: String,
    pub args: Vec<ConfigArg>,
}

/// Configured payment method record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: String,
    pub code: String,
    pub name: String,
    pub enabled: bool,
    pub handler: ConfigurableOperation,
    /// Currencies the method is restricted to; `None` means no restriction
    pub eligible_currencies: Option<Vec<String>>,
}

impl PaymentMethod {
    /// Host eligibility rule: enabled, and currency allowed when restricted
    pub fn is_eligible_for(&self, order: &Order) -> bool {
        if !self.enabled {
            return false;
        }
        match &self.eligible_currencies {
            Some(currencies) => currencies
                .iter()
                .any(|c| c.eq_ignore_ascii_case(&order.currency_code)),
            None => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddPaymentInput {
    /// Payment method code
    pub method: String,
    pub metadata: serde_json::Value,
}

/// Domain-level rejection reported by the host instead of an error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRejection {
    pub error_code: String,
    pub message: String,
}

impl PaymentRejection {
    pub fn new(error_code: &str, message: impl Into<String>) -> Self {
        Self {
            error_code: error_code.to_string(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AddPaymentResult {
    Added(Order),
    Rejected(PaymentRejection),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(currency: &str) -> Order {
        Order {
            id: "1".to_string(),
            code: "ORD1".to_string(),
            state: OrderState::ArrangingPayment,
            active: true,
            currency_code: currency.to_string(),
            total: 1000,
            total_with_tax: 1190,
            customer: None,
            customer_user_id: None,
            payments: vec![],
        }
    }

    fn method(enabled: bool, currencies: Option<Vec<&str>>) -> PaymentMethod {
        PaymentMethod {
            id: "pm-1".to_string(),
            code: "konnect-tnd".to_string(),
            name: "Konnect".to_string(),
            enabled,
            handler: ConfigurableOperation {
                code: "konnect".to_string(),
                args: vec![],
            },
            eligible_currencies: currencies
                .map(|c| c.into_iter().map(str::to_string).collect()),
        }
    }

    #[test]
    fn test_eligibility_respects_currency_restriction() {
        assert!(method(true, None).is_eligible_for(&order("TND")));
        assert!(method(true, Some(vec!["tnd"])).is_eligible_for(&order("TND")));
        assert!(!method(true, Some(vec!["EUR"])).is_eligible_for(&order("TND")));
        assert!(!method(false, None).is_eligible_for(&order("TND")));
    }

    #[test]
    fn test_settled_amount_ignores_declined_payments() {
        let mut o = order("TND");
        o.payments.push(Payment {
            id: "p1".to_string(),
            method: "konnect-tnd".to_string(),
            amount: 500,
            state: PaymentState::Declined,
            transaction_id: None,
            metadata: serde_json::Value::Null,
        });
        o.payments.push(Payment {
            id: "p2".to_string(),
            method: "konnect-tnd".to_string(),
            amount: 1190,
            state: PaymentState::Settled,
            transaction_id: None,
            metadata: serde_json::Value::Null,
        });
        assert_eq!(o.settled_amount(), 1190);
    }

    #[test]
    fn test_order_state_round_trips_through_str() {
        for state in [
            OrderState::AddingItems,
            OrderState::ArrangingPayment,
            OrderState::PaymentSettled,
        ] {
            assert_eq!(OrderState::parse(state.as_str()), Some(state));
        }
        assert_eq!(OrderState::parse("Shipped"), None);
    }
}
