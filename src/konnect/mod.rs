//! Konnect integration: payment initiation, webhook reconciliation and the
//! payment method handler the host calls for Konnect payments.

pub mod handler;
pub mod initiation;
pub mod plugin;
pub mod reconciliation;
pub mod resolver;

pub use handler::KonnectPaymentHandler;
pub use initiation::InitiationService;
pub use plugin::KonnectPlugin;
pub use reconciliation::{ReconcileOutcome, WebhookService};

/// Handler code identifying Konnect payment method records
pub const HANDLER_CODE: &str = "konnect";

/// Target used for this integration's log lines
pub const LOG_TARGET: &str = "KonnectPlugin";

/// Schema extension the host merges into its shop API
pub const SHOP_API_EXTENSION: &str = r#"
extend type Mutation {
    initPayment: String!
}
"#;
