//! Konnect payment gateway integration for a host order-management platform.
//!
//! Customers start a payment with `initPayment`, which returns the hosted Konnect
//! payment page. Konnect reports the outcome to `GET /payments/konnect`, and a
//! completed payment is appended to its order exactly once.

pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod host;
pub mod konnect;
pub mod payments;

pub use crate::config::{AppConfig, KonnectOptions, SettlementFailurePolicy};
pub use crate::error::{AppError, AppResult};
pub use crate::konnect::KonnectPlugin;
