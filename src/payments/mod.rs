//! Payment processor integration
//!
//! The Konnect REST client and the types exchanged with it.

pub mod providers;
pub mod traits;
pub mod types;
