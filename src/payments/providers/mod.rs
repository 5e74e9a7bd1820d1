//! Payment provider implementations

pub mod konnect;

pub use konnect::KonnectProvider;
