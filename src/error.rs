//! Application error types
//!
//! Every flow in the crate returns [`AppResult`]. Errors are grouped by where they
//! originate so the HTTP layer can pick a status code without string matching.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use std::fmt;
use thiserror::Error;

use crate::database::error::DatabaseError;

/// Result type used across the crate
pub type AppResult<T> = Result<T, AppError>;

/// Errors caused by the caller or by the state of host-owned entities
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("You are not currently authorized to perform this action")]
    Unauthorized,

    #[error("{message}")]
    InvalidInput { message: String },

    #[error("{entity} '{id}' not found")]
    NotFound { entity: String, id: String },

    #[error("Webhook signature verification failed: {reason}")]
    InvalidSignature { reason: String },

    #[error("Operation not allowed: {message}")]
    NotAllowed { message: String },
}

/// Errors coming from the payment processor
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExternalError {
    #[error("{provider} API error: {message}")]
    PaymentProvider {
        provider: String,
        message: String,
        is_retryable: bool,
    },

    #[error("{provider} request failed: {message}")]
    Transport { provider: String, message: String },

    #[error("{provider} returned an unexpected response: {message}")]
    InvalidResponse { provider: String, message: String },
}

/// Errors in the service's own plumbing
#[derive(Debug, Clone, Error)]
pub enum InfrastructureError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Host platform error: {message}")]
    Host { message: String },
}

#[derive(Debug, Clone, Error)]
pub enum AppErrorKind {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error(transparent)]
    External(#[from] ExternalError),

    #[error(transparent)]
    Infrastructure(#[from] InfrastructureError),
}

#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub context: Option<String>,
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    pub fn with_context<S: Into<String>>(mut self, context: S) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn unauthorized() -> Self {
        Self::new(AppErrorKind::Domain(DomainError::Unauthorized))
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Domain(DomainError::InvalidInput {
            message: message.into(),
        }))
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Domain(DomainError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }))
    }

    pub fn not_allowed(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Domain(DomainError::NotAllowed {
            message: message.into(),
        }))
    }

    pub fn invalid_signature(reason: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Domain(DomainError::InvalidSignature {
            reason: reason.into(),
        }))
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Infrastructure(
            InfrastructureError::Configuration {
                message: message.into(),
            },
        ))
    }

    pub fn host(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Infrastructure(InfrastructureError::Host {
            message: message.into(),
        }))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, AppErrorKind::Domain(DomainError::NotFound { .. }))
    }

    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::External(ExternalError::PaymentProvider { is_retryable, .. }) => {
                *is_retryable
            }
            AppErrorKind::External(ExternalError::Transport { .. }) => true,
            AppErrorKind::Infrastructure(InfrastructureError::Database(e)) => e.is_retryable(),
            _ => false,
        }
    }

    /// HTTP status this error maps to when surfaced to a caller
    pub fn status_code(&self) -> StatusCode {
        match &self.kind {
            AppErrorKind::Domain(DomainError::Unauthorized) => StatusCode::UNAUTHORIZED,
            AppErrorKind::Domain(DomainError::InvalidSignature { .. }) => StatusCode::UNAUTHORIZED,
            AppErrorKind::Domain(DomainError::InvalidInput { .. }) => StatusCode::BAD_REQUEST,
            AppErrorKind::Domain(DomainError::NotAllowed { .. }) => StatusCode::FORBIDDEN,
            AppErrorKind::Domain(DomainError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AppErrorKind::External(_) => StatusCode::BAD_GATEWAY,
            AppErrorKind::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match &self.kind {
            AppErrorKind::Domain(DomainError::Unauthorized) => "FORBIDDEN",
            AppErrorKind::Domain(DomainError::InvalidSignature { .. }) => "INVALID_SIGNATURE",
            AppErrorKind::Domain(DomainError::InvalidInput { .. }) => "USER_INPUT_ERROR",
            AppErrorKind::Domain(DomainError::NotAllowed { .. }) => "NOT_ALLOWED",
            AppErrorKind::Domain(DomainError::NotFound { .. }) => "ENTITY_NOT_FOUND",
            AppErrorKind::External(_) => "PAYMENT_PROVIDER_ERROR",
            AppErrorKind::Infrastructure(_) => "INTERNAL_SERVER_ERROR",
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(context) = &self.context {
            write!(f, "{} ({})", self.kind, context)
        } else {
            write!(f, "{}", self.kind)
        }
    }
}

impl std::error::Error for AppError {}

impl From<AppErrorKind> for AppError {
    fn from(kind: AppErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        Self::new(AppErrorKind::Domain(err))
    }
}

impl From<ExternalError> for AppError {
    fn from(err: ExternalError) -> Self {
        Self::new(AppErrorKind::External(err))
    }
}

impl From<InfrastructureError> for AppError {
    fn from(err: InfrastructureError) -> Self {
        Self::new(AppErrorKind::Infrastructure(err))
    }
}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        Self::new(AppErrorKind::Infrastructure(InfrastructureError::Database(err)))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": {
                "code": self.code(),
                "message": self.to_string(),
            }
        }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(AppError::unauthorized().status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::invalid_input("No active order found for session").status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::not_found("Order", "ABC123").status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::configuration("missing").status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );

        let external = AppError::from(ExternalError::Transport {
            provider: "Konnect".to_string(),
            message: "connection refused".to_string(),
        });
        assert_eq!(external.status_code(), StatusCode::BAD_GATEWAY);
        assert!(external.is_retryable());
    }

    #[test]
    fn test_display_with_context() {
        let err = AppError::not_found("Order", "ABC123").with_context("settling payment ref-1");
        assert_eq!(
            err.to_string(),
            "Order 'ABC123' not found (settling payment ref-1)"
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn test_invalid_input_message_is_verbatim() {
        let err = AppError::invalid_input("No enabled Konnect payment method found");
        assert_eq!(err.to_string(), "No enabled Konnect payment method found");
    }
}
