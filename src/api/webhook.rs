//! Inbound Konnect webhook
//!
//! `GET /payments/konnect?payment_ref=..[&channel=..]` and
//! `GET /payments/konnect/:channel_token?payment_ref=..`. Every delivery that reaches
//! reconciliation is answered with `200 Ok` unless the reject policy is configured.

use crate::config::SettlementFailurePolicy;
use crate::error::AppError;
use crate::konnect::{KonnectPlugin, LOG_TARGET};
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use http::{HeaderMap, StatusCode};
use tracing::{debug, error, warn};

pub const SIGNATURE_HEADER: &str = "x-konnect-signature";

#[derive(Debug, Default, PartialEq, Eq)]
pub struct WebhookQuery {
    pub payment_ref: Option<String>,
    /// Channel token of the installation, when not given in the path
    pub channel: Option<String>,
}

impl WebhookQuery {
    /// First occurrence of each known key wins; repeated and unknown keys are ignored
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Self {
        let mut query = Self::default();
        for (key, value) in pairs {
            let slot = match key.as_str() {
                "payment_ref" => &mut query.payment_ref,
                "channel" => &mut query.channel,
                _ => continue,
            };
            slot.get_or_insert(value);
        }
        query
    }
}

pub fn routes(plugin: KonnectPlugin) -> Router {
    Router::new()
        .route("/payments/konnect", get(webhook))
        .route("/payments/konnect/:channel_token", get(webhook_for_channel))
        .with_state(plugin)
}

#[tracing::instrument(name = "konnect_webhook", skip_all)]
pub async fn webhook(
    State(plugin): State<KonnectPlugin>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let query = WebhookQuery::from_pairs(pairs);
    let channel_token = query
        .channel
        .clone()
        .or_else(|| plugin.options().default_channel_token.clone());
    handle(&plugin, channel_token, query, &headers, &body).await
}

#[tracing::instrument(name = "konnect_webhook", skip_all, fields(channel = %channel_token))]
pub async fn webhook_for_channel(
    State(plugin): State<KonnectPlugin>,
    Path(channel_token): Path<String>,
    Query(pairs): Query<Vec<(String, String)>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let query = WebhookQuery::from_pairs(pairs);
    handle(&plugin, Some(channel_token), query, &headers, &body).await
}

async fn handle(
    plugin: &KonnectPlugin,
    channel_token: Option<String>,
    query: WebhookQuery,
    headers: &HeaderMap,
    body: &[u8],
) -> Response {
    let Some(channel_token) = channel_token else {
        warn!(target: LOG_TARGET, "Konnect webhook does not identify an installation");
        return (StatusCode::BAD_REQUEST, "Unknown installation").into_response();
    };

    if plugin.options().webhook_secret.is_some() {
        if let Err(e) = verify_signature(plugin, &query, headers, body) {
            warn!(target: LOG_TARGET, "Rejecting Konnect webhook: {}", e);
            return e.into_response();
        }
    }

    let service = plugin.webhook_service();
    let ctx = match service.resolve_context(&channel_token).await {
        Ok(ctx) => ctx,
        Err(e) => {
            warn!(target: LOG_TARGET, "Rejecting Konnect webhook: {}", e);
            return (StatusCode::BAD_REQUEST, "Unknown installation").into_response();
        }
    };

    match service.reconcile(&ctx, query.payment_ref.as_deref()).await {
        Ok(outcome) => {
            debug!(target: LOG_TARGET, ?outcome, "Konnect webhook handled");
            acknowledge()
        }
        Err(e) => {
            error!(
                target: LOG_TARGET,
                payment_ref = query.payment_ref.as_deref().unwrap_or(""),
                "Konnect webhook could not be reconciled: {}",
                e
            );
            match plugin.options().settlement_failure_policy {
                SettlementFailurePolicy::Acknowledge => acknowledge(),
                SettlementFailurePolicy::Reject => e.into_response(),
            }
        }
    }
}

/// Checks `x-konnect-signature` over the raw body, or over the payment reference
/// when the delivery has no body.
fn verify_signature(
    plugin: &KonnectPlugin,
    query: &WebhookQuery,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<(), AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::invalid_signature(format!("missing {} header", SIGNATURE_HEADER)))?;

    let signed: &[u8] = if body.is_empty() {
        query.payment_ref.as_deref().unwrap_or_default().as_bytes()
    } else {
        body
    };

    if plugin.provider().validate_webhook_signature(signed, signature) {
        Ok(())
    } else {
        Err(AppError::invalid_signature("signature mismatch"))
    }
}

fn acknowledge() -> Response {
    (StatusCode::OK, "Ok").into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_repeated_keys_keep_first_value() {
        let query = WebhookQuery::from_pairs(pairs(&[
            ("payment_ref", "ref-1"),
            ("payment_ref", "ref-2"),
            ("channel", "default-channel"),
            ("channel", "other"),
        ]));
        assert_eq!(query.payment_ref.as_deref(), Some("ref-1"));
        assert_eq!(query.channel.as_deref(), Some("default-channel"));
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let query = WebhookQuery::from_pairs(pairs(&[("utm_source", "mail")]));
        assert_eq!(query, WebhookQuery::default());
    }
}
