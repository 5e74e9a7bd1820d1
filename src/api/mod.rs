//! HTTP surface

pub mod health;
pub mod webhook;

use crate::konnect::KonnectPlugin;
use axum::routing::get;
use axum::Router;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use self::health::HealthState;

/// Full service router: health probe plus the Konnect webhook routes
pub fn router(plugin: &KonnectPlugin, health: HealthState) -> Router {
    let health_routes = Router::new()
        .route("/health", get(health::health_check))
        .with_state(health);

    Router::new()
        .merge(health_routes)
        .merge(plugin.router())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KonnectOptions;
    use crate::host::memory::InMemoryHost;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let plugin =
            KonnectPlugin::init(KonnectOptions::default(), Arc::new(InMemoryHost::new())).unwrap();
        let health = HealthState {
            environment: "development".to_string(),
            konnect_base_url: plugin.options().base_url.clone(),
            pool: None,
        };
        router(&plugin, health)
    }

    #[tokio::test]
    async fn test_health_reports_configuration() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key("x-request-id"));

        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let health: health::HealthResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(health.status, "healthy");
        assert!(health.konnect_configured);
        assert!(health.database.is_none());
    }

    #[tokio::test]
    async fn test_webhook_without_installation_is_bad_request() {
        let response = app()
            .oneshot(
                Request::get("/payments/konnect?payment_ref=ref-1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
