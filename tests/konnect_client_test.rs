//! Konnect REST client against a local mock of the Konnect API

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::routing::{get, post};
use axum::{Json, Router};
use konnect_payments::config::KonnectOptions;
use konnect_payments::payments::providers::konnect::sign_payload;
use konnect_payments::payments::providers::KonnectProvider;
use konnect_payments::payments::traits::PaymentProvider;
use konnect_payments::payments::types::{
    CustomerDetails, InitPaymentRequest, KonnectCredentials, PaymentStatus,
};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct Recorded {
    init_bodies: Arc<Mutex<Vec<Value>>>,
    api_keys: Arc<Mutex<Vec<String>>>,
}

async fn init_payment(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    record_key(&recorded, &headers);
    recorded.init_bodies.lock().unwrap().push(body);
    Json(json!({
        "payUrl": "https://gateway.sandbox.konnect.network/pay?payment_ref=ref-1",
        "paymentRef": "ref-1"
    }))
}

async fn payment(
    State(recorded): State<Recorded>,
    headers: HeaderMap,
    Path(reference): Path<String>,
) -> (StatusCode, Json<Value>) {
    record_key(&recorded, &headers);
    match reference.as_str() {
        "nested" => (
            StatusCode::OK,
            Json(json!({
                "payment": {
                    "id": "nested",
                    "status": "completed",
                    "orderId": "ORD1",
                    "amount": 11900
                }
            })),
        ),
        "flat" => (
            StatusCode::OK,
            Json(json!({ "_id": "flat", "status": "pending", "orderId": "ORD2" })),
        ),
        "legacy" => (
            StatusCode::OK,
            Json(json!({ "payment": { "id": "legacy", "type": "completed", "orderId": 42 } })),
        ),
        _ => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "errors": [{ "message": "boom" }] })),
        ),
    }
}

fn record_key(recorded: &Recorded, headers: &HeaderMap) {
    if let Some(key) = headers.get("x-api-key").and_then(|v| v.to_str().ok()) {
        recorded.api_keys.lock().unwrap().push(key.to_string());
    }
}

async fn spawn_mock() -> (String, Recorded) {
    let recorded = Recorded::default();
    let app = Router::new()
        .route("/api/v2/payments/init-payment", post(init_payment))
        .route("/api/v2/payments/:reference", get(payment))
        .with_state(recorded.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/api/v2/", addr), recorded)
}

fn credentials() -> KonnectCredentials {
    KonnectCredentials {
        api_key: "key-123".to_string(),
        receiver_wallet_id: "wallet-9".to_string(),
    }
}

fn provider(base_url: &str) -> KonnectProvider {
    KonnectProvider::new(&KonnectOptions {
        base_url: base_url.to_string(),
        request_timeout_secs: Some(5),
        webhook_secret: Some("whsec".to_string()),
        ..KonnectOptions::default()
    })
    .unwrap()
}

#[tokio::test]
async fn test_init_payment_sends_session_body() {
    let (base_url, recorded) = spawn_mock().await;
    let provider = provider(&base_url);

    let response = provider
        .init_payment(
            &credentials(),
            InitPaymentRequest {
                currency: "TND".to_string(),
                amount: 11_900,
                customer: CustomerDetails {
                    first_name: Some("Amira".to_string()),
                    last_name: Some("Ben Salah".to_string()),
                    phone_number: None,
                    email: Some("amira@example.com".to_string()),
                },
                order_id: "ORD1".to_string(),
                webhook_url: "https://shop.example.com/payments/konnect".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(response.payment_ref.as_deref(), Some("ref-1"));
    assert!(response.pay_url.unwrap().contains("payment_ref=ref-1"));

    let bodies = recorded.init_bodies.lock().unwrap();
    let body = &bodies[0];
    assert_eq!(body["receiverWalletId"], "wallet-9");
    assert_eq!(body["token"], "TND");
    assert_eq!(body["amount"], 11_900);
    assert_eq!(body["type"], "immediate");
    assert_eq!(body["acceptedPaymentMethods"], json!(["bank_card"]));
    assert_eq!(body["lifespan"], 10);
    assert_eq!(body["addPaymentFeesToAmount"], true);
    assert_eq!(body["silentWebhook"], true);
    assert_eq!(body["orderId"], "ORD1");
    assert_eq!(body["webhook"], "https://shop.example.com/payments/konnect");
    assert_eq!(body["theme"], "light");
    assert_eq!(body["email"], "amira@example.com");
    assert_eq!(recorded.api_keys.lock().unwrap().as_slice(), ["key-123"]);
}

#[tokio::test]
async fn test_fetch_payment_accepts_both_shapes() {
    let (base_url, recorded) = spawn_mock().await;
    let provider = provider(&base_url);

    let nested = provider.fetch_payment(&credentials(), "nested").await.unwrap();
    assert_eq!(nested.status, PaymentStatus::Completed);
    assert_eq!(nested.order_id.as_deref(), Some("ORD1"));
    assert_eq!(nested.amount, Some(11_900));

    let flat = provider.fetch_payment(&credentials(), "flat").await.unwrap();
    assert_eq!(flat.status, PaymentStatus::Pending);
    assert_eq!(flat.id.as_deref(), Some("flat"));

    let legacy = provider.fetch_payment(&credentials(), "legacy").await.unwrap();
    assert_eq!(legacy.status, PaymentStatus::Completed);
    assert_eq!(legacy.order_id.as_deref(), Some("42"));

    assert_eq!(recorded.api_keys.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_non_success_status_is_provider_error() {
    let (base_url, _) = spawn_mock().await;
    let provider = provider(&base_url);

    let err = provider
        .fetch_payment(&credentials(), "broken")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
    assert!(err.is_retryable());
    assert!(err.to_string().contains("HTTP 500"));
}

#[tokio::test]
async fn test_unreachable_api_is_transport_error() {
    let provider = provider("http://127.0.0.1:9/api/v2");
    let err = provider
        .fetch_payment(&credentials(), "nested")
        .await
        .unwrap_err();
    assert!(err.is_retryable());
}

async fn record_uri(State(uris): State<Arc<Mutex<Vec<Uri>>>>, uri: Uri) -> Json<Value> {
    uris.lock().unwrap().push(uri);
    Json(json!({ "payment": { "status": "pending" } }))
}

#[tokio::test]
async fn test_reference_cannot_escape_the_payments_path() {
    let uris = Arc::new(Mutex::new(Vec::new()));
    let app = Router::new().fallback(record_uri).with_state(uris.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    let provider = provider(&format!("http://{}/api/v2", addr));

    for reference in ["../../admin/wallets", "abc?expand=secrets", "abc#frag"] {
        provider
            .fetch_payment(&credentials(), reference)
            .await
            .unwrap();
    }

    let uris = uris.lock().unwrap();
    assert_eq!(uris.len(), 3);
    for uri in uris.iter() {
        assert!(uri.path().starts_with("/api/v2/payments/"), "{}", uri);
        assert_eq!(uri.path().split('/').count(), 5, "{}", uri);
        assert!(uri.query().is_none(), "{}", uri);
    }
}

#[test]
fn test_webhook_signature_validation() {
    let provider = provider("http://localhost/api/v2");
    let signature = sign_payload("whsec", b"ref-1").unwrap();

    assert!(provider.validate_webhook_signature(b"ref-1", &signature));
    assert!(!provider.validate_webhook_signature(b"ref-2", &signature));
    assert!(!provider.validate_webhook_signature(b"ref-1", "not-hex"));
}
