//! End-to-end tests of the REST API against an in-memory database.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode},
};
use serde_json::{Value, json};
use techstore_api::{
    config::{AppConfig, database},
    core::notification::{LogNotifier, OrderMailer},
    gateway::{
        Charge, ChargeRequest, CheckoutRequest, CheckoutSession, GatewayError, PaymentGateway,
    },
    http::{AppState, build_router},
};
use tower::ServiceExt;

/// Gateway that approves every charge and reports every session as paid.
struct ApprovingGateway;

#[async_trait]
impl PaymentGateway for ApprovingGateway {
    async fn charge(&self, request: &ChargeRequest) -> Result<Charge, GatewayError> {
        Ok(Charge {
            id: format!("pi_{}", request.amount_cents),
            status: "succeeded".to_string(),
        })
    }

    async fn create_checkout_session(
        &self,
        request: &CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        Ok(CheckoutSession {
            id: format!("cs_{}", request.client_reference_id),
            url: Some("https://checkout.stripe.com/c/pay/test".to_string()),
            payment_status: "unpaid".to_string(),
            client_reference_id: Some(request.client_reference_id.clone()),
            amount_total: None,
        })
    }

    async fn retrieve_checkout_session(
        &self,
        session_id: &str,
    ) -> Result<CheckoutSession, GatewayError> {
        let order_id = session_id.trim_start_matches("cs_").to_string();
        Ok(CheckoutSession {
            id: session_id.to_string(),
            url: None,
            payment_status: "paid".to_string(),
            client_reference_id: Some(order_id),
            amount_total: Some(5000),
        })
    }
}

async fn app(uploads: &std::path::Path) -> Router {
    let db = database::init_db("sqlite::memory:").await.unwrap();
    let mut config = AppConfig::default();
    config.uploads.dir = uploads.to_path_buf();

    build_router(AppState {
        db,
        gateway: Arc::new(ApprovingGateway),
        mailer: OrderMailer::new(Arc::new(LogNotifier), config.email.clone()),
        config: Arc::new(config),
    })
}

async fn call(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

#[tokio::test]
async fn health_reports_database() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path()).await;

    let (status, body) = call(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "up");
}

#[tokio::test]
async fn order_lifecycle_over_http() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path()).await;

    let (status, client) = call(
        &app,
        "POST",
        "/api/clients",
        Some(json!({
            "name": "Amel Ben Ali",
            "email": "amel@example.com",
            "address": { "street": "12 avenue Habib Bourguiba", "city": "Tunis", "postalCode": "1000", "country": "Tunisie" }
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let client_id = client["id"].as_i64().unwrap();
    assert_eq!(client["address"]["city"], "Tunis");

    let (status, found) = call(&app, "GET", "/api/clients/by-email/amel@example.com", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(found["id"], client_id);

    let (status, product) = call(
        &app,
        "POST",
        "/api/produits",
        Some(json!({ "name": "Clavier", "category": "Périphériques", "price": 25.0, "stock": 10 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let product_id = product["id"].as_i64().unwrap();

    let (status, order) = call(
        &app,
        "POST",
        "/api/commandes",
        Some(json!({
            "clientId": client_id,
            "total": 50.0,
            "lines": [{ "productId": product_id, "quantity": 2 }]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = order["id"].as_i64().unwrap();
    assert_eq!(order["status"], "EN_ATTENTE");
    assert_eq!(order["lines"][0]["productName"], "Clavier");

    let (_, product) = call(&app, "GET", &format!("/api/produits/{product_id}"), None).await;
    assert_eq!(product["stock"], 8);

    let (status, email) = call(
        &app,
        "POST",
        &format!("/api/commandes/{order_id}/envoyer-email"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(email["status"], "SUCCESS");

    let (status, payment) = call(
        &app,
        "POST",
        "/api/paiements",
        Some(json!({ "orderId": order_id, "amount": 50.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["status"], "SUCCES");
    assert_eq!(payment["reference"], "pi_5000");

    let (status, _) = call(
        &app,
        "POST",
        "/api/paiements",
        Some(json!({ "orderId": order_id, "amount": 50.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, shipped) = call(
        &app,
        "POST",
        &format!("/api/commandes/{order_id}/ship"),
        Some(json!({ "trackingNumber": "TRK-1", "carrier": "DHL" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(shipped["status"], "SHIPPED");

    let (_, tracking) = call(&app, "GET", &format!("/api/commandes/{order_id}/tracking"), None).await;
    assert_eq!(tracking["trackingNumber"], "TRK-1");
    assert!(tracking["estimatedDeliveryAt"].is_string());

    let (status, delivered) = call(
        &app,
        "PUT",
        &format!("/api/commandes/{order_id}/deliver"),
        Some(json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(delivered["status"], "DELIVERED");

    let (_, history) = call(&app, "GET", &format!("/api/commandes/{order_id}/history"), None).await;
    let statuses: Vec<&str> = history
        .as_array()
        .unwrap()
        .iter()
        .map(|h| h["newStatus"].as_str().unwrap())
        .collect();
    assert_eq!(statuses, vec!["DELIVERED", "SHIPPED", "PAYEE", "EN_ATTENTE"]);

    let (status, _) = call(&app, "DELETE", &format!("/api/clients/{client_id}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn errors_are_json() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path()).await;

    let (status, body) = call(&app, "GET", "/api/commandes/42", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (status, body) = call(
        &app,
        "POST",
        "/api/clients",
        Some(json!({ "name": "", "email": "nobody" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    let (status, body) = call(&app, "GET", "/api/clients/by-email/ghost@example.com", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn discount_routes() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path()).await;

    let (_, product) = call(
        &app,
        "POST",
        "/api/produits",
        Some(json!({ "name": "Écran", "category": "Moniteurs", "price": 200.0, "stock": 3 })),
    )
    .await;
    let id = product["id"].as_i64().unwrap();

    let (status, on_sale) = call(&app, "PUT", &format!("/api/produits/{id}/solde/20"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(on_sale["salePrice"], 160.0);

    let (status, body) = call(&app, "PUT", &format!("/api/produits/{id}/solde/120"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_discount");

    let (status, off_sale) = call(&app, "PUT", &format!("/api/produits/{id}/solde/remove"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(off_sale["salePrice"].is_null());
}

#[tokio::test]
async fn checkout_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path()).await;

    let (_, client) = call(
        &app,
        "POST",
        "/api/clients",
        Some(json!({ "name": "Karim", "email": "karim@example.com" })),
    )
    .await;
    let (_, product) = call(
        &app,
        "POST",
        "/api/produits",
        Some(json!({ "name": "Casque", "category": "Audio", "price": 25.0, "stock": 5 })),
    )
    .await;
    let (_, order) = call(
        &app,
        "POST",
        "/api/commandes",
        Some(json!({
            "clientId": client["id"],
            "lines": [{ "productId": product["id"], "quantity": 2 }]
        })),
    )
    .await;
    let order_id = order["id"].as_i64().unwrap();

    let (status, session) = call(
        &app,
        "POST",
        "/api/paiements/create-checkout-session",
        Some(json!({
            "orderId": order_id,
            "successUrl": "http://localhost:3000/success",
            "cancelUrl": "http://localhost:3000/cart"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let session_id = session["sessionId"].as_str().unwrap().to_string();
    assert!(session["url"].is_string());

    let uri = format!("/api/paiements/checkout-success?session_id={session_id}");
    let (status, confirmed) = call(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(confirmed["success"], true);
    assert_eq!(confirmed["orderId"], order_id);
    assert_eq!(confirmed["amount"], 50.0);

    // Confirming again is harmless
    let (status, again) = call(&app, "GET", &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(again["payment"]["id"], confirmed["payment"]["id"]);

    let payment_id = confirmed["payment"]["id"].as_i64().unwrap();
    let (status, payment) = call(&app, "GET", &format!("/api/paiements/{payment_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(payment["reference"], session_id);
}

const BOUNDARY: &str = "techstore-boundary";

fn multipart_body(fields: &[(&str, &str)], image: Option<(&str, &str)>) -> Body {
    let mut body = String::new();
    for (name, value) in fields {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
        ));
    }
    if let Some((file_name, data)) = image {
        body.push_str(&format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n{data}\r\n"
        ));
    }
    body.push_str(&format!("--{BOUNDARY}--\r\n"));
    Body::from(body)
}

async fn send_form(app: &Router, method: &str, uri: &str, body: Body) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(
            "content-type",
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(body)
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

const WEBCAM: &[(&str, &str)] = &[
    ("name", "Webcam"),
    ("category", "Vidéo"),
    ("price", "39.90"),
    ("stock", "4"),
];

#[tokio::test]
async fn product_upload_serves_image() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path()).await;

    let body = multipart_body(WEBCAM, Some(("web cam.png", "PNGDATA")));
    let (status, product) = send_form(&app, "POST", "/api/produits/upload", body).await;
    assert_eq!(status, StatusCode::CREATED);

    let image_url = product["imageUrl"].as_str().unwrap().to_string();
    assert!(image_url.starts_with("/uploads/"));
    assert!(image_url.ends_with("_web_cam.png"));

    let request = Request::builder().uri(&image_url).body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"PNGDATA");
}

#[tokio::test]
async fn product_upload_update_keeps_or_replaces_image() {
    let dir = tempfile::tempdir().unwrap();
    let app = app(dir.path()).await;

    let body = multipart_body(WEBCAM, Some(("webcam.png", "FIRST")));
    let (_, created) = send_form(&app, "POST", "/api/produits/upload", body).await;
    let id = created["id"].as_i64().unwrap();
    let original = created["imageUrl"].as_str().unwrap().to_string();
    let uri = format!("/api/produits/{id}/upload");

    let fields = [
        ("name", "Webcam HD"),
        ("category", "Vidéo"),
        ("price", "49.90"),
        ("stock", "6"),
    ];
    let (status, kept) = send_form(&app, "PUT", &uri, multipart_body(&fields, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(kept["name"], "Webcam HD");
    assert_eq!(kept["stock"], 6);
    assert_eq!(kept["imageUrl"], original.as_str());

    let body = multipart_body(&fields, Some(("webcam-v2.png", "SECOND")));
    let (status, replaced) = send_form(&app, "PUT", &uri, body).await;
    assert_eq!(status, StatusCode::OK);
    let new_url = replaced["imageUrl"].as_str().unwrap();
    assert_ne!(new_url, original);
    assert!(new_url.ends_with("_webcam-v2.png"));

    let missing = multipart_body(&fields, None);
    let (status, body) = send_form(&app, "PUT", "/api/produits/999/upload", missing).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}
