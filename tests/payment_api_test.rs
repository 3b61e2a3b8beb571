mod common;

use assert_matches::assert_matches;
use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use tower::ServiceExt;

use common::TestApp;
use storefront_api::errors::ServiceError;
use storefront_api::stores::StorefrontStore;

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&bytes).expect("json body")
}

fn router(app: &TestApp) -> Router {
    storefront_api::app(app.state.clone())
}

#[tokio::test]
async fn checkout_happy_path_over_http() {
    let app = TestApp::new().await;
    app.seed_item("MID-001", dec!(12.50), 4).await;
    let router = router(&app);

    // Create the order.
    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/orders",
            json!({
                "email": "customer@example.com",
                "delivery": false,
                "items": [{"manufacturingID": "MID-001", "quantity": 2}]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let order = response_json(response).await;
    assert_eq!(order["status"], "pending_payment");
    assert_eq!(order["total"], "25.00");
    let order_id = order["id"].as_str().unwrap().to_string();

    // Open the payment session.
    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/payments/mock/start",
            json!({
                "orderId": order_id,
                "amountCents": 2500,
                "currency": "EUR"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let session = response_json(response).await;
    let session_id = session["sessionId"].as_str().unwrap().to_string();
    assert!(session["url"]
        .as_str()
        .unwrap()
        .contains(&format!("session={session_id}")));

    // The public projection serves the payment UI.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/payments/mock/session/{session_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let view = response_json(response).await;
    assert_eq!(view["amountCents"], 2500);
    assert_eq!(view["status"], "pending");
    assert_eq!(view["merchant"], "Storefront");

    // Decide success.
    let response = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/payments/mock/decide",
            json!({"sessionId": session_id, "result": "success"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let decision = response_json(response).await;
    assert!(decision["redirectUrl"]
        .as_str()
        .unwrap()
        .ends_with("/payment/success"));

    // The order settled and stock is reserved.
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/orders/{order_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let order = response_json(response).await;
    assert_eq!(order["status"], "created");
    assert_eq!(app.stock_of("MID-001").await, 2);
}

#[tokio::test]
async fn amount_mismatch_is_rejected_and_persists_nothing() {
    let app = TestApp::new().await;
    app.seed_item("MID-001", dec!(12.50), 4).await;
    let order = app.create_order(&[("MID-001", 2)]).await;
    let router = router(&app);

    // Expected 2500; drift beyond one minor unit is rejected.
    let response = router
        .oneshot(json_request(
            Method::POST,
            "/payments/mock/start",
            json!({
                "orderId": order.id,
                "amountCents": 2502,
                "currency": "EUR"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.store.session_count().await, 0);
}

#[tokio::test]
async fn one_minor_unit_of_drift_is_tolerated() {
    let app = TestApp::new().await;
    app.seed_item("MID-001", dec!(12.50), 4).await;
    let order = app.create_order(&[("MID-001", 2)]).await;
    let router = router(&app);

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/payments/mock/start",
            json!({
                "orderId": order.id,
                "amountCents": 2501,
                "currency": "EUR"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn missing_fields_on_start_are_400() {
    let app = TestApp::new().await;
    let router = router(&app);

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/payments/mock/start",
            json!({"currency": "EUR"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn starting_a_session_for_a_missing_order_is_404() {
    let app = TestApp::new().await;
    let router = router(&app);

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/payments/mock/start",
            json!({
                "orderId": uuid::Uuid::new_v4(),
                "amountCents": 100,
                "currency": "EUR"
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_session_projection_is_404() {
    let app = TestApp::new().await;
    let router = router(&app);

    let response = router
        .oneshot(
            Request::builder()
                .uri("/payments/mock/session/deadbeefdeadbeef")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn expired_session_projection_reads_as_failed() {
    let app = TestApp::with_expired_sessions().await;
    app.seed_item("MID-001", dec!(10.00), 5).await;
    let order = app.create_order(&[("MID-001", 1)]).await;
    let session = app.open_session(&order).await;
    let router = router(&app);

    let response = router
        .oneshot(
            Request::builder()
                .uri(format!("/payments/mock/session/{}", session.session_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let view = response_json(response).await;
    assert_eq!(view["status"], "failed");

    // Lazy expiry: the projection changed, the record did not.
    let stored = app
        .store
        .fetch_session(&session.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_matches!(
        stored.status,
        storefront_api::entities::payment_session::SessionStatus::Pending
    );
}

#[tokio::test]
async fn insufficient_stock_maps_to_conflict_naming_the_item() {
    let app = TestApp::new().await;
    app.seed_item("MID-A", dec!(5.00), 10).await;
    app.seed_item("MID-B", dec!(7.50), 1).await;
    let order = app.create_order(&[("MID-A", 2), ("MID-B", 5)]).await;
    let session = app.open_session(&order).await;
    let router = router(&app);

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/payments/mock/decide",
            json!({"sessionId": session.session_id, "result": "success"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let body = response_json(response).await;
    assert_eq!(body["details"], "MID-B");
}

#[tokio::test]
async fn deciding_an_expired_session_is_400() {
    let app = TestApp::with_expired_sessions().await;
    app.seed_item("MID-001", dec!(10.00), 5).await;
    let order = app.create_order(&[("MID-001", 1)]).await;
    let session = app.open_session(&order).await;
    let router = router(&app);

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/payments/mock/decide",
            json!({"sessionId": session.session_id, "result": "success"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn order_validation_failures_are_400() {
    let app = TestApp::new().await;
    let router = router(&app);

    let response = router
        .oneshot(json_request(
            Method::POST,
            "/orders",
            json!({
                "email": "not-an-email",
                "delivery": false,
                "items": [{"manufacturingID": "X", "quantity": 1}]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn admin_status_override_validates_the_status() {
    let app = TestApp::new().await;
    app.seed_item("MID-001", dec!(10.00), 5).await;
    let order = app.create_order(&[("MID-001", 1)]).await;
    let router = router(&app);

    let response = router
        .clone()
        .oneshot(json_request(
            Method::PATCH,
            &format!("/orders/{}", order.id),
            json!({"status": "refunded"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = router
        .oneshot(json_request(
            Method::PATCH,
            &format!("/orders/{}", order.id),
            json!({"status": "packing"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "packing");
}

#[tokio::test]
async fn amount_mismatch_error_variant_is_typed() {
    let app = TestApp::new().await;
    app.seed_item("MID-001", dec!(12.50), 4).await;
    let order = app.create_order(&[("MID-001", 2)]).await;

    let err = app
        .state
        .services
        .sessions
        .open_session(storefront_api::services::sessions::OpenSessionRequest {
            order_id: order.id,
            amount_cents: 9999,
            currency: "EUR".to_string(),
            success_url: None,
            cancel_url: None,
        })
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::AmountMismatch(_));
}
