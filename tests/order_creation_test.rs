mod common;

use std::collections::HashSet;

use assert_matches::assert_matches;
use rust_decimal_macros::dec;

use common::TestApp;
use storefront_api::entities::order::{OrderStatus, OrderLocale};
use storefront_api::errors::ServiceError;
use storefront_api::services::orders::{
    CreateOrderLine, CreateOrderRequest, UpdateOrderStatusRequest, ORDER_NUMBER_ALPHABET,
    ORDER_NUMBER_LEN,
};

fn request_with(items: Vec<CreateOrderLine>) -> CreateOrderRequest {
    CreateOrderRequest {
        email: "customer@example.com".to_string(),
        delivery: false,
        address: None,
        items,
        locale: None,
    }
}

fn line(manufacturing_id: &str, quantity: i32) -> CreateOrderLine {
    CreateOrderLine {
        manufacturing_id: manufacturing_id.to_string(),
        quantity,
        unit_price: None,
    }
}

#[tokio::test]
async fn total_is_computed_from_catalog_prices() {
    let app = TestApp::new().await;
    app.seed_item("X1", dec!(10.00), 100).await;

    // Client claims the item costs one cent; the catalog price wins.
    let mut tampered = line("X1", 3);
    tampered.unit_price = Some(dec!(0.01));

    let order = app
        .state
        .services
        .orders
        .create_order(request_with(vec![tampered]))
        .await
        .expect("order");

    assert_eq!(order.total, dec!(30.00));
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].unit_price, dec!(10.00));
    assert_eq!(order.status, OrderStatus::PendingPayment);
    assert_eq!(order.locale, OrderLocale::En);
}

#[tokio::test]
async fn order_creation_does_not_touch_stock() {
    let app = TestApp::new().await;
    app.seed_item("X1", dec!(10.00), 7).await;

    app.create_order(&[("X1", 5)]).await;
    assert_eq!(app.stock_of("X1").await, 7);
}

#[tokio::test]
async fn rejects_unknown_item() {
    let app = TestApp::new().await;

    let err = app
        .state
        .services
        .orders
        .create_order(request_with(vec![line("NO-SUCH", 1)]))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(ref msg) if msg.contains("NO-SUCH"));
}

#[tokio::test]
async fn rejects_empty_item_list() {
    let app = TestApp::new().await;

    let err = app
        .state
        .services
        .orders
        .create_order(request_with(Vec::new()))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn rejects_bad_email() {
    let app = TestApp::new().await;
    app.seed_item("X1", dec!(10.00), 10).await;

    let mut request = request_with(vec![line("X1", 1)]);
    request.email = "not-an-email".to_string();

    let err = app
        .state
        .services
        .orders
        .create_order(request)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn rejects_non_positive_quantity() {
    let app = TestApp::new().await;
    app.seed_item("X1", dec!(10.00), 10).await;

    let err = app
        .state
        .services
        .orders
        .create_order(request_with(vec![line("X1", 0)]))
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));
}

#[tokio::test]
async fn delivery_orders_require_an_address() {
    let app = TestApp::new().await;
    app.seed_item("X1", dec!(10.00), 10).await;

    let mut request = request_with(vec![line("X1", 1)]);
    request.delivery = true;
    request.address = Some("   ".to_string());

    let err = app
        .state
        .services
        .orders
        .create_order(request)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(ref msg) if msg.contains("Address"));

    let mut request = request_with(vec![line("X1", 1)]);
    request.delivery = true;
    request.address = Some("Gedimino pr. 1, Vilnius".to_string());
    assert!(app
        .state
        .services
        .orders
        .create_order(request)
        .await
        .is_ok());
}

#[tokio::test]
async fn rejects_unsupported_locale() {
    let app = TestApp::new().await;
    app.seed_item("X1", dec!(10.00), 10).await;

    let mut request = request_with(vec![line("X1", 1)]);
    request.locale = Some("fr".to_string());

    let err = app
        .state
        .services
        .orders
        .create_order(request)
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::ValidationError(_));

    let mut request = request_with(vec![line("X1", 1)]);
    request.locale = Some("lt".to_string());
    let order = app
        .state
        .services
        .orders
        .create_order(request)
        .await
        .unwrap();
    assert_eq!(order.locale, OrderLocale::Lt);
}

#[tokio::test]
async fn order_numbers_are_unique_and_well_formed() {
    let app = TestApp::new().await;
    app.seed_item("X1", dec!(1.00), 1000).await;

    let mut seen = HashSet::new();
    for _ in 0..50 {
        let order = app.create_order(&[("X1", 1)]).await;
        assert_eq!(order.order_number.len(), ORDER_NUMBER_LEN);
        assert!(order
            .order_number
            .bytes()
            .all(|b| ORDER_NUMBER_ALPHABET.contains(&b)));
        assert!(seen.insert(order.order_number));
    }
}

#[tokio::test]
async fn admin_can_override_status_to_any_known_value() {
    let app = TestApp::new().await;
    app.seed_item("X1", dec!(10.00), 10).await;

    let order = app.create_order(&[("X1", 1)]).await;

    // The admin override skips the resolver's transition table.
    let updated = app
        .state
        .services
        .orders
        .update_order_status(
            order.id,
            UpdateOrderStatusRequest {
                status: "sent".to_string(),
            },
        )
        .await
        .expect("override");
    assert_eq!(updated.status, OrderStatus::Sent);
}

#[tokio::test]
async fn admin_override_rejects_unknown_status() {
    let app = TestApp::new().await;
    app.seed_item("X1", dec!(10.00), 10).await;

    let order = app.create_order(&[("X1", 1)]).await;

    let err = app
        .state
        .services
        .orders
        .update_order_status(
            order.id,
            UpdateOrderStatusRequest {
                status: "refunded".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::InvalidStatus(_));
}

#[tokio::test]
async fn admin_override_on_missing_order_is_not_found() {
    let app = TestApp::new().await;

    let err = app
        .state
        .services
        .orders
        .update_order_status(
            uuid::Uuid::new_v4(),
            UpdateOrderStatusRequest {
                status: "packing".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_matches!(err, ServiceError::NotFound(_));
}
