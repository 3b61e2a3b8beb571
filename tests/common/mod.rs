#![allow(dead_code)]

use std::sync::Arc;

use rust_decimal::Decimal;
use uuid::Uuid;

use storefront_api::{
    config::AppConfig,
    entities::item,
    events,
    handlers::AppServices,
    rate_limiter::{RateLimitConfig, RecipientRateLimiter},
    services::notifications::{LogTransport, NotificationDispatcher},
    services::orders::{CreateOrderLine, CreateOrderRequest, OrderResponse},
    services::sessions::{OpenSessionRequest, OpenSessionResponse},
    stores::{MemoryStore, StorefrontStore},
    AppState,
};

/// Test harness over the in-memory store: full service wiring, no database.
pub struct TestApp {
    pub state: AppState,
    pub store: Arc<MemoryStore>,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_config(base_config()).await
    }

    /// Harness whose payment sessions are already expired when decided.
    pub async fn with_expired_sessions() -> Self {
        let mut cfg = base_config();
        cfg.payment_session_ttl_secs = 0;
        Self::with_config(cfg).await
    }

    pub async fn with_config(cfg: AppConfig) -> Self {
        let (event_sender, event_rx) = events::channel(64);
        let dispatcher = Arc::new(NotificationDispatcher::new(
            Arc::new(LogTransport),
            RecipientRateLimiter::new(RateLimitConfig::default()),
        ));
        let event_task = tokio::spawn(events::process_events(event_rx, dispatcher));

        let store = Arc::new(MemoryStore::new());
        let store_dyn: Arc<dyn StorefrontStore> = store.clone();
        let services = AppServices::new(store_dyn.clone(), Arc::new(event_sender.clone()), &cfg);

        let state = AppState {
            config: cfg,
            db: None,
            store: store_dyn,
            event_sender,
            services,
        };

        Self {
            state,
            store,
            _event_task: event_task,
        }
    }

    pub async fn seed_item(&self, manufacturing_id: &str, price: Decimal, stock: i32) {
        let now = chrono::Utc::now();
        self.store
            .insert_item(item::Model {
                id: Uuid::new_v4(),
                manufacturing_id: manufacturing_id.to_string(),
                name: format!("Item {manufacturing_id}"),
                price,
                stock,
                created_at: now,
                updated_at: Some(now),
            })
            .await
            .expect("seed item");
    }

    pub async fn create_order(&self, lines: &[(&str, i32)]) -> OrderResponse {
        self.state
            .services
            .orders
            .create_order(CreateOrderRequest {
                email: "customer@example.com".to_string(),
                delivery: false,
                address: None,
                items: lines
                    .iter()
                    .map(|(manufacturing_id, quantity)| CreateOrderLine {
                        manufacturing_id: manufacturing_id.to_string(),
                        quantity: *quantity,
                        unit_price: None,
                    })
                    .collect(),
                locale: None,
            })
            .await
            .expect("create order")
    }

    /// Opens a session for the order with the exact expected amount.
    pub async fn open_session(&self, order: &OrderResponse) -> OpenSessionResponse {
        let amount_cents =
            storefront_api::services::sessions::amount_in_minor_units(order.total)
                .expect("amount in minor units");
        self.state
            .services
            .sessions
            .open_session(OpenSessionRequest {
                order_id: order.id,
                amount_cents,
                currency: order.currency.clone(),
                success_url: None,
                cancel_url: None,
            })
            .await
            .expect("open session")
    }

    pub async fn stock_of(&self, manufacturing_id: &str) -> i32 {
        self.store
            .stock_of(manufacturing_id)
            .await
            .expect("item exists")
    }
}

fn base_config() -> AppConfig {
    AppConfig::new(
        "sqlite::memory:".to_string(),
        "127.0.0.1".to_string(),
        18_080,
        "test".to_string(),
    )
}
