use std::sync::Arc;

use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::{
    order::{self, OrderLocale, OrderStatus},
    order_item,
};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::stores::StorefrontStore;

/// Alphabet for order numbers. Visually ambiguous characters (0/O, 1/I) are
/// excluded so the code survives being read over the phone.
pub const ORDER_NUMBER_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const ORDER_NUMBER_LEN: usize = 16;

/// Attempts before giving up when the unique index rejects a generated
/// number. Collisions are astronomically unlikely; repeated conflicts point
/// at a store problem, not bad luck.
const ORDER_NUMBER_ATTEMPTS: u32 = 4;

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    pub delivery: bool,
    pub address: Option<String>,
    #[validate(length(min = 1, message = "Order must contain at least one item"))]
    pub items: Vec<CreateOrderLine>,
    pub locale: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CreateOrderLine {
    #[serde(alias = "manufacturingID")]
    pub manufacturing_id: String,
    pub quantity: i32,
    /// Accepted for wire compatibility and deliberately ignored: totals are
    /// always recomputed from catalog prices.
    #[serde(default, alias = "price")]
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderStatusRequest {
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderLineResponse {
    pub manufacturing_id: String,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub entered_email: String,
    pub delivery: bool,
    pub address: Option<String>,
    pub items: Vec<OrderLineResponse>,
    pub total: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub locale: OrderLocale,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Order creation and the admin status override.
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn StorefrontStore>,
    event_sender: Option<Arc<EventSender>>,
    currency: String,
}

impl OrderService {
    pub fn new(
        store: Arc<dyn StorefrontStore>,
        event_sender: Option<Arc<EventSender>>,
        currency: String,
    ) -> Self {
        Self {
            store,
            event_sender,
            currency,
        }
    }

    /// Creates an order in `PendingPayment`. The total is computed here from
    /// current catalog prices; any price the client submitted is discarded.
    #[instrument(skip(self, request), fields(email = %request.email))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;

        if request.delivery
            && request
                .address
                .as_deref()
                .map(str::trim)
                .unwrap_or("")
                .is_empty()
        {
            return Err(ServiceError::ValidationError(
                "Address is required for delivery orders".to_string(),
            ));
        }

        let locale = match request.locale.as_deref() {
            None => OrderLocale::default(),
            Some(raw) => OrderLocale::parse(raw).ok_or_else(|| {
                ServiceError::ValidationError(format!("Unsupported locale: {raw}"))
            })?,
        };

        let order_id = Uuid::new_v4();
        let now = Utc::now();
        let mut total = Decimal::ZERO;
        let mut lines = Vec::with_capacity(request.items.len());

        for line in &request.items {
            if line.quantity < 1 {
                return Err(ServiceError::ValidationError(format!(
                    "Quantity for item {} must be positive",
                    line.manufacturing_id
                )));
            }

            let catalog_item = self
                .store
                .fetch_item(&line.manufacturing_id)
                .await?
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!(
                        "Order references unknown item {}",
                        line.manufacturing_id
                    ))
                })?;

            total += catalog_item.price * Decimal::from(line.quantity);
            lines.push(order_item::Model {
                id: Uuid::new_v4(),
                order_id,
                manufacturing_id: catalog_item.manufacturing_id,
                quantity: line.quantity,
                unit_price: catalog_item.price,
                created_at: now,
            });
        }

        let mut last_err = None;
        for attempt in 0..ORDER_NUMBER_ATTEMPTS {
            let record = order::Model {
                id: order_id,
                order_number: generate_order_number(),
                entered_email: request.email.clone(),
                delivery: request.delivery,
                address: request.address.clone(),
                total,
                currency: self.currency.clone(),
                status: OrderStatus::PendingPayment,
                locale,
                created_at: now,
                updated_at: Some(now),
            };

            match self.store.insert_order(record, lines.clone()).await {
                Ok(inserted) => {
                    info!(order_id = %inserted.id, order_number = %inserted.order_number, "order created");
                    self.emit(Event::OrderPlaced {
                        order_id: inserted.id,
                        order_number: inserted.order_number.clone(),
                    })
                    .await;
                    let items = self.store.fetch_order_lines(inserted.id).await?;
                    return Ok(model_to_response(inserted, &items));
                }
                Err(ServiceError::Conflict(msg)) => {
                    warn!(attempt, "order number collision, regenerating: {msg}");
                    last_err = Some(ServiceError::Conflict(msg));
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or_else(|| {
            ServiceError::InternalError("order number generation failed".to_string())
        }))
    }

    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(
        &self,
        order_id: Uuid,
    ) -> Result<Option<OrderResponse>, ServiceError> {
        let Some(record) = self.store.fetch_order(order_id).await? else {
            return Ok(None);
        };
        let items = self.store.fetch_order_lines(order_id).await?;
        Ok(Some(model_to_response(record, &items)))
    }

    #[instrument(skip(self))]
    pub async fn list_orders(&self, limit: u64) -> Result<Vec<OrderResponse>, ServiceError> {
        let orders = self.store.list_orders(limit).await?;
        Ok(orders
            .into_iter()
            .map(|record| model_to_response(record, &[]))
            .collect())
    }

    /// Admin override: any known status may be applied regardless of the
    /// current one. The customer is notified of the change, best-effort.
    #[instrument(skip(self, request), fields(order_id = %order_id, new_status = %request.status))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        request: UpdateOrderStatusRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request.validate()?;

        let status = OrderStatus::parse(&request.status).ok_or_else(|| {
            ServiceError::InvalidStatus(format!("Unknown order status: {}", request.status))
        })?;

        let updated = self.store.set_order_status(order_id, status).await?;
        info!(order_id = %order_id, status = %status, "order status updated");

        self.emit(Event::OrderStatusChanged {
            order_id,
            order_number: updated.order_number.clone(),
            email: updated.entered_email.clone(),
            locale: updated.locale,
            new_status: status,
        })
        .await;

        let items = self.store.fetch_order_lines(order_id).await?;
        Ok(model_to_response(updated, &items))
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "failed to send event");
            }
        }
    }
}

fn model_to_response(record: order::Model, items: &[order_item::Model]) -> OrderResponse {
    OrderResponse {
        id: record.id,
        order_number: record.order_number,
        entered_email: record.entered_email,
        delivery: record.delivery,
        address: record.address,
        items: items
            .iter()
            .map(|line| OrderLineResponse {
                manufacturing_id: line.manufacturing_id.clone(),
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect(),
        total: record.total,
        currency: record.currency,
        status: record.status,
        locale: record.locale,
        created_at: record.created_at,
        updated_at: record.updated_at,
    }
}

/// 16 characters sampled uniformly from the restricted alphabet.
pub fn generate_order_number() -> String {
    let mut rng = rand::thread_rng();
    (0..ORDER_NUMBER_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..ORDER_NUMBER_ALPHABET.len());
            ORDER_NUMBER_ALPHABET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn order_number_has_expected_shape() {
        let number = generate_order_number();
        assert_eq!(number.len(), ORDER_NUMBER_LEN);
        assert!(number
            .bytes()
            .all(|b| ORDER_NUMBER_ALPHABET.contains(&b)));
    }

    #[test]
    fn order_number_avoids_ambiguous_characters() {
        for _ in 0..200 {
            let number = generate_order_number();
            for forbidden in ['0', 'O', '1', 'I'] {
                assert!(!number.contains(forbidden), "found {forbidden} in {number}");
            }
        }
    }

    #[test]
    fn ten_thousand_order_numbers_are_unique() {
        // 32^16 possible codes; 10k draws colliding would mean the generator
        // is broken, not unlucky.
        let mut seen = HashSet::with_capacity(10_000);
        for _ in 0..10_000 {
            assert!(seen.insert(generate_order_number()));
        }
    }
}
