use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::entities::{
    item,
    order::{self, OrderStatus},
    order_item,
    payment_session::{self, SessionStatus},
};
use crate::errors::ServiceError;
use crate::stores::{SettlementOutcome, StorefrontStore};

#[derive(Default)]
struct State {
    items: HashMap<String, item::Model>,
    orders: HashMap<Uuid, order::Model>,
    order_lines: HashMap<Uuid, Vec<order_item::Model>>,
    sessions: HashMap<String, payment_session::Model>,
}

/// In-memory store used by tests. A single mutex spans every operation, so a
/// settlement observes and mutates stock atomically, which is the same
/// serialization the SQL store gets from its transaction.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current stock for an item, bypassing the trait for test assertions.
    pub async fn stock_of(&self, manufacturing_id: &str) -> Option<i32> {
        let state = self.inner.lock().await;
        state.items.get(manufacturing_id).map(|i| i.stock)
    }

    /// Number of stored sessions, for asserting that rejected opens persist
    /// nothing.
    pub async fn session_count(&self) -> usize {
        let state = self.inner.lock().await;
        state.sessions.len()
    }
}

#[async_trait]
impl StorefrontStore for MemoryStore {
    async fn insert_item(&self, record: item::Model) -> Result<item::Model, ServiceError> {
        let mut state = self.inner.lock().await;
        if state.items.contains_key(&record.manufacturing_id) {
            return Err(ServiceError::Conflict(format!(
                "item {} already exists",
                record.manufacturing_id
            )));
        }
        state
            .items
            .insert(record.manufacturing_id.clone(), record.clone());
        Ok(record)
    }

    async fn fetch_item(
        &self,
        manufacturing_id: &str,
    ) -> Result<Option<item::Model>, ServiceError> {
        let state = self.inner.lock().await;
        Ok(state.items.get(manufacturing_id).cloned())
    }

    async fn insert_order(
        &self,
        record: order::Model,
        lines: Vec<order_item::Model>,
    ) -> Result<order::Model, ServiceError> {
        let mut state = self.inner.lock().await;
        // Mirrors the unique index on orders.order_number.
        if state
            .orders
            .values()
            .any(|o| o.order_number == record.order_number)
        {
            return Err(ServiceError::Conflict(
                "order number already exists".to_string(),
            ));
        }
        state.orders.insert(record.id, record.clone());
        state.order_lines.insert(record.id, lines);
        Ok(record)
    }

    async fn fetch_order(&self, id: Uuid) -> Result<Option<order::Model>, ServiceError> {
        let state = self.inner.lock().await;
        Ok(state.orders.get(&id).cloned())
    }

    async fn fetch_order_lines(
        &self,
        id: Uuid,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        let state = self.inner.lock().await;
        Ok(state.order_lines.get(&id).cloned().unwrap_or_default())
    }

    async fn list_orders(&self, limit: u64) -> Result<Vec<order::Model>, ServiceError> {
        let state = self.inner.lock().await;
        let mut orders: Vec<_> = state.orders.values().cloned().collect();
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        orders.truncate(limit as usize);
        Ok(orders)
    }

    async fn set_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let mut state = self.inner.lock().await;
        let record = state
            .orders
            .get_mut(&id)
            .ok_or_else(|| ServiceError::NotFound(format!("Order {id} not found")))?;
        record.status = status;
        record.updated_at = Some(Utc::now());
        Ok(record.clone())
    }

    async fn insert_session(
        &self,
        record: payment_session::Model,
    ) -> Result<payment_session::Model, ServiceError> {
        let mut state = self.inner.lock().await;
        if state.sessions.contains_key(&record.id) {
            return Err(ServiceError::Conflict(format!(
                "payment session {} already exists",
                record.id
            )));
        }
        state.sessions.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn fetch_session(
        &self,
        id: &str,
    ) -> Result<Option<payment_session::Model>, ServiceError> {
        let state = self.inner.lock().await;
        Ok(state.sessions.get(id).cloned())
    }

    async fn finish_session(
        &self,
        id: &str,
        status: SessionStatus,
    ) -> Result<payment_session::Model, ServiceError> {
        let mut state = self.inner.lock().await;
        let record = state
            .sessions
            .get_mut(id)
            .ok_or_else(|| ServiceError::NotFound(format!("Payment session {id} not found")))?;
        if record.status.is_terminal() {
            return Err(ServiceError::InvalidOperation(format!(
                "Payment session {id} already resolved as {}",
                record.status
            )));
        }
        record.status = status;
        record.updated_at = Some(Utc::now());
        Ok(record.clone())
    }

    async fn settle_success(
        &self,
        session_id: &str,
        order_id: Uuid,
    ) -> Result<SettlementOutcome, ServiceError> {
        let mut state = self.inner.lock().await;

        let Some(record) = state.orders.get(&order_id).cloned() else {
            return Ok(SettlementOutcome::OrderMissing);
        };
        if record.status != OrderStatus::PendingPayment {
            return Ok(SettlementOutcome::AlreadySettled(record));
        }

        if !state.sessions.contains_key(session_id) {
            return Err(ServiceError::NotFound(format!(
                "Payment session {session_id} not found"
            )));
        }

        let lines = state.order_lines.get(&order_id).cloned().unwrap_or_default();

        // Stage the decrements on a copy so a failing line leaves live stock
        // untouched, matching the SQL transaction's rollback.
        let mut staged = state.items.clone();
        for line in &lines {
            match staged.get_mut(&line.manufacturing_id) {
                Some(stock_item) if stock_item.stock >= line.quantity => {
                    stock_item.stock -= line.quantity;
                    stock_item.updated_at = Some(Utc::now());
                }
                _ => {
                    return Ok(SettlementOutcome::InsufficientStock {
                        manufacturing_id: line.manufacturing_id.clone(),
                    });
                }
            }
        }
        state.items = staged;

        let session = state
            .sessions
            .get_mut(session_id)
            .expect("session present above");
        session.status = SessionStatus::Succeeded;
        session.updated_at = Some(Utc::now());

        let settled = state
            .orders
            .get_mut(&order_id)
            .expect("order present above");
        settled.status = OrderStatus::Created;
        settled.updated_at = Some(Utc::now());
        Ok(SettlementOutcome::Applied(settled.clone()))
    }
}
