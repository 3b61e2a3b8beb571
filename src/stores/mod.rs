//! Persistence contracts for the storefront core.
//!
//! All stock mutation goes through [`StorefrontStore::settle_success`], the
//! one multi-document unit of work in the system. Every other write is a
//! single-document update and therefore atomic on its own at the store level.

pub mod memory;
pub mod sql;

use async_trait::async_trait;
use uuid::Uuid;

use crate::entities::{item, order, order_item, payment_session};
use crate::entities::{order::OrderStatus, payment_session::SessionStatus};
use crate::errors::ServiceError;

pub use memory::MemoryStore;
pub use sql::SqlStore;

/// Result of the settlement unit of work. The transaction either applied in
/// full, was a no-op because a prior decision already settled the order, or
/// aborted without any side effect.
#[derive(Debug, Clone)]
pub enum SettlementOutcome {
    /// Stock reserved, order `Created`, session `Succeeded` — all in one
    /// committed transaction.
    Applied(order::Model),
    /// The order had already left `PendingPayment`; nothing was mutated and
    /// the stored order is returned as the prior outcome.
    AlreadySettled(order::Model),
    /// The order referenced by the session no longer exists. The session is
    /// left untouched; this is a data-integrity case, not a payment outcome.
    OrderMissing,
    /// A conditional decrement matched zero records (unknown item or not
    /// enough stock). The transaction rolled back; no partial decrements
    /// survive.
    InsufficientStock { manufacturing_id: String },
}

#[async_trait]
pub trait StorefrontStore: Send + Sync {
    async fn insert_item(&self, item: item::Model) -> Result<item::Model, ServiceError>;

    async fn fetch_item(
        &self,
        manufacturing_id: &str,
    ) -> Result<Option<item::Model>, ServiceError>;

    /// Persists an order together with its lines. A unique-index violation on
    /// the order number surfaces as [`ServiceError::Conflict`] so the caller
    /// can regenerate and retry.
    async fn insert_order(
        &self,
        order: order::Model,
        lines: Vec<order_item::Model>,
    ) -> Result<order::Model, ServiceError>;

    async fn fetch_order(&self, id: Uuid) -> Result<Option<order::Model>, ServiceError>;

    async fn fetch_order_lines(&self, id: Uuid)
        -> Result<Vec<order_item::Model>, ServiceError>;

    async fn list_orders(&self, limit: u64) -> Result<Vec<order::Model>, ServiceError>;

    /// Unconditional single-document status update (admin override and the
    /// resolver's cancel/fail paths).
    async fn set_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<order::Model, ServiceError>;

    async fn insert_session(
        &self,
        session: payment_session::Model,
    ) -> Result<payment_session::Model, ServiceError>;

    async fn fetch_session(
        &self,
        id: &str,
    ) -> Result<Option<payment_session::Model>, ServiceError>;

    /// Moves a `Pending` session to a terminal status. Finishing a session
    /// twice is an [`ServiceError::InvalidOperation`]: sessions resolve
    /// exactly once.
    async fn finish_session(
        &self,
        id: &str,
        status: SessionStatus,
    ) -> Result<payment_session::Model, ServiceError>;

    /// The settlement unit of work (success decision): inside one
    /// transaction, re-load the order, bail out when it already settled,
    /// conditionally decrement stock for every line, then flip the order to
    /// `Created` and the session to `Succeeded`. Any failed decrement aborts
    /// the whole transaction.
    async fn settle_success(
        &self,
        session_id: &str,
        order_id: Uuid,
    ) -> Result<SettlementOutcome, ServiceError>;
}
