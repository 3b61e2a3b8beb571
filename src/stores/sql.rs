use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, SqlErr, TransactionTrait,
};
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::entities::{
    item,
    order::{self, OrderStatus},
    order_item,
    payment_session::{self, SessionStatus},
};
use crate::errors::ServiceError;
use crate::stores::{SettlementOutcome, StorefrontStore};

/// sea-orm backed store. The settlement runs inside a database transaction;
/// the conditional decrement is a single `UPDATE ... WHERE stock >= quantity`
/// so the filter and the write are evaluated as one indivisible operation.
#[derive(Clone)]
pub struct SqlStore {
    db: Arc<DatabaseConnection>,
}

impl SqlStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl StorefrontStore for SqlStore {
    async fn insert_item(&self, record: item::Model) -> Result<item::Model, ServiceError> {
        let active: item::ActiveModel = record.into();
        Ok(active.insert(&*self.db).await?)
    }

    async fn fetch_item(
        &self,
        manufacturing_id: &str,
    ) -> Result<Option<item::Model>, ServiceError> {
        Ok(item::Entity::find()
            .filter(item::Column::ManufacturingId.eq(manufacturing_id))
            .one(&*self.db)
            .await?)
    }

    async fn insert_order(
        &self,
        record: order::Model,
        lines: Vec<order_item::Model>,
    ) -> Result<order::Model, ServiceError> {
        let txn = self.db.begin().await?;

        let active: order::ActiveModel = record.into();
        let inserted = active.insert(&txn).await.map_err(|e| {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                ServiceError::Conflict("order number already exists".to_string())
            } else {
                ServiceError::DatabaseError(e)
            }
        })?;

        for line in lines {
            let active: order_item::ActiveModel = line.into();
            active.insert(&txn).await?;
        }

        txn.commit().await?;
        Ok(inserted)
    }

    async fn fetch_order(&self, id: Uuid) -> Result<Option<order::Model>, ServiceError> {
        Ok(order::Entity::find_by_id(id).one(&*self.db).await?)
    }

    async fn fetch_order_lines(
        &self,
        id: Uuid,
    ) -> Result<Vec<order_item::Model>, ServiceError> {
        Ok(order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(id))
            .all(&*self.db)
            .await?)
    }

    async fn list_orders(&self, limit: u64) -> Result<Vec<order::Model>, ServiceError> {
        Ok(order::Entity::find()
            .order_by_desc(order::Column::CreatedAt)
            .limit(limit)
            .all(&*self.db)
            .await?)
    }

    async fn set_order_status(
        &self,
        id: Uuid,
        status: OrderStatus,
    ) -> Result<order::Model, ServiceError> {
        let record = order::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {id} not found")))?;

        let mut active: order::ActiveModel = record.into();
        active.status = Set(status);
        active.updated_at = Set(Some(Utc::now()));
        Ok(active.update(&*self.db).await?)
    }

    async fn insert_session(
        &self,
        record: payment_session::Model,
    ) -> Result<payment_session::Model, ServiceError> {
        let active: payment_session::ActiveModel = record.into();
        Ok(active.insert(&*self.db).await?)
    }

    async fn fetch_session(
        &self,
        id: &str,
    ) -> Result<Option<payment_session::Model>, ServiceError> {
        Ok(payment_session::Entity::find_by_id(id.to_string())
            .one(&*self.db)
            .await?)
    }

    async fn finish_session(
        &self,
        id: &str,
        status: SessionStatus,
    ) -> Result<payment_session::Model, ServiceError> {
        let record = payment_session::Entity::find_by_id(id.to_string())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Payment session {id} not found")))?;

        if record.status.is_terminal() {
            return Err(ServiceError::InvalidOperation(format!(
                "Payment session {id} already resolved as {}",
                record.status
            )));
        }

        let mut active: payment_session::ActiveModel = record.into();
        active.status = Set(status);
        active.updated_at = Set(Some(Utc::now()));
        Ok(active.update(&*self.db).await?)
    }

    #[instrument(skip(self), fields(session_id = %session_id, order_id = %order_id))]
    async fn settle_success(
        &self,
        session_id: &str,
        order_id: Uuid,
    ) -> Result<SettlementOutcome, ServiceError> {
        let txn = self.db.begin().await?;

        let Some(record) = order::Entity::find_by_id(order_id).one(&txn).await? else {
            txn.rollback().await?;
            return Ok(SettlementOutcome::OrderMissing);
        };

        // A decision was already applied to this order; report the prior
        // outcome instead of re-applying effects.
        if record.status != OrderStatus::PendingPayment {
            txn.rollback().await?;
            return Ok(SettlementOutcome::AlreadySettled(record));
        }

        let lines = order_item::Entity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&txn)
            .await?;

        for line in &lines {
            // Filter and decrement evaluate as one statement: two concurrent
            // settlements cannot both pass the `stock >= quantity` check.
            let result = item::Entity::update_many()
                .col_expr(
                    item::Column::Stock,
                    Expr::col(item::Column::Stock).sub(line.quantity),
                )
                .col_expr(item::Column::UpdatedAt, Expr::value(Some(Utc::now())))
                .filter(item::Column::ManufacturingId.eq(line.manufacturing_id.as_str()))
                .filter(item::Column::Stock.gte(line.quantity))
                .exec(&txn)
                .await?;

            if result.rows_affected == 0 {
                warn!(
                    manufacturing_id = %line.manufacturing_id,
                    quantity = line.quantity,
                    "insufficient stock, rolling back settlement"
                );
                txn.rollback().await?;
                return Ok(SettlementOutcome::InsufficientStock {
                    manufacturing_id: line.manufacturing_id.clone(),
                });
            }
        }

        let mut order_update: order::ActiveModel = record.into();
        order_update.status = Set(OrderStatus::Created);
        order_update.updated_at = Set(Some(Utc::now()));
        let settled = order_update.update(&txn).await?;

        let session = payment_session::Entity::find_by_id(session_id.to_string())
            .one(&txn)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Payment session {session_id} not found"))
            })?;
        let mut session_update: payment_session::ActiveModel = session.into();
        session_update.status = Set(SessionStatus::Succeeded);
        session_update.updated_at = Set(Some(Utc::now()));
        session_update.update(&txn).await?;

        txn.commit().await?;
        Ok(SettlementOutcome::Applied(settled))
    }
}
