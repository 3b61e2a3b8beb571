use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Human-readable code shown to the customer, unique per order.
    #[sea_orm(unique)]
    #[validate(length(equal = 16, message = "Order number must be 16 characters"))]
    pub order_number: String,

    #[validate(email)]
    pub entered_email: String,
    pub delivery: bool,
    pub address: Option<String>,
    #[sea_orm(column_type = "Decimal(Some((19, 4)))")]
    pub total: Decimal,
    pub currency: String,
    pub status: OrderStatus,
    pub locale: OrderLocale,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItem,
    #[sea_orm(has_many = "super::payment_session::Entity")]
    PaymentSession,
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl Related<super::payment_session::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PaymentSession.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }
        if let ActiveValue::NotSet = active_model.updated_at {
            active_model.updated_at = Set(Some(now));
        }

        Ok(active_model)
    }
}

/// Order status lifecycle. The intended progression is
/// `PendingPayment → Created → Packing → Sent → Completed`, with
/// `Cancelled` reachable while payment is still unsettled.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "pending_payment")]
    PendingPayment,
    #[sea_orm(string_value = "created")]
    Created,
    #[sea_orm(string_value = "packing")]
    Packing,
    #[sea_orm(string_value = "sent")]
    Sent,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingPayment => "pending_payment",
            Self::Created => "created",
            Self::Packing => "packing",
            Self::Sent => "sent",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    /// Statuses a status may legally progress to. The decision resolver only
    /// ever performs transitions allowed here; the admin override endpoint is
    /// intentionally unrestricted.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (PendingPayment, Created)
                | (PendingPayment, Cancelled)
                | (Created, Packing)
                | (Created, Cancelled)
                | (Packing, Sent)
                | (Sent, Completed)
        )
    }

    pub fn parse(value: &str) -> Option<OrderStatus> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending_payment" => Some(Self::PendingPayment),
            "created" => Some(Self::Created),
            "packing" => Some(Self::Packing),
            "sent" => Some(Self::Sent),
            "completed" => Some(Self::Completed),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Customer-facing locale used for notification wording.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, Default, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(8))")]
#[serde(rename_all = "lowercase")]
pub enum OrderLocale {
    #[default]
    #[sea_orm(string_value = "en")]
    En,
    #[sea_orm(string_value = "lt")]
    Lt,
}

impl OrderLocale {
    pub fn parse(value: &str) -> Option<OrderLocale> {
        match value.trim().to_ascii_lowercase().as_str() {
            "en" => Some(Self::En),
            "lt" => Some(Self::Lt),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolver_transitions_are_legal() {
        assert!(OrderStatus::PendingPayment.can_transition_to(OrderStatus::Created));
        assert!(OrderStatus::PendingPayment.can_transition_to(OrderStatus::Cancelled));
        assert!(OrderStatus::Created.can_transition_to(OrderStatus::Cancelled));
    }

    #[test]
    fn fulfilment_chain_is_ordered() {
        assert!(OrderStatus::Created.can_transition_to(OrderStatus::Packing));
        assert!(OrderStatus::Packing.can_transition_to(OrderStatus::Sent));
        assert!(OrderStatus::Sent.can_transition_to(OrderStatus::Completed));
        assert!(!OrderStatus::Packing.can_transition_to(OrderStatus::Completed));
    }

    #[test]
    fn terminal_statuses_have_no_successors() {
        for next in [
            OrderStatus::PendingPayment,
            OrderStatus::Created,
            OrderStatus::Packing,
            OrderStatus::Sent,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
        ] {
            assert!(!OrderStatus::Completed.can_transition_to(next));
            assert!(!OrderStatus::Cancelled.can_transition_to(next));
        }
    }

    #[test]
    fn settled_orders_never_return_to_pending() {
        assert!(!OrderStatus::Created.can_transition_to(OrderStatus::PendingPayment));
        assert!(!OrderStatus::Completed.can_transition_to(OrderStatus::PendingPayment));
    }

    #[test]
    fn status_parse_accepts_both_spellings_of_cancelled() {
        assert_eq!(
            OrderStatus::parse("cancelled"),
            Some(OrderStatus::Cancelled)
        );
        assert_eq!(OrderStatus::parse("canceled"), Some(OrderStatus::Cancelled));
        assert_eq!(OrderStatus::parse(" Sent "), Some(OrderStatus::Sent));
        assert_eq!(OrderStatus::parse("refunded"), None);
    }
}
