use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::order::{OrderLocale, OrderStatus};
use crate::services::notifications::NotificationDispatcher;

/// Domain events emitted after state changes commit. Payloads carry the
/// fields the notification dispatcher needs so the event loop never reads
/// the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Event {
    /// A new order was persisted with status `PendingPayment`. No email yet;
    /// the customer is confirmed once payment settles.
    OrderPlaced {
        order_id: Uuid,
        order_number: String,
    },
    /// Payment settled and the order reached `Created`. Triggers the
    /// order-created email.
    OrderCreated {
        order_id: Uuid,
        order_number: String,
        email: String,
        locale: OrderLocale,
    },
    /// Admin status override. Triggers the status-changed email.
    OrderStatusChanged {
        order_id: Uuid,
        order_number: String,
        email: String,
        locale: OrderLocale,
        new_status: OrderStatus,
    },
    /// A payment session resolved as cancelled or failed.
    PaymentFailed {
        order_id: Uuid,
        session_id: String,
    },
}

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }
}

/// Creates a bounded event channel.
pub fn channel(capacity: usize) -> (EventSender, mpsc::Receiver<Event>) {
    let (tx, rx) = mpsc::channel(capacity);
    (EventSender::new(tx), rx)
}

/// Drains the event channel, forwarding to the notification dispatcher.
/// Dispatch is best-effort; a failed notification never propagates.
pub async fn process_events(
    mut rx: mpsc::Receiver<Event>,
    dispatcher: Arc<NotificationDispatcher>,
) {
    while let Some(event) = rx.recv().await {
        match event {
            Event::OrderPlaced {
                order_id,
                ref order_number,
            } => {
                info!(order_id = %order_id, order_number = %order_number, "order placed, awaiting payment");
            }
            Event::OrderCreated {
                order_id,
                ref order_number,
                ref email,
                locale,
            } => {
                info!(order_id = %order_id, "payment settled, dispatching order-created notification");
                dispatcher.order_created(email, order_number, locale).await;
            }
            Event::OrderStatusChanged {
                order_id,
                ref order_number,
                ref email,
                locale,
                new_status,
            } => {
                info!(order_id = %order_id, status = %new_status, "dispatching status-changed notification");
                dispatcher
                    .order_status_changed(email, order_number, new_status, locale)
                    .await;
            }
            Event::PaymentFailed {
                order_id,
                ref session_id,
            } => {
                warn!(order_id = %order_id, session_id = %session_id, "payment failed or cancelled");
            }
        }
    }
}
