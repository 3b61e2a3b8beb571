use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::entities::order::{OrderLocale, OrderStatus};
use crate::errors::ServiceError;
use crate::rate_limiter::RecipientRateLimiter;

#[derive(Debug, Clone)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Outbound mail seam. The real SMTP integration lives outside this service;
/// the default transport just logs the message.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send(&self, message: &EmailMessage) -> Result<(), ServiceError>;
}

pub struct LogTransport;

#[async_trait]
impl EmailTransport for LogTransport {
    async fn send(&self, message: &EmailMessage) -> Result<(), ServiceError> {
        info!(to = %message.to, subject = %message.subject, "email dispatched (log transport)");
        Ok(())
    }
}

/// Best-effort order emails, throttled per recipient. Transport failures are
/// logged and swallowed; callers never wait on, or fail because of, a
/// notification.
pub struct NotificationDispatcher {
    transport: Arc<dyn EmailTransport>,
    limiter: RecipientRateLimiter,
}

impl NotificationDispatcher {
    pub fn new(transport: Arc<dyn EmailTransport>, limiter: RecipientRateLimiter) -> Self {
        Self { transport, limiter }
    }

    pub async fn order_created(&self, email: &str, order_number: &str, locale: OrderLocale) {
        let subject = match locale {
            OrderLocale::En => format!("Order {order_number} confirmed"),
            OrderLocale::Lt => format!("Užsakymas {order_number} patvirtintas"),
        };
        let body = match locale {
            OrderLocale::En => format!(
                "Thank you! Your order {order_number} has been confirmed and is being prepared."
            ),
            OrderLocale::Lt => format!(
                "Ačiū! Jūsų užsakymas {order_number} patvirtintas ir ruošiamas."
            ),
        };
        self.deliver(email, subject, body).await;
    }

    pub async fn order_status_changed(
        &self,
        email: &str,
        order_number: &str,
        new_status: OrderStatus,
        locale: OrderLocale,
    ) {
        let subject = match locale {
            OrderLocale::En => format!("Order {order_number} update"),
            OrderLocale::Lt => format!("Užsakymo {order_number} atnaujinimas"),
        };
        let body = match locale {
            OrderLocale::En => {
                format!("Your order {order_number} status is now: {new_status}.")
            }
            OrderLocale::Lt => {
                format!("Jūsų užsakymo {order_number} būsena: {new_status}.")
            }
        };
        self.deliver(email, subject, body).await;
    }

    async fn deliver(&self, email: &str, subject: String, body: String) {
        if !self.limiter.check(email) {
            debug!(to = %email, "notification dropped, recipient window exhausted");
            return;
        }

        let message = EmailMessage {
            to: email.to_string(),
            subject,
            body,
        };
        if let Err(e) = self.transport.send(&message).await {
            warn!(to = %email, error = %e, "failed to send notification");
        }
    }
}
