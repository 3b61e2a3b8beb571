use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::order::OrderStatus;
use crate::entities::payment_session::SessionStatus;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::stores::{SettlementOutcome, StorefrontStore};

/// The single value a decision produces. HTTP translation happens in the
/// handler; nothing in here writes a response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub redirect_url: String,
}

/// Applies a payment decision to a session and, transitively, its order.
///
/// The success path delegates to the store's settlement unit of work; every
/// other path is a pair of single-document updates. Each call produces
/// exactly one `Decision` or one error.
#[derive(Clone)]
pub struct DecisionResolver {
    store: Arc<dyn StorefrontStore>,
    event_sender: Option<Arc<EventSender>>,
    frontend_origin: String,
}

impl DecisionResolver {
    pub fn new(
        store: Arc<dyn StorefrontStore>,
        event_sender: Option<Arc<EventSender>>,
        frontend_origin: String,
    ) -> Self {
        Self {
            store,
            event_sender,
            frontend_origin,
        }
    }

    #[instrument(skip(self), fields(session_id = %session_id, result = %result))]
    pub async fn decide(&self, session_id: &str, result: &str) -> Result<Decision, ServiceError> {
        let session = self
            .store
            .fetch_session(session_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Payment session {session_id} not found"))
            })?;

        let origin = self.frontend_origin.trim_end_matches('/');
        let cancel_redirect = session
            .cancel_url
            .clone()
            .unwrap_or_else(|| format!("{origin}/payment/cancelled"));
        let success_redirect = session
            .success_url
            .clone()
            .unwrap_or_else(|| format!("{origin}/payment/success"));

        // A session resolves exactly once. Whatever arrives after a terminal
        // status only reports the recorded outcome.
        if session.status.is_terminal() {
            let redirect_url = if session.status == SessionStatus::Succeeded {
                success_redirect
            } else {
                cancel_redirect
            };
            return Ok(Decision { redirect_url });
        }

        // Expiry dominates the submitted result, including "success".
        if Utc::now() >= session.expires_at {
            self.store
                .finish_session(session_id, SessionStatus::Failed)
                .await?;
            self.cancel_order_best_effort(session.order_id).await;
            self.emit(Event::PaymentFailed {
                order_id: session.order_id,
                session_id: session.id.clone(),
            })
            .await;
            return Err(ServiceError::PaymentSessionExpired);
        }

        match result {
            "success" => {
                match self
                    .store
                    .settle_success(session_id, session.order_id)
                    .await?
                {
                    SettlementOutcome::Applied(settled) => {
                        info!(order_id = %settled.id, "stock reserved, order created");
                        self.emit(Event::OrderCreated {
                            order_id: settled.id,
                            order_number: settled.order_number.clone(),
                            email: settled.entered_email.clone(),
                            locale: settled.locale,
                        })
                        .await;
                        Ok(Decision {
                            redirect_url: success_redirect,
                        })
                    }
                    SettlementOutcome::AlreadySettled(prior) => {
                        info!(order_id = %prior.id, status = %prior.status, "decision already applied, reporting prior outcome");
                        Ok(Decision {
                            redirect_url: success_redirect,
                        })
                    }
                    SettlementOutcome::OrderMissing => Err(ServiceError::NotFound(format!(
                        "Order {} not found",
                        session.order_id
                    ))),
                    SettlementOutcome::InsufficientStock { manufacturing_id } => {
                        Err(ServiceError::InsufficientStock(manufacturing_id))
                    }
                }
            }
            "cancel" => {
                self.store
                    .finish_session(session_id, SessionStatus::Cancelled)
                    .await?;
                self.cancel_order_best_effort(session.order_id).await;
                self.emit(Event::PaymentFailed {
                    order_id: session.order_id,
                    session_id: session.id.clone(),
                })
                .await;
                Ok(Decision {
                    redirect_url: cancel_redirect,
                })
            }
            other => {
                // Catch-all: anything that is not success or cancel counts
                // as a failure, without surfacing an error to the UI.
                warn!(result = %other, "unrecognized decision result, resolving as failed");
                self.store
                    .finish_session(session_id, SessionStatus::Failed)
                    .await?;
                self.cancel_order_best_effort(session.order_id).await;
                self.emit(Event::PaymentFailed {
                    order_id: session.order_id,
                    session_id: session.id.clone(),
                })
                .await;
                Ok(Decision {
                    redirect_url: cancel_redirect,
                })
            }
        }
    }

    /// The session is the record being resolved on these paths; a missing or
    /// unwritable order must not leave the session stuck in `Pending`.
    async fn cancel_order_best_effort(&self, order_id: Uuid) {
        if let Err(e) = self
            .store
            .set_order_status(order_id, OrderStatus::Cancelled)
            .await
        {
            warn!(order_id = %order_id, error = %e, "failed to cancel order alongside session");
        }
    }

    async fn emit(&self, event: Event) {
        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(event).await {
                warn!(error = %e, "failed to send event");
            }
        }
    }
}
