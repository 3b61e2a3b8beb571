use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::RngCore;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::entities::payment_session::{self, SessionStatus};
use crate::errors::ServiceError;
use crate::stores::StorefrontStore;

/// Random bytes behind a session id; hex-encoded to 32 characters.
const SESSION_ID_BYTES: usize = 16;

/// Accepted drift between the submitted amount and the order total, in minor
/// units, to absorb rounding differences on the client side.
const AMOUNT_TOLERANCE_CENTS: i64 = 1;

#[derive(Debug, Clone)]
pub struct PaymentSessionConfig {
    /// Origin of the payment UI; the session id is appended as a query
    /// parameter when building redirect targets.
    pub frontend_origin: String,
    pub merchant_name: String,
    pub session_ttl: Duration,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionRequest {
    pub order_id: Uuid,
    #[validate(range(min = 1, message = "Amount must be positive"))]
    pub amount_cents: i64,
    #[validate(length(min = 3, max = 3, message = "Currency must be a 3-letter ISO code"))]
    pub currency: String,
    pub success_url: Option<String>,
    pub cancel_url: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OpenSessionResponse {
    pub session_id: String,
    pub url: String,
}

/// Read-only projection served to the payment UI. Carries nothing beyond
/// what the UI needs to render the payment form.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub session_id: String,
    pub amount_cents: i64,
    pub currency: String,
    pub order_id: Uuid,
    pub status: SessionStatus,
    pub expires_at: DateTime<Utc>,
    pub merchant: String,
}

/// Opens and projects payment sessions. Decisions live in
/// [`crate::services::resolver`].
#[derive(Clone)]
pub struct PaymentSessionService {
    store: Arc<dyn StorefrontStore>,
    config: PaymentSessionConfig,
}

impl PaymentSessionService {
    pub fn new(store: Arc<dyn StorefrontStore>, config: PaymentSessionConfig) -> Self {
        Self { store, config }
    }

    /// Opens a `Pending` session for an existing order. The submitted amount
    /// must match the order total within one minor unit; on mismatch nothing
    /// is persisted.
    #[instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn open_session(
        &self,
        request: OpenSessionRequest,
    ) -> Result<OpenSessionResponse, ServiceError> {
        request.validate()?;

        let order = self
            .store
            .fetch_order(request.order_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Order {} not found", request.order_id))
            })?;

        let expected = amount_in_minor_units(order.total)?;
        if (expected - request.amount_cents).abs() > AMOUNT_TOLERANCE_CENTS {
            return Err(ServiceError::AmountMismatch(format!(
                "expected {expected} minor units, got {}",
                request.amount_cents
            )));
        }

        let session_id = generate_session_id();
        let now = Utc::now();
        let session = payment_session::Model {
            id: session_id.clone(),
            order_id: order.id,
            amount_cents: request.amount_cents,
            currency: request.currency.to_ascii_uppercase(),
            status: SessionStatus::Pending,
            success_url: request.success_url,
            cancel_url: request.cancel_url,
            expires_at: now
                + chrono::Duration::from_std(self.config.session_ttl)
                    .map_err(|e| ServiceError::InternalError(e.to_string()))?,
            created_at: now,
            updated_at: Some(now),
        };

        let inserted = self.store.insert_session(session).await?;
        info!(session_id = %inserted.id, order_id = %order.id, "payment session opened");

        Ok(OpenSessionResponse {
            url: format!(
                "{}/pay?session={}",
                self.config.frontend_origin.trim_end_matches('/'),
                inserted.id
            ),
            session_id: inserted.id,
        })
    }

    /// Public projection of a session. A `Pending` session past its expiry is
    /// shown as `Failed`; the record itself is only mutated on decide.
    #[instrument(skip(self))]
    pub async fn session_view(&self, session_id: &str) -> Result<SessionView, ServiceError> {
        let session = self
            .store
            .fetch_session(session_id)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Payment session {session_id} not found"))
            })?;

        let status = if session.status == SessionStatus::Pending
            && Utc::now() >= session.expires_at
        {
            SessionStatus::Failed
        } else {
            session.status
        };

        Ok(SessionView {
            session_id: session.id,
            amount_cents: session.amount_cents,
            currency: session.currency,
            order_id: session.order_id,
            status,
            expires_at: session.expires_at,
            merchant: self.config.merchant_name.clone(),
        })
    }
}

/// Converts a 2-decimal currency amount to integer minor units.
pub fn amount_in_minor_units(total: Decimal) -> Result<i64, ServiceError> {
    (total * Decimal::from(100))
        .round()
        .to_i64()
        .ok_or_else(|| {
            ServiceError::InternalError(format!("order total {total} out of range"))
        })
}

/// Opaque session token from a cryptographically strong source.
fn generate_session_id() -> String {
    let mut bytes = [0u8; SESSION_ID_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}
