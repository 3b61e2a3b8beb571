pub mod health;
pub mod orders;
pub mod payments;

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::{FromRequest, Request};
use axum::Json;
use serde::de::DeserializeOwned;

use crate::config::AppConfig;
use crate::errors::ServiceError;
use crate::events::EventSender;
use crate::services::resolver::DecisionResolver;
use crate::services::sessions::{PaymentSessionConfig, PaymentSessionService};
use crate::stores::StorefrontStore;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// JSON extractor whose rejections surface as 400 validation errors in the
/// standard error body, instead of axum's bare 422.
pub struct AppJson<T>(pub T);

#[async_trait]
impl<T, S> FromRequest<S> for AppJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ServiceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(AppJson(value)),
            Err(rejection) => Err(ServiceError::ValidationError(rejection.body_text())),
        }
    }
}

/// Services layer wired into HTTP handlers.
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<crate::services::orders::OrderService>,
    pub sessions: Arc<PaymentSessionService>,
    pub resolver: Arc<DecisionResolver>,
}

impl AppServices {
    pub fn new(
        store: Arc<dyn StorefrontStore>,
        event_sender: Arc<EventSender>,
        config: &AppConfig,
    ) -> Self {
        let orders = Arc::new(crate::services::orders::OrderService::new(
            store.clone(),
            Some(event_sender.clone()),
            config.currency.clone(),
        ));
        let sessions = Arc::new(PaymentSessionService::new(
            store.clone(),
            PaymentSessionConfig {
                frontend_origin: config.frontend_origin.clone(),
                merchant_name: config.merchant_name.clone(),
                session_ttl: config.session_ttl(),
            },
        ));
        let resolver = Arc::new(DecisionResolver::new(
            store,
            Some(event_sender),
            config.frontend_origin.clone(),
        ));

        Self {
            orders,
            sessions,
            resolver,
        }
    }
}
