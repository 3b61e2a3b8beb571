use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

use crate::errors::ServiceError;
use crate::handlers::{AppJson, AppState};
use crate::services::resolver::Decision;
use crate::services::sessions::{OpenSessionRequest, OpenSessionResponse, SessionView};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(example = json!({
    "sessionId": "9f8d2c41a6e35b07c4d91e62f0a8b53d",
    "result": "success"
}))]
pub struct DecideRequest {
    #[validate(length(min = 1, message = "Session id is required"))]
    pub session_id: String,
    /// "success", "cancel", or anything else (treated as failure)
    #[validate(length(min = 1, message = "Result is required"))]
    pub result: String,
}

/// Open a mock payment session for a pending order
#[utoipa::path(
    post,
    path = "/payments/mock/start",
    request_body = OpenSessionRequest,
    responses(
        (status = 201, description = "Session opened", body = OpenSessionResponse),
        (status = 400, description = "Missing fields or amount mismatch", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "Mock payments"
)]
pub async fn start_session(
    State(state): State<AppState>,
    AppJson(request): AppJson<OpenSessionRequest>,
) -> Result<(StatusCode, Json<OpenSessionResponse>), ServiceError> {
    let session = state.services.sessions.open_session(request).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// Public projection of a payment session
#[utoipa::path(
    get,
    path = "/payments/mock/session/{id}",
    params(("id" = String, Path, description = "Session ID")),
    responses(
        (status = 200, description = "Session projection", body = SessionView),
        (status = 404, description = "Unknown session", body = crate::errors::ErrorResponse)
    ),
    tag = "Mock payments"
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<SessionView>, ServiceError> {
    let view = state.services.sessions.session_view(&id).await?;
    Ok(Json(view))
}

/// Resolve a payment session with a decision
#[utoipa::path(
    post,
    path = "/payments/mock/decide",
    request_body = DecideRequest,
    responses(
        (status = 200, description = "Decision applied", body = Decision),
        (status = 400, description = "Session expired", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown session or order", body = crate::errors::ErrorResponse),
        (status = 409, description = "Insufficient stock, names the offending manufacturing id", body = crate::errors::ErrorResponse)
    ),
    tag = "Mock payments"
)]
pub async fn decide(
    State(state): State<AppState>,
    AppJson(request): AppJson<DecideRequest>,
) -> Result<Json<Decision>, ServiceError> {
    request.validate()?;
    let decision = state
        .services
        .resolver
        .decide(&request.session_id, &request.result)
        .await?;
    Ok(Json(decision))
}

/// Mock payment gateway routes
pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/start", post(start_session))
        .route("/session/:id", get(get_session))
        .route("/decide", post(decide))
}
