use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::handlers::AppState;

/// Liveness probe; reports database reachability when a pool is attached.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service health")),
    tag = "Health"
)]
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let database = match &state.db {
        Some(pool) => match crate::db::check_connection(pool).await {
            Ok(()) => "up",
            Err(_) => "down",
        },
        None => "in-memory",
    };

    Json(json!({
        "status": "ok",
        "database": database,
    }))
}
