//! Storefront API library
//!
//! Catalog-backed orders, mock payment sessions, and the decision resolver
//! that atomically reserves stock when a payment settles.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod migrator;
pub mod openapi;
pub mod rate_limiter;
pub mod services;
pub mod stores;

use std::sync::Arc;

use axum::{routing::get, Router};
use sea_orm::DatabaseConnection;

use crate::stores::StorefrontStore;

/// Shared application state for all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: config::AppConfig,
    /// Present when backed by a real database; the in-memory store runs
    /// without one.
    pub db: Option<Arc<DatabaseConnection>>,
    pub store: Arc<dyn StorefrontStore>,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

/// All API routes: orders, the mock payment gateway, and health.
pub fn routes() -> Router<AppState> {
    Router::new()
        .nest("/orders", handlers::orders::order_routes())
        .nest("/payments/mock", handlers::payments::payment_routes())
        .route("/health", get(handlers::health::health))
}

/// Complete application router with API docs attached.
pub fn app(state: AppState) -> Router {
    routes().merge(openapi::swagger_ui()).with_state(state)
}
