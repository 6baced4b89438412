//! yamdb-api library - HTTP service for the YaMDb review catalog
//!
//! All resource routes live under `/api/v1` and pass through the bearer
//! token middleware, which resolves the caller but never rejects anonymous
//! requests; access decisions are made per handler.

use std::sync::Arc;

use axum::Router;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use tower_http::trace::TraceLayer;
use yamdb_common::auth::TokenSigner;
use yamdb_common::config::TomlConfig;
use yamdb_common::mail::Mailer;

pub mod api;
pub mod error;
pub mod pagination;

pub use error::{ApiError, ApiResult};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Bootstrap configuration
    pub config: Arc<TomlConfig>,
    /// Delivers confirmation codes
    pub mailer: Arc<dyn Mailer>,
    /// Issues and verifies access tokens
    pub signer: TokenSigner,
    /// Service start, for uptime reporting
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(
        db: SqlitePool,
        config: TomlConfig,
        mailer: Arc<dyn Mailer>,
        signer: TokenSigner,
    ) -> Self {
        Self {
            db,
            config: Arc::new(config),
            mailer,
            signer,
            startup_time: Utc::now(),
        }
    }

    pub fn page_size(&self) -> i64 {
        self.config.page_size
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;

    let v1 = Router::new()
        .merge(api::auth_routes())
        .merge(api::user_routes())
        .merge(api::catalog_routes())
        .merge(api::title_routes())
        .merge(api::review_routes())
        .merge(api::comment_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    Router::new()
        .nest("/api/v1", v1)
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
