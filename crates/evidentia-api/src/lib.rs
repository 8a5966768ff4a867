//! # evidentia-api: Axum API Service for Evidentia
//!
//! Multi-tenant compliance record keeping. Every authenticated request is
//! scoped to the tenant named in its token; records of other tenants are
//! indistinguishable from absent ones.
//!
//! ## API Surface
//!
//! | Prefix                     | Module                     | Auth          |
//! |----------------------------|----------------------------|---------------|
//! | `/api/v1/auth/*`           | [`routes::auth`]           | public        |
//! | `/api/v1/profile*`         | [`routes::profile`]        | bearer        |
//! | `/api/v1/organization*`    | [`routes::organization`]   | bearer        |
//! | `/api/v1/users*`           | [`routes::users`]          | bearer        |
//! | `/api/v1/requirements*`    | [`routes::requirements`]   | bearer        |
//! | `/api/v1/evidence*`        | [`routes::evidence`]       | bearer        |
//! | `/api/v1/audit-logs*`      | [`routes::audit`]          | bearer        |
//! | `/api/v1/reports*`         | [`routes::reports`]        | bearer        |
//! | `/api/v1/subscription*`    | [`routes::subscription`]   | bearer        |
//! | `/api/v1/workers/*`        | [`routes::workers`]        | worker token  |
//! | `/health`, `/metrics`      | [`routes::health`]         | public        |
//! | `/openapi.json`            | [`openapi`]                | public        |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! Cors → Timeout → Trace → Metrics → Auth → Handler
//! ```

pub mod audit;
pub mod auth;
pub mod blob;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod state;

use axum::extract::DefaultBodyLimit;
use axum::middleware::from_fn;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::timeout::TimeoutLayer;

use crate::auth::AuthConfig;

pub use crate::config::AppConfig;
pub use crate::state::AppState;

/// Request bodies are JSON metadata only; file bytes go to the blob store.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Assemble the full application router with all routes and middleware.
///
/// Public account routes, worker callbacks, health, metrics and the OpenAPI
/// document are mounted outside the auth middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig::new(
        &state.config.jwt_secret,
        state.config.jwt_issuer.as_deref(),
    );
    let timeout = state.config.request_timeout;

    let api = Router::new()
        .merge(routes::profile::router())
        .merge(routes::organization::router())
        .merge(routes::users::router())
        .merge(routes::requirements::router())
        .merge(routes::evidence::router())
        .merge(routes::audit::router())
        .merge(routes::reports::router())
        .merge(routes::subscription::router())
        .layer(from_fn(auth::auth_middleware))
        .layer(axum::Extension(auth_config));

    let public = Router::new()
        .merge(routes::auth::router())
        .merge(routes::workers::router())
        .merge(routes::health::router())
        .merge(openapi::router());

    Router::new()
        .merge(public)
        .merge(api)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(from_fn(middleware::metrics::metrics_middleware))
        .layer(middleware::tracing_layer::layer())
        .layer(TimeoutLayer::new(timeout))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
