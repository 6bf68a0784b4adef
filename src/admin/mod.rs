//! Admin and decision HTTP API.
//!
//! # Responsibilities
//! - Expose status, health and server views
//! - Change the algorithm, adaptive mode and server set at runtime
//! - Serve route decisions and accept outcome reports for an external
//!   transport layer
//!
//! # Design Decisions
//! - Every route sits behind the bearer-key middleware
//! - Handlers are thin: all logic lives in `routing::Balancer`
//! - Core errors map to status codes in one place (`handlers.rs`)

pub mod auth;
pub mod handlers;

use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::routing::Balancer;

use self::auth::admin_auth_middleware;
use self::handlers::*;

#[derive(Clone)]
pub struct AdminState {
    pub balancer: Arc<Balancer>,
    pub api_key: Arc<str>,
}

pub fn setup_admin_router(balancer: Arc<Balancer>, api_key: &str) -> Router {
    let state = AdminState {
        balancer,
        api_key: Arc::from(api_key),
    };

    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/health", get(get_health))
        .route("/admin/servers", get(list_servers).post(add_server))
        .route("/admin/servers/{id}", delete(remove_server))
        .route("/admin/algorithm/{name}", put(set_algorithm))
        .route("/admin/adaptive/{mode}", put(set_adaptive))
        .route("/route", get(route))
        .route("/outcome", post(report_outcome))
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
