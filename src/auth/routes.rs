//! Auth route assembly.
//!
//! Public issuance routes, guarded routes, and the admin surface are built as
//! separate routers so the guard and capability gate compose per group.

use crate::auth::api::{self, AuthState};
use crate::auth::middleware::{require_admin, session_guard};
use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{get, post},
    Router,
};

/// Build the authentication router.
pub fn auth_router(state: AuthState) -> Router {
    let public = Router::new()
        .route("/api/auth/register", post(api::register))
        .route("/api/auth/login", post(api::login))
        .route("/api/auth/federated", post(api::federated_login))
        .route("/api/auth/refresh", post(api::refresh))
        .route("/api/auth/logout", post(api::logout))
        .route("/api/auth/password-reset/request", post(api::request_password_reset))
        .route("/api/auth/password-reset/complete", post(api::complete_password_reset))
        .with_state(state.clone());

    let protected = Router::new()
        .route("/api/auth/me", get(api::me))
        .route_layer(from_fn_with_state(state.clone(), session_guard))
        .with_state(state.clone());

    // Guard runs before the gate: Forbidden means "known caller, not allowed"
    let admin = Router::new()
        .route("/api/admin/users", get(api::list_users))
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), session_guard))
        .with_state(state);

    Router::new().merge(public).merge(protected).merge(admin)
}
