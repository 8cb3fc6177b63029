use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, patch},
};

/// Authenticated Router Module
///
/// JSON endpoints for any signed-in caller, verified or not. The router is layered with
/// `auth_middleware` in `create_router`, which hands handlers the caller as
/// `Extension<Identity>`.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /api/me
        // The caller's account as currently stored (approval may have changed since login).
        .route("/api/me", get(handlers::get_me))
        // GET /api/notifications
        .route("/api/notifications", get(handlers::get_notifications))
        // PATCH /api/notifications/{id}/read
        // Ownership is enforced in the store query.
        .route(
            "/api/notifications/{id}/read",
            patch(handlers::mark_notification_read),
        )
}
