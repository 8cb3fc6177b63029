use crate::{AppState, handlers};
use axum::{Router, routing::put};

/// Privileged Router Module
///
/// The workflow operations. These are API calls, not page navigation, so they are gated
/// per operation by `require_admin` (explicit 401/403) rather than by the path-based
/// route gateway. Handlers receive the admin's identity as `Extension<Identity>`.
pub fn privileged_routes() -> Router<AppState> {
    Router::new()
        // PUT /api/accounts/{id}/approval  {status: "approved"|"rejected"}
        .route(
            "/api/accounts/{id}/approval",
            put(handlers::approve_account),
        )
        // PUT /api/accounts/{id}/block  {blocked: bool}
        // Salesmen only.
        .route("/api/accounts/{id}/block", put(handlers::block_account))
        // PUT /api/shops/{id}/verification  {action: "approve"|"reject"}
        // Shop flag and owner request status move together.
        .route(
            "/api/shops/{id}/verification",
            put(handlers::verify_shop),
        )
        // PUT /api/orders/{id}/status  {status: <pipeline stage>}
        // One stage forward or cancellation; anything else is 409.
        .route(
            "/api/orders/{id}/status",
            put(handlers::update_order_status),
        )
}
