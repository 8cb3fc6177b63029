use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Admin Area Router
///
/// Nested under `/admin`. The route gateway only lets verified admins through; everyone
/// else is redirected before reaching these handlers.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin
        // Area home; where the gateway sends admins who strayed into another area.
        .route("/", get(handlers::admin_dashboard))
        // GET /admin/dashboard
        // Pending accounts, unverified shops and open orders.
        .route("/dashboard", get(handlers::admin_dashboard))
        // GET /admin/accounts/pending
        // The approval queue.
        .route("/accounts/pending", get(handlers::pending_accounts))
        .route("/shops", get(handlers::list_shops))
        .route("/orders", get(handlers::list_orders))
}
