use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Salesman Area Router
///
/// Nested under `/salesman`; verified salesmen only.
pub fn salesman_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::salesman_orders))
        .route("/orders", get(handlers::salesman_orders))
}
