use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable without a session. Registration creates pending accounts only, so
/// nothing here grants access to a restricted area by itself.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /
        // Public entry point; the route gateway sends rejected visitors here.
        .route("/", get(|| async { "Jewel trade portal" }))
        // GET /health
        // Liveness probe for load balancers.
        .route("/health", get(|| async { "ok" }))
        // POST /api/auth/register/shop
        // Owner account + shop, both unverified.
        .route("/api/auth/register/shop", post(handlers::register_shop))
        // POST /api/auth/register/salesman
        .route(
            "/api/auth/register/salesman",
            post(handlers::register_salesman),
        )
        // POST /api/auth/login
        // Issues the 7-day session token in an HTTP-only cookie.
        .route("/api/auth/login", post(handlers::login))
        // POST /api/auth/logout
        // Expires the cookie; there is no server-side session to revoke.
        .route("/api/auth/logout", post(handlers::logout))
}
