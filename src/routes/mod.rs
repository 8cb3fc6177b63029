/// Router Module Index
///
/// Routes are grouped by the gate that protects them. Each group gets its gate applied
/// where it is merged in `create_router`, so a route can only be added under an explicit
/// access decision.

/// Unauthenticated: health, registration, login, logout.
pub mod public;

/// JSON API for any caller holding a valid token (401 otherwise).
pub mod authenticated;

/// JSON API for workflow operations, wrapped with the admin-only privileged gate (401/403).
pub mod privileged;

/// The admin page area, `/admin/*`, behind the route gateway.
pub mod admin;

/// The salesman page area, `/salesman/*`, behind the route gateway.
pub mod salesman;
