use axum::{
    Router,
    extract::FromRef,
    http::HeaderName,
    middleware,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

pub mod auth;
pub mod config;
pub mod credentials;
pub mod error;
pub mod gateway;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod notifications;
pub mod repository;
pub mod token;
pub mod workflow;

// Routing segregated by gate (public, authenticated, privileged, restricted areas).
pub mod routes;
use routes::{admin, authenticated, privileged, public, salesman};

// --- Public Re-exports ---

pub use config::AppConfig;
pub use error::AppError;
pub use memory::MemoryRepository;
pub use repository::{PostgresRepository, RepositoryState};
pub use token::{Identity, TokenCodec};
pub use workflow::WorkflowEngine;

/// ApiDoc
///
/// OpenAPI document for every JSON endpoint, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register_shop, handlers::register_salesman, handlers::login, handlers::logout,
        handlers::get_me, handlers::get_notifications, handlers::mark_notification_read,
        handlers::approve_account, handlers::block_account, handlers::verify_shop,
        handlers::update_order_status, handlers::admin_dashboard, handlers::pending_accounts,
        handlers::list_shops, handlers::list_orders, handlers::salesman_orders
    ),
    components(
        schemas(
            models::Role, models::RequestStatus, models::OrderStatus, models::NotificationKind,
            models::Shop, models::Order, models::Notification, models::AccountProfile,
            models::RegisterShopRequest, models::RegisterSalesmanRequest, models::LoginRequest,
            models::AccountApprovalRequest, models::ShopVerificationRequest,
            models::OrderStatusRequest, models::BlockAccountRequest,
            models::RegistrationResponse, models::SessionResponse, models::AdminDashboard,
            error::ErrorBody,
        )
    ),
    tags(
        (name = "jewel-portal", description = "Jewellery trade ordering: access control and approval workflow")
    )
)]
struct ApiDoc;

/// AppState
///
/// Single shared container for the store handle, the workflow engine, the token codec
/// and the configuration. Everything in it is cheap to clone.
#[derive(Clone)]
pub struct AppState {
    pub repo: RepositoryState,
    pub workflow: WorkflowEngine,
    pub tokens: TokenCodec,
    pub config: AppConfig,
}

impl AppState {
    /// Wires the engine and codec from a store handle and a loaded configuration.
    pub fn new(repo: RepositoryState, config: AppConfig) -> Self {
        Self {
            workflow: WorkflowEngine::new(repo.clone(), config.store_timeout),
            tokens: TokenCodec::new(&config.jwt_secret),
            repo,
            config,
        }
    }
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for TokenCodec {
    fn from_ref(app_state: &AppState) -> TokenCodec {
        app_state.tokens.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles all route groups with their gates, the page-area route gateway, and the
/// observability layers.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Any valid token; 401 otherwise.
        .merge(
            authenticated::authenticated_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::auth_middleware,
            )),
        )
        // Verified admin only; 401/403 otherwise.
        .merge(
            privileged::privileged_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                auth::require_admin,
            )),
        )
        .nest("/admin", admin::admin_routes())
        .nest("/salesman", salesman::salesman_routes())
        // Path-level gate for the restricted areas; other paths pass straight through.
        .layer(middleware::from_fn_with_state(
            state.clone(),
            gateway::route_gateway,
        ))
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for each request, tagged with the `x-request-id` so every log line of one
/// request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
