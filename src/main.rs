use jewel_portal::{
    AppState,
    config::{AppConfig, Env},
    create_router,
    credentials::seed_admin,
    memory::MemoryRepository,
    repository::{PostgresRepository, RepositoryState},
};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// main
///
/// Loads configuration, sets up logging, opens the store, seeds the bootstrap admin and
/// serves HTTP until the process is stopped.
#[tokio::main]
async fn main() {
    // 1. Configuration (fail-fast on missing secrets)
    dotenv::dotenv().ok();
    let config = AppConfig::load();

    // 2. Logging filter; RUST_LOG wins when set.
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "jewel_portal=debug,tower_http=info,axum=info".into());

    // 3. Pretty output locally, JSON for log aggregation in production.
    match config.env {
        Env::Local => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().pretty())
                .init();
        }
        Env::Production => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(tracing_subscriber::fmt::layer().json())
                .init();
        }
    }

    tracing::info!("Application starting in {:?} mode", config.env);

    // 4. Store
    let repo: RepositoryState = if config.uses_memory_store() {
        tracing::warn!("Using the in-memory store; data is lost on restart.");
        Arc::new(MemoryRepository::new())
    } else {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(config.store_timeout)
            .connect(&config.db_url)
            .await
            .expect("FATAL: Failed to connect to Postgres. Check DATABASE_URL.");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("FATAL: Failed to apply database migrations.");

        Arc::new(PostgresRepository::new(pool))
    };

    // 5. Bootstrap admin
    if let (Some(email), Some(password)) = (&config.admin_email, &config.admin_password) {
        match seed_admin(repo.as_ref(), email, password).await {
            Ok(admin) => tracing::info!(account_id = %admin.id, "Bootstrap admin ready."),
            Err(e) => tracing::error!(error = %e, "Failed to seed the bootstrap admin."),
        }
    }

    // 6. Router and server
    let port = config.port;
    let app = create_router(AppState::new(repo, config));

    let address = format!("0.0.0.0:{port}");
    let listener = TcpListener::bind(&address)
        .await
        .expect("FATAL: Failed to bind the HTTP listener.");

    tracing::info!("Listening on {address}");
    tracing::info!("API Documentation (Swagger UI) available at: http://localhost:{port}/swagger-ui");

    axum::serve(listener, app)
        .await
        .expect("HTTP server terminated unexpectedly.");
}
