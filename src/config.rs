use std::{env, time::Duration};

/// AppConfig
///
/// The service configuration, read once at startup and immutable afterwards. Shared with
/// handlers through the application state (`FromRef`).
#[derive(Clone)]
pub struct AppConfig {
    // Postgres connection string, or `memory://` for the in-process store.
    pub db_url: String,
    pub env: Env,
    // Shared HMAC secret used to sign and verify session tokens.
    pub jwt_secret: String,
    pub port: u16,
    // Upper bound on every individual store call.
    pub store_timeout: Duration,
    // Optional bootstrap admin; both must be set for the seed to run.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

/// Env
///
/// Runtime context. Production switches logging to JSON and marks the session cookie `Secure`.
#[derive(Clone, PartialEq, Debug)]
pub enum Env {
    Local,
    Production,
}

pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

impl Default for AppConfig {
    /// Non-panicking configuration for tests; uses the in-memory store.
    fn default() -> Self {
        Self {
            db_url: "memory://".to_string(),
            env: Env::Local,
            jwt_secret: "jewel-portal-test-secret-value-local".to_string(),
            port: 3000,
            store_timeout: Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS),
            admin_email: None,
            admin_password: None,
        }
    }
}

impl AppConfig {
    /// load
    ///
    /// Reads the configuration from the environment.
    ///
    /// # Panics
    /// Panics when `DATABASE_URL` or `JWT_SECRET` is missing, in every environment. A
    /// process without the signing secret must never start serving requests.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let jwt_secret = env::var("JWT_SECRET")
            .ok()
            .filter(|secret| !secret.trim().is_empty())
            .expect("FATAL: JWT_SECRET must be set.");

        let db_url = env::var("DATABASE_URL").expect("FATAL: DATABASE_URL must be set.");

        let port = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(3000);

        let store_timeout = env::var("STORE_TIMEOUT_MS")
            .ok()
            .and_then(|ms| ms.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_millis(DEFAULT_STORE_TIMEOUT_MS));

        Self {
            db_url,
            env,
            jwt_secret,
            port,
            store_timeout,
            admin_email: env::var("ADMIN_EMAIL").ok(),
            admin_password: env::var("ADMIN_PASSWORD").ok(),
        }
    }

    pub fn secure_cookies(&self) -> bool {
        self.env == Env::Production
    }

    pub fn uses_memory_store(&self) -> bool {
        self.db_url.starts_with("memory://")
    }
}
