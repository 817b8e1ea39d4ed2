//! # mailsmith: credit-gated email generation
//!
//! `mailsmith` turns a short prompt into a complete email using an OpenAI-compatible chat
//! completion backend. Signed-in users pay one credit per generated email and every paid email is
//! saved to their personal history (the "vault"). Anonymous callers can still generate, but
//! nothing is charged or saved.
//!
//! ## Architecture
//!
//! The HTTP layer is built on [Axum](https://github.com/tokio-rs/axum). State lives behind the
//! storage traits in [`store`], with a PostgreSQL implementation (migrations run on startup) and
//! an in-memory implementation for development.
//!
//! ### Request Flow
//!
//! A `POST /api/generate-email` request goes through [`generation::GenerationWorkflow`]:
//!
//! 1. The prompt is validated and the caller's session token, if any, is resolved.
//! 2. The backend generates the email. Failures here abort the request.
//! 3. For signed-in callers, one credit is debited with an atomic conditional decrement and the
//!    email is appended to their history. Storage failures after this point degrade the response
//!    (`saved: false` plus a message) instead of discarding the generated text.
//!
//! Callers with no credits left get `403` and the generated text is withheld.
//!
//! ### Core Components
//!
//! - [`api`]: Route handlers and request/response models
//! - [`auth`]: Password hashing, session tokens and the current-user extractor
//! - [`db`]: PostgreSQL repositories
//! - [`generation`]: The backend client and the generation workflow
//! - [`store`]: Storage traits and their implementations
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use mailsmith::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = mailsmith::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     mailsmith::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     }).await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Configuration
//!
//! See the [`config`] module for configuration options.

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod errors;
pub mod generation;
mod metrics;
mod openapi;
pub mod store;
pub mod telemetry;
mod types;

#[cfg(test)]
pub mod test_utils;

use crate::{
    auth::identity::{IdentityProvider, SessionIdentityProvider},
    config::CorsOrigin,
    generation::{GenerationBackend, GenerationWorkflow, OpenAiBackend},
    openapi::ApiDoc,
    store::Stores,
};
use axum::http::HeaderValue;
use axum::{
    Router, http,
    routing::{delete, get, post},
};
use axum_prometheus::PrometheusMetricLayer;
use bon::Builder;
pub use config::Config;
use sqlx::{PgPool, postgres::PgPoolOptions};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument, warn};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

pub use types::{HistoryId, UserId};

/// Application state shared across all request handlers.
///
/// # Example
///
/// ```ignore
/// let state = AppState::builder()
///     .config(config)
///     .stores(stores)
///     .identity(identity)
///     .workflow(workflow)
///     .build();
/// ```
#[derive(Clone, Builder)]
pub struct AppState {
    pub config: Config,
    pub stores: Stores,
    pub identity: Arc<dyn IdentityProvider>,
    pub workflow: Arc<GenerationWorkflow>,
}

/// Wire the identity provider and the generation workflow onto `stores`.
///
/// `backend` is `None` when no backend credential is configured; generation requests then fail
/// with "OpenAI API key is not configured".
pub fn create_app_state(config: Config, stores: Stores, backend: Option<Arc<dyn GenerationBackend>>) -> AppState {
    let identity: Arc<dyn IdentityProvider> = Arc::new(SessionIdentityProvider::new(config.clone()));
    let workflow = GenerationWorkflow::new(backend, identity.clone(), stores.credits.clone(), stores.history.clone());

    AppState::builder()
        .config(config)
        .stores(stores)
        .identity(identity)
        .workflow(Arc::new(workflow))
        .build()
}

/// Get the mailsmith database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Open the configured store. For PostgreSQL, connects and runs migrations.
async fn setup_database(config: &Config) -> anyhow::Result<(Stores, Option<PgPool>)> {
    match &config.database {
        config::DatabaseConfig::Memory => {
            info!("Using in-memory store: data will be lost on shutdown");
            Ok((Stores::memory(), None))
        }
        config::DatabaseConfig::External { url, pool } => {
            info!("Using external database");
            let db = PgPoolOptions::new()
                .max_connections(pool.max_connections)
                .min_connections(pool.min_connections)
                .acquire_timeout(Duration::from_secs(pool.acquire_timeout_secs))
                .connect(url)
                .await?;
            migrator().run(&db).await?;
            Ok((Stores::postgres(db.clone()), Some(db)))
        }
    }
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let cors_config = &config.auth.cors;

    // tower-http refuses `*` inside an origin list
    let allow_origin = if cors_config.allowed_origins.iter().any(|o| matches!(o, CorsOrigin::Wildcard)) {
        AllowOrigin::any()
    } else {
        let mut origins = Vec::new();
        for origin in &cors_config.allowed_origins {
            if let CorsOrigin::Url(url) = origin {
                origins.push(url.as_str().trim_end_matches('/').parse::<HeaderValue>()?);
            }
        }
        AllowOrigin::list(origins)
    };

    let mut cors = CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([http::Method::GET, http::Method::POST, http::Method::DELETE])
        .allow_headers([http::header::AUTHORIZATION, http::header::CONTENT_TYPE])
        .allow_credentials(cors_config.allow_credentials);

    if let Some(max_age) = cors_config.max_age {
        cors = cors.max_age(Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// Adds `/internal/metrics` and the Prometheus HTTP layer when `enable_metrics` is set.
#[instrument(skip_all)]
pub fn build_router(state: &AppState) -> anyhow::Result<Router> {
    let api_routes = Router::new()
        .route("/generate-email", post(api::handlers::generate::generate_email))
        .route("/signup", post(api::handlers::auth::signup))
        .route("/login", post(api::handlers::auth::login))
        .route("/history", get(api::handlers::history::list_history))
        .route("/history/{id}", delete(api::handlers::history::delete_history))
        .route("/credits", get(api::handlers::credits::get_credits))
        .with_state(state.clone());

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .nest("/api", api_routes)
        .route("/api-docs/openapi.json", get(|| async { axum::Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let cors_layer = create_cors_layer(&state.config)?;
    let mut router = router.layer(cors_layer);

    if state.config.enable_metrics {
        let (prometheus_layer, metric_handle) = PrometheusMetricLayer::pair();

        // HTTP metrics from axum-prometheus, followed by the workflow counters
        router = router
            .route(
                "/internal/metrics",
                get(|| async move {
                    let mut body = metric_handle.render();
                    body.push_str(&metrics::render_default_registry());
                    body
                }),
            )
            .layer(prometheus_layer);
    }

    let router = router.layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// The HTTP server and the resources it owns.
///
/// 1. **Create**: [`Application::new`] opens the store, runs migrations and builds the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts handling requests
/// 3. **Shutdown**: When the shutdown signal is received, closes the pool and flushes telemetry
pub struct Application {
    router: Router,
    config: Config,
    pool: Option<PgPool>,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting mailsmith with configuration: {:#?}", config);

        let (stores, pool) = setup_database(&config).await?;

        let backend = OpenAiBackend::from_config(&config.generation)?.map(|b| Arc::new(b) as Arc<dyn GenerationBackend>);
        if backend.is_none() {
            warn!("No OpenAI API key configured: email generation will be unavailable");
        }

        let app_state = create_app_state(config.clone(), stores, backend);
        let router = build_router(&app_state)?;

        Ok(Self { router, config, pool })
    }

    /// Convert application into a test server (for tests)
    #[cfg(test)]
    pub fn into_test_server(self) -> axum_test::TestServer {
        axum_test::TestServer::new(self.router).expect("Failed to create test server")
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("mailsmith listening on http://{}", bind_addr);

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(shutdown)
            .await?;

        if let Some(pool) = self.pool {
            info!("Closing database connections...");
            pool.close().await;
        }

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
