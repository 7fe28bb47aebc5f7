//! # sopd: SOP library backend
//!
//! `sopd` is the backend service for an SOP (Standard Operating Procedure)
//! document library. This crate implements its authentication core: a
//! passwordless "magic link" sign-in flow and cookie-based session management.
//!
//! ## Overview
//!
//! Instead of passwords, users request a one-time login link by email. The
//! service stores only a SHA-256 digest of each login token, emails the raw
//! token as a URL, and exchanges a valid token for a signed JWT carried in an
//! HttpOnly cookie. Accounts live in a `users` table provisioned out-of-band;
//! the authentication core reads identities and roles but never creates them.
//!
//! The issuance endpoint is deliberately quiet about account existence:
//! requests for unknown addresses get the same response as known ones, and are
//! throttled the same way (per-email cooldown plus a per-client fixed-window
//! rate limit).
//!
//! ## Architecture
//!
//! The application is built on [Axum](https://github.com/tokio-rs/axum) for
//! the HTTP layer and uses PostgreSQL for persistence.
//!
//! The **API layer** ([`api`]) exposes the authentication endpoints
//! (`/auth/magic-link`, `/auth/verify`, `/auth/logout`) and the session
//! introspection endpoint (`/me`).
//!
//! The **authentication layer** ([`auth`]) contains the magic-link service
//! (issuance and redemption), the JWT session codec and cookie helpers, the
//! request extractors, and the issuance throttles.
//!
//! The **database layer** ([`db`]) uses the repository pattern: each table has
//! a repository over `&mut PgConnection`, so handlers and services control
//! transaction boundaries.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clap::Parser;
//! use sopd::{Application, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = sopd::config::Args::parse();
//!     let config = Config::load(&args)?;
//!
//!     sopd::telemetry::init_telemetry(config.enable_otel_export)?;
//!
//!     let app = Application::new(config).await?;
//!     app.serve(async {
//!         tokio::signal::ctrl_c().await.expect("Failed to listen for Ctrl+C");
//!     })
//!     .await?;
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Database Setup
//!
//! The application requires a PostgreSQL database and automatically runs
//! migrations on startup via [`migrator`].

pub mod api;
pub mod auth;
pub mod config;
pub mod db;
pub mod email;
pub mod errors;
pub mod openapi;
pub mod telemetry;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

use axum::{
    Json, Router,
    http::{self, HeaderValue},
    middleware::from_fn_with_state,
    routing::{get, post},
};
use bon::Builder;
pub use config::Config;
use sqlx::PgPool;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnRequest, DefaultOnResponse, TraceLayer},
};
use tracing::{Level, debug, info, instrument};
use utoipa::OpenApi;
use utoipa_scalar::{Scalar, Servable};

use crate::{
    auth::{cooldown::Cooldowns, rate_limit::RateLimiter},
    config::CorsOrigin,
    openapi::ApiDoc,
};

pub use types::{TokenId, UserId};

/// Application state shared across all request handlers.
///
/// # Fields
///
/// - `db`: PostgreSQL connection pool
/// - `config`: Application configuration loaded from environment/files
/// - `cooldowns`: Per-email issuance cooldown tracker
/// - `magic_link_limiter`: Per-client fixed-window limiter for the issuance endpoint
#[derive(Clone, Builder)]
pub struct AppState {
    pub db: PgPool,
    pub config: Config,
    pub cooldowns: Arc<Cooldowns>,
    pub magic_link_limiter: Arc<RateLimiter>,
}

/// Get the sopd database migrator
pub fn migrator() -> sqlx::migrate::Migrator {
    sqlx::migrate!("./migrations")
}

/// Create CORS layer from configuration
fn create_cors_layer(config: &Config) -> anyhow::Result<CorsLayer> {
    let mut origins = Vec::new();
    for origin in &config.auth.security.cors.allowed_origins {
        let header_value = match origin {
            CorsOrigin::Wildcard => "*".parse::<HeaderValue>()?,
            CorsOrigin::Url(url) => url.as_str().parse::<HeaderValue>()?,
        };
        origins.push(header_value);
    }

    let mut cors = CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(config.auth.security.cors.allow_credentials)
        .expose_headers(vec![http::header::LOCATION]);

    if let Some(max_age) = config.auth.security.cors.max_age {
        cors = cors.max_age(std::time::Duration::from_secs(max_age));
    }

    Ok(cors)
}

/// Build the application router with all endpoints and middleware.
///
/// The magic-link issuance route carries its own rate-limit middleware; the
/// rest of the surface is unthrottled. CORS and tracing wrap everything.
#[instrument(skip_all)]
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    // The limiter only guards issuance, so it is a route_layer on that route
    // alone rather than a router-wide layer
    let magic_link_route = Router::new()
        .route("/auth/magic-link", post(api::handlers::auth::request_magic_link))
        .route_layer(from_fn_with_state(state.clone(), auth::rate_limit::magic_link_rate_limit));

    let router = Router::new()
        .route("/healthz", get(|| async { "OK" }))
        .route("/auth/verify", get(api::handlers::auth::verify_magic_link))
        .route("/auth/logout", post(api::handlers::auth::logout))
        .route("/me", get(api::handlers::users::get_current_session))
        .merge(magic_link_route)
        .with_state(state.clone())
        .route("/api-docs/openapi.json", get(|| async { Json(ApiDoc::openapi()) }))
        .merge(Scalar::with_url("/docs", ApiDoc::openapi()));

    let cors_layer = create_cors_layer(&state.config)?;

    let router = router.layer(cors_layer).layer(
        TraceLayer::new_for_http()
            .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
            .on_request(DefaultOnRequest::new().level(Level::INFO))
            .on_response(DefaultOnResponse::new().level(Level::INFO)),
    );

    Ok(router)
}

/// Main application struct that owns all resources and lifecycle.
///
/// # Lifecycle
///
/// 1. **Create**: [`Application::new`] connects to the database, runs
///    migrations, and builds the router
/// 2. **Serve**: [`Application::serve`] binds to a TCP port and starts
///    handling requests, shutting down gracefully on the given signal
pub struct Application {
    router: Router,
    config: Config,
    pool: PgPool,
}

impl Application {
    /// Create a new application instance with all resources initialized
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        debug!("Starting sopd with configuration: {:#?}", config);

        let pool = PgPool::connect(&config.database.url).await?;
        migrator().run(&pool).await?;

        let state = AppState::builder()
            .db(pool.clone())
            .config(config.clone())
            .cooldowns(Arc::new(Cooldowns::new(config.auth.magic_link.cooldown)))
            .magic_link_limiter(Arc::new(RateLimiter::new(
                config.auth.magic_link.rate_limit.window,
                config.auth.magic_link.rate_limit.max_requests,
            )))
            .build();

        let router = build_router(state)?;

        Ok(Self { router, config, pool })
    }

    /// Start serving the application
    pub async fn serve<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let bind_addr = self.config.bind_address();
        let listener = TcpListener::bind(&bind_addr).await?;
        info!("sopd listening on http://{}", bind_addr);

        // ConnectInfo gives the rate limiter a peer address to fall back on
        // when no x-forwarded-for header is present
        axum::serve(listener, self.router.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown)
            .await?;

        info!("Closing database connections...");
        self.pool.close().await;

        info!("Shutting down telemetry...");
        telemetry::shutdown_telemetry();

        Ok(())
    }
}
