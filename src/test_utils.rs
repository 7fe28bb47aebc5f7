//! Test utilities for integration testing (available with `test-utils` feature).

use crate::{
    AppState,
    api::models::users::Role,
    auth::{cooldown::Cooldowns, rate_limit::RateLimiter},
    config::{Config, EmailConfig, EmailTransportConfig, MagicLinkConfig},
    db::{
        handlers::{Repository, Users},
        models::users::{UserCreateDBRequest, UserDBResponse},
    },
};
use axum_test::TestServer;
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};

pub fn create_test_config() -> Config {
    // Use temp directory for test emails
    let temp_dir = std::env::temp_dir().join(format!("sopd-test-emails-{}", std::process::id()));

    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        secret_key: Some("test-secret-key-for-testing-only".to_string()),
        auth: crate::config::AuthConfig {
            magic_link: MagicLinkConfig {
                // Cooldown is zero so tests that are not about throttling can
                // issue repeatedly; throttle tests install their own tracker
                cooldown: Duration::ZERO,
                ..Default::default()
            },
            ..Default::default()
        },
        email: EmailConfig {
            transport: EmailTransportConfig::File {
                path: temp_dir.to_string_lossy().to_string(),
            },
            ..Default::default()
        },
        enable_otel_export: false,
        ..Default::default()
    }
}

/// Build an `AppState` over an existing test pool
pub async fn build_test_state(pool: PgPool) -> AppState {
    let config = create_test_config();

    AppState::builder()
        .db(pool)
        .cooldowns(Arc::new(Cooldowns::new(config.auth.magic_link.cooldown)))
        .magic_link_limiter(Arc::new(RateLimiter::new(
            config.auth.magic_link.rate_limit.window,
            config.auth.magic_link.rate_limit.max_requests,
        )))
        .config(config)
        .build()
}

/// Build a `TestServer` around the full router for endpoint tests
pub async fn create_test_app(pool: PgPool) -> TestServer {
    create_test_app_with_state(build_test_state(pool).await)
}

pub fn create_test_app_with_state(state: AppState) -> TestServer {
    let router = crate::build_router(state).expect("Failed to build router");
    TestServer::new(router).expect("Failed to create test server")
}

/// Insert a user directly, the way out-of-band provisioning would
pub async fn create_test_user(pool: &PgPool, email: &str, role: Role) -> UserDBResponse {
    let mut conn = pool.acquire().await.expect("Failed to acquire connection");
    Users::new(&mut conn)
        .create(&UserCreateDBRequest {
            email: email.to_string(),
            role,
        })
        .await
        .expect("Failed to create test user")
}
