//! Storefront Backend - Session Authentication Service
//! Mission: Prove who a request belongs to, and nothing else

use anyhow::{Context, Result};
use axum::{middleware as axum_middleware, routing::get, Json, Router};
use serde::Serialize;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::{net::TcpListener, time::interval};
use tower_http::cors::CorsLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use storefront_backend::{
    auth::{auth_router, AuthState, JwtHandler, RevocationLedger, UserStore},
    config::Config,
    middleware::{rate_limit_middleware, request_logging, RateLimitConfig, RateLimitLayer},
    notify,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env()?;

    info!("🚀 Storefront Auth Service starting");

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;

    let user_store = Arc::new(UserStore::new(&config.users_db_path)?);
    let ledger = Arc::new(RevocationLedger::new(&config.revocation_db_path)?);
    let jwt = Arc::new(JwtHandler::new(config.token_config()));
    let notifier = notify::from_config(&http_client, config.notify_webhook_url.as_deref());

    info!(
        "🔐 Credential store: {} | revocation ledger: {}",
        config.users_db_path, config.revocation_db_path
    );
    if config.idp_jwks_url.is_some() {
        info!("🔗 Federated login enabled");
    }

    let auth_state = AuthState::new(
        user_store,
        ledger.clone(),
        jwt,
        notifier,
        http_client,
        &config,
    );

    let limiter = RateLimitLayer::new(RateLimitConfig::default());
    tokio::spawn(maintenance_loop(ledger, limiter.clone()));

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(auth_router(auth_state))
        .layer(axum_middleware::from_fn_with_state(
            limiter,
            rate_limit_middleware,
        ))
        .layer(axum_middleware::from_fn(request_logging))
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("🎯 API server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .context("Server error")?;

    Ok(())
}

/// Ledger garbage collection plus limiter cleanup, every 10 minutes.
///
/// Correctness never depends on this cadence: revocation membership checks
/// ignore naturally-expired entries on their own.
async fn maintenance_loop(ledger: Arc<RevocationLedger>, limiter: RateLimitLayer) {
    let mut ticker = interval(Duration::from_secs(600));

    loop {
        ticker.tick().await;

        match ledger.purge_expired() {
            Ok(0) => {}
            Ok(n) => info!("🧹 Purged {} expired revocation entries", n),
            Err(e) => warn!("Ledger purge failed: {:#}", e),
        }

        limiter.cleanup();
    }
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

/// Initialize tracing with env-filter overrides
fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "storefront_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
