// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Newsletter Subscribe Service
//!
//! Serves `POST /api/subscribe` for the site signup form and forwards valid
//! addresses to ConvertKit.
//!
//! ## Configuration
//!
//! Configuration is loaded from environment variables (a `.env` file is
//! read first when present):
//!
//! - `BIND_ADDR`: Server bind address (default: 0.0.0.0:8080)
//! - `CONVERTKIT_API_KEY`, `CONVERTKIT_FORM_ID`: provider credentials
//! - `UPSTASH_REDIS_REST_URL`, `UPSTASH_REDIS_REST_TOKEN`: shared rate-limit store
//! - `RATE_LIMIT_IN_MEMORY`: use a process-local store when no shared store is set
//! - `RATE_LIMIT_MAX`, `RATE_LIMIT_WINDOW_SECS`: policy (default: 5 per 60 s)
//! - `SUBSCRIBE_SUCCESS_PATH`, `SUBSCRIBE_ERROR_PATH`: form-post redirect targets

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newsletter_subscribe::{
    config::{Config, RateLimitConfig},
    handlers::{build_router, AppState},
    limiter::{MemoryStore, RateLimiter},
    metrics::Metrics,
    provider::ConvertKitClient,
    upstash::UpstashStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer().json())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .from_env_lossy(),
        )
        .init();

    let config = Config::from_env();
    info!(
        bind_addr = %config.bind_addr,
        subscribe_path = %config.subscribe_path,
        max_requests = config.rate_limit.max_requests,
        window_secs = config.rate_limit.window_secs,
        "Starting newsletter subscribe service"
    );

    if let Err(e) = config.provider.credentials() {
        warn!(error = %e, "Provider not configured, submissions will fail with 500");
    }

    let (limiter, memory_store) = build_limiter(&config.rate_limit);

    // Spawn cleanup task for the process-local store
    if let Some(store) = memory_store {
        let window = config.rate_limit.window_duration();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                store.cleanup(window).await;
            }
        });
    }

    let state = Arc::new(AppState {
        limiter,
        provider: Arc::new(ConvertKitClient::new(&config.provider.api_base)),
        metrics: Metrics::new()?,
        config: config.clone(),
    });

    let app = build_router(state);

    // Start server
    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(addr = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Pick the counter store: shared if configured, then opt-in in-memory,
/// otherwise none.
fn build_limiter(config: &RateLimitConfig) -> (Option<RateLimiter>, Option<Arc<MemoryStore>>) {
    if let Some((url, token)) = config.store_credentials() {
        info!("Rate limiting with shared Upstash store");
        let store = Arc::new(UpstashStore::new(url, token));
        return (Some(RateLimiter::new(store, config)), None);
    }

    if config.in_memory {
        warn!("No shared rate-limit store, limiting per instance only");
        let store = Arc::new(MemoryStore::new());
        return (Some(RateLimiter::new(store.clone(), config)), Some(store));
    }

    warn!("UPSTASH_REDIS_REST_URL/TOKEN not set, rate limiting disabled");
    (None, None)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
