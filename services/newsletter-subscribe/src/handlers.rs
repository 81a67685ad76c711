// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! HTTP handlers for the newsletter subscribe service.
//!
//! A submission runs through negotiate, parse, honeypot, validate,
//! configuration check, provider call and interpretation, stopping at the
//! first step that produces an [`Outcome`].

use crate::config::Config;
use crate::limiter::RateLimiter;
use crate::metrics::Metrics;
use crate::middleware::rate_limit;
use crate::outcome::{Outcome, Rejection, UpstreamFailure};
use crate::provider::{interpret, SubscriptionProvider};
use crate::validator::{negotiate, parse_submission, RequestMode};
use axum::{
    body::Body,
    extract::State,
    http::{header, Method, Request, StatusCode},
    middleware::from_fn_with_state,
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::Serialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info};

/// Shared application state.
pub struct AppState {
    /// Absent when no counter store is configured; every request is admitted
    pub limiter: Option<RateLimiter>,
    pub provider: Arc<dyn SubscriptionProvider>,
    pub metrics: Metrics,
    pub config: Config,
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub rate_limiting: &'static str,
    pub provider_configured: bool,
}

/// Health check endpoint.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        service: "newsletter-subscribe",
        version: env!("CARGO_PKG_VERSION"),
        rate_limiting: state
            .limiter
            .as_ref()
            .map(RateLimiter::store_kind)
            .unwrap_or("disabled"),
        provider_configured: state.config.provider.credentials().is_ok(),
    })
}

/// Prometheus text exposition.
pub async fn render_metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.gather() {
        Ok(body) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            body,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Subscription endpoint. Bound for every method so non-POST requests get
/// a JSON 405.
pub async fn subscribe(State(state): State<Arc<AppState>>, request: Request<Body>) -> Response {
    let content_type = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok());
    let mode = negotiate(content_type);

    if request.method() != Method::POST {
        debug!(method = %request.method(), "Method not allowed");
        return finish(&state, Outcome::MethodNotAllowed, mode);
    }

    let outcome = if mode == RequestMode::Unsupported {
        Outcome::UnsupportedMedia
    } else {
        match axum::body::to_bytes(request.into_body(), state.config.max_body_bytes).await {
            Ok(body) => process(&state, mode, &body).await,
            Err(e) => {
                debug!(error = %e, ?mode, "Failed to read request body");
                Outcome::ValidationRejected(Rejection::MalformedBody)
            }
        }
    };

    finish(&state, outcome, mode)
}

fn finish(state: &AppState, outcome: Outcome, mode: RequestMode) -> Response {
    state.metrics.record(&outcome);
    outcome.into_response(mode, &state.config.redirect)
}

/// Run one submission body through the pipeline.
pub async fn process(state: &AppState, mode: RequestMode, body: &[u8]) -> Outcome {
    if mode == RequestMode::Unsupported {
        return Outcome::UnsupportedMedia;
    }

    let submission = match parse_submission(mode, body) {
        Ok(submission) => submission,
        Err(e) => {
            debug!(error = %e, ?mode, "Rejecting unparsable body");
            return Outcome::ValidationRejected(Rejection::MalformedBody);
        }
    };

    if submission.is_bot() {
        info!(?mode, "Honeypot field filled, ignoring submission");
        return Outcome::BotIgnored;
    }

    let email = match submission.validated_email() {
        Ok(email) => email,
        Err(e) => {
            debug!(error = %e, "Email failed validation");
            return Outcome::ValidationRejected(Rejection::InvalidEmail);
        }
    };

    let credentials = match state.config.provider.credentials() {
        Ok(credentials) => credentials,
        Err(e) => {
            error!(error = %e, "Provider is misconfigured");
            return Outcome::ConfigError;
        }
    };

    let reply = match state.provider.subscribe(&credentials, &email).await {
        Ok(reply) => reply,
        Err(e) => {
            error!(error = %e, "Provider request failed");
            return Outcome::UpstreamTransportError(UpstreamFailure::Unreachable);
        }
    };

    let outcome = interpret(&reply);
    debug!(status = reply.status, outcome = outcome.label(), "Provider replied");
    outcome
}

/// Build the service router with the rate limiter in front of the handler.
pub fn build_router(state: Arc<AppState>) -> Router {
    let mut router = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route(&state.config.subscribe_path, any(subscribe));

    if state.config.metrics.enabled {
        router = router.route(&state.config.metrics.path, get(render_metrics));
    }

    router
        .layer(from_fn_with_state(state.clone(), rate_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
