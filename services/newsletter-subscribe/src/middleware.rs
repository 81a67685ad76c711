// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Rate-limit middleware for the subscription endpoint.

use axum::{
    extract::{Request, State},
    http::{HeaderValue, Method},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::handlers::AppState;
use crate::limiter::caller_key;
use crate::outcome::Outcome;
use crate::validator::RequestMode;

/// Admit or reject `POST <subscribe_path>` per caller.
///
/// Other requests pass straight through. When the counter store errors the
/// request is admitted and the failure logged.
pub async fn rate_limit(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    if request.method() != Method::POST
        || !request.uri().path().starts_with(&state.config.subscribe_path)
    {
        return next.run(request).await;
    }

    let Some(limiter) = state.limiter.as_ref() else {
        return next.run(request).await;
    };

    let caller = caller_key(request.headers());
    let decision = match limiter.check(&caller).await {
        Ok(decision) => decision,
        Err(e) => {
            warn!(error = %e, caller = %caller, "Rate limit store unavailable, admitting request");
            return next.run(request).await;
        }
    };

    if !decision.allowed {
        let retry_after_secs = decision.retry_after_secs(Utc::now(), limiter.window());
        debug!(caller = %caller, retry_after_secs, "Request rate limited");

        let outcome = Outcome::RateLimited { retry_after_secs };
        state.metrics.record(&outcome);
        return outcome.into_response(RequestMode::Json, &state.config.redirect);
    }

    let mut response = next.run(request).await;
    response.headers_mut().insert(
        "x-ratelimit-remaining",
        HeaderValue::from(decision.remaining),
    );
    response
}
