// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Terminal outcomes of a submission and how each is shown to the caller.
//!
//! The pipeline only ever produces an [`Outcome`]. [`Outcome::into_response`]
//! is the one place that turns it into HTTP, as JSON for script clients or as
//! a 303 redirect for native form posts.

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::config::RedirectConfig;
use crate::validator::RequestMode;

const NO_STORE: &str = "no-store";

/// Why caller input was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Body could not be parsed under its declared content type
    MalformedBody,
    /// Email missing, too long, or badly shaped
    InvalidEmail,
}

/// Why the provider call produced nothing usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamFailure {
    /// The request never completed
    Unreachable,
    /// The provider answered with something that is not JSON
    UndecodableBody,
}

/// Terminal result of one submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Honeypot filled; answered exactly like a success
    BotIgnored,
    ValidationRejected(Rejection),
    ConfigError,
    UpstreamTransportError(UpstreamFailure),
    /// Non-2xx status or an `error` field in the provider body
    UpstreamLogicalError,
    RateLimited { retry_after_secs: u64 },
    UnsupportedMedia,
    MethodNotAllowed,
}

#[derive(Serialize)]
struct OkBody {
    ok: bool,
}

#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
}

impl Outcome {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Success | Self::BotIgnored => StatusCode::OK,
            Self::ValidationRejected(Rejection::MalformedBody) => StatusCode::BAD_REQUEST,
            Self::ValidationRejected(Rejection::InvalidEmail) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::ConfigError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::UpstreamTransportError(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamLogicalError => StatusCode::UNPROCESSABLE_ENTITY,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::UnsupportedMedia => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::MethodNotAllowed => StatusCode::METHOD_NOT_ALLOWED,
        }
    }

    /// Whether the caller should see this as a successful signup.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success | Self::BotIgnored)
    }

    /// Caller-facing message. Never carries request or upstream detail.
    pub fn message(&self) -> Option<&'static str> {
        let message = match self {
            Self::Success | Self::BotIgnored => return None,
            Self::ValidationRejected(Rejection::MalformedBody) => "Invalid request body.",
            Self::ValidationRejected(Rejection::InvalidEmail) => {
                "Please enter a valid email address."
            }
            Self::ConfigError => "Server configuration error. Please try again later.",
            Self::UpstreamTransportError(UpstreamFailure::Unreachable) => {
                "Network error. Please try again."
            }
            Self::UpstreamTransportError(UpstreamFailure::UndecodableBody) => {
                "Unexpected response from email service. Please try again."
            }
            Self::UpstreamLogicalError => "Could not subscribe. Please try again.",
            Self::RateLimited { .. } => "Too many requests. Please try again later.",
            Self::UnsupportedMedia => "Unsupported content type.",
            Self::MethodNotAllowed => "Method not allowed.",
        };
        Some(message)
    }

    /// Metrics label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::BotIgnored => "bot_ignored",
            Self::ValidationRejected(Rejection::MalformedBody) => "invalid_body",
            Self::ValidationRejected(Rejection::InvalidEmail) => "invalid_email",
            Self::ConfigError => "config_error",
            Self::UpstreamTransportError(UpstreamFailure::Unreachable) => "upstream_unreachable",
            Self::UpstreamTransportError(UpstreamFailure::UndecodableBody) => {
                "upstream_bad_response"
            }
            Self::UpstreamLogicalError => "upstream_rejected",
            Self::RateLimited { .. } => "rate_limited",
            Self::UnsupportedMedia => "unsupported_media",
            Self::MethodNotAllowed => "method_not_allowed",
        }
    }

    /// Outcomes answered in JSON whatever the request mode.
    fn always_json(&self) -> bool {
        matches!(
            self,
            Self::UnsupportedMedia | Self::MethodNotAllowed | Self::RateLimited { .. }
        )
    }

    /// Encode this outcome for a caller that submitted in `mode`.
    pub fn into_response(self, mode: RequestMode, redirects: &RedirectConfig) -> Response {
        if mode == RequestMode::Form && !self.always_json() {
            let target = if self.is_success() {
                &redirects.success_path
            } else {
                &redirects.error_path
            };
            return see_other(target);
        }

        let status = self.status();
        let mut response = match self.message() {
            None => (status, Json(OkBody { ok: true })).into_response(),
            Some(error) => (status, Json(ErrorBody { error })).into_response(),
        };

        let headers = response.headers_mut();
        headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
        match self {
            Self::MethodNotAllowed => {
                headers.insert(header::ALLOW, HeaderValue::from_static("POST"));
            }
            Self::RateLimited { retry_after_secs } => {
                headers.insert(header::RETRY_AFTER, HeaderValue::from(retry_after_secs));
                headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
            }
            _ => {}
        }
        response
    }
}

fn see_other(target: &str) -> Response {
    let location = HeaderValue::try_from(target).unwrap_or_else(|_| HeaderValue::from_static("/"));
    (
        StatusCode::SEE_OTHER,
        [
            (header::LOCATION, location),
            (header::CACHE_CONTROL, HeaderValue::from_static(NO_STORE)),
        ],
    )
        .into_response()
}
