// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Test harness for the newsletter subscribe service.
//!
//! Builds the real router around a scripted provider and an optional
//! counter store, and collects responses into plain values.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

use newsletter_subscribe::{
    config::{Config, ProviderConfig, ProviderCredentials, RedirectConfig},
    handlers::{build_router, AppState},
    limiter::{CounterStore, RateLimitDecision, RateLimiter, StoreError},
    metrics::Metrics,
    provider::{SubscriptionProvider, UpstreamError, UpstreamReply},
};

pub const SUCCESS_PATH: &str = "/newsletter/thanks";
pub const ERROR_PATH: &str = "/newsletter/error";

enum Script {
    Reply(u16, String),
    Unreachable,
}

/// Provider stand-in that counts calls and answers from a script.
pub struct FakeProvider {
    script: Script,
    calls: AtomicUsize,
    emails: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn replying(status: u16, body: &str) -> Arc<Self> {
        Arc::new(Self {
            script: Script::Reply(status, body.to_string()),
            calls: AtomicUsize::new(0),
            emails: Mutex::new(Vec::new()),
        })
    }

    pub fn healthy() -> Arc<Self> {
        Self::replying(200, r#"{"subscription":{"id":1,"state":"inactive"}}"#)
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self {
            script: Script::Unreachable,
            calls: AtomicUsize::new(0),
            emails: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn emails(&self) -> Vec<String> {
        self.emails.lock().unwrap().clone()
    }
}

#[async_trait]
impl SubscriptionProvider for FakeProvider {
    async fn subscribe(
        &self,
        _credentials: &ProviderCredentials,
        email: &str,
    ) -> Result<UpstreamReply, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.emails.lock().unwrap().push(email.to_string());

        match &self.script {
            Script::Reply(status, body) => Ok(UpstreamReply {
                status: *status,
                body: body.as_bytes().to_vec(),
            }),
            Script::Unreachable => {
                // A request that cannot be built fails without touching the network
                let err = reqwest::Client::new()
                    .post("not a url")
                    .send()
                    .await
                    .unwrap_err();
                Err(UpstreamError::Transport(err))
            }
        }
    }
}

/// Counter store whose every call fails.
pub struct BrokenStore;

#[async_trait]
impl CounterStore for BrokenStore {
    async fn hit(
        &self,
        _key: &str,
        _limit: u32,
        _window: Duration,
    ) -> Result<RateLimitDecision, StoreError> {
        Err(StoreError::Status(503))
    }

    fn kind(&self) -> &'static str {
        "broken"
    }
}

pub fn test_config() -> Config {
    Config {
        redirect: RedirectConfig {
            success_path: SUCCESS_PATH.to_string(),
            error_path: ERROR_PATH.to_string(),
        },
        provider: ProviderConfig {
            api_key: Some("test-api-key".to_string()),
            form_id: Some("4242".to_string()),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn limiter_with(store: Arc<dyn CounterStore>, config: &Config) -> RateLimiter {
    RateLimiter::new(store, &config.rate_limit)
}

pub fn state(
    config: Config,
    provider: Arc<dyn SubscriptionProvider>,
    limiter: Option<RateLimiter>,
) -> Arc<AppState> {
    Arc::new(AppState {
        limiter,
        provider,
        metrics: Metrics::new().unwrap(),
        config,
    })
}

pub fn app(state: Arc<AppState>) -> Router {
    build_router(state)
}

/// Collected response.
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }

    pub fn header(&self, name: header::HeaderName) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub async fn send(app: &Router, request: Request<Body>) -> TestResponse {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap()
        .to_vec();
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn request(method: Method, content_type: Option<&str>, body: impl Into<Body>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri("/api/subscribe");
    if let Some(ct) = content_type {
        builder = builder.header(header::CONTENT_TYPE, ct);
    }
    builder.body(body.into()).unwrap()
}

pub fn json_post(body: &str) -> Request<Body> {
    request(Method::POST, Some("application/json"), body.to_string())
}

pub fn form_post(body: &str) -> Request<Body> {
    request(
        Method::POST,
        Some("application/x-www-form-urlencoded"),
        body.to_string(),
    )
}

pub fn json_post_from(ip: &str, body: &str) -> Request<Body> {
    let mut request = json_post(body);
    request
        .headers_mut()
        .insert("x-forwarded-for", ip.parse().unwrap());
    request
}
