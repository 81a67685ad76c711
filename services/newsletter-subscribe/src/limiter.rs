// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Sliding-window rate limiter for subscription attempts.
//!
//! Counters live behind [`CounterStore`] so several instances can share one
//! window (see [`crate::upstash::UpstashStore`]). [`MemoryStore`] keeps the
//! window in-process for tests and single-instance deployments.

use async_trait::async_trait;
use axum::http::HeaderMap;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

use crate::config::RateLimitConfig;

/// Bucket shared by every caller without a forwarded address.
pub const UNKNOWN_CALLER: &str = "unknown";

const FORWARDED_FOR: &str = "x-forwarded-for";

/// Outcome of one check-and-increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests left in the current window after this one
    pub remaining: u32,
    /// When the oldest counted request leaves the window
    pub reset_at: DateTime<Utc>,
}

impl RateLimitDecision {
    /// Whole seconds until `reset_at`, rounded up and kept within
    /// `1..=window`.
    pub fn retry_after_secs(&self, now: DateTime<Utc>, window: Duration) -> u64 {
        let ms = (self.reset_at - now).num_milliseconds().max(0) as u64;
        let secs = ms.div_ceil(1000);
        secs.clamp(1, window.as_secs().max(1))
    }
}

/// Errors talking to a counter store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Counter store request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Counter store responded with HTTP {0}")]
    Status(u16),

    #[error("Counter store rejected command: {0}")]
    Command(String),

    #[error("Unexpected counter store reply: {0}")]
    UnexpectedReply(String),
}

/// Atomic sliding-window counter keyed by caller.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Record a hit for `key` if fewer than `limit` hits fall inside the
    /// trailing `window`. Checking and recording must be one atomic step.
    async fn hit(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> Result<RateLimitDecision, StoreError>;

    /// Short name for logs and health output.
    fn kind(&self) -> &'static str;
}

/// Process-local sliding log.
#[derive(Default)]
pub struct MemoryStore {
    hits: RwLock<HashMap<String, VecDeque<DateTime<Utc>>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check-and-increment at an explicit instant.
    pub async fn hit_at(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let window = to_chrono(window);
        let mut hits = self.hits.write().await;
        let log = hits.entry(key.to_string()).or_default();

        while log.front().is_some_and(|t| *t <= now - window) {
            log.pop_front();
        }

        let allowed = (log.len() as u64) < u64::from(limit);
        if allowed {
            log.push_back(now);
        }

        let reset_at = log.front().map(|t| *t + window).unwrap_or(now + window);
        let remaining = u64::from(limit).saturating_sub(log.len() as u64) as u32;

        RateLimitDecision {
            allowed,
            remaining,
            reset_at,
        }
    }

    /// Drop keys with no hits left inside `window` (should be called
    /// periodically).
    pub async fn cleanup(&self, window: Duration) {
        let cutoff = Utc::now() - to_chrono(window);
        let mut hits = self.hits.write().await;
        hits.retain(|_, log| log.back().is_some_and(|t| *t > cutoff));
    }

    pub async fn tracked_keys(&self) -> usize {
        self.hits.read().await.len()
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn hit(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> Result<RateLimitDecision, StoreError> {
        Ok(self.hit_at(key, limit, window, Utc::now()).await)
    }

    fn kind(&self) -> &'static str {
        "in_memory"
    }
}

const MAX_WINDOW: Duration = Duration::from_secs(365 * 24 * 60 * 60);

fn to_chrono(window: Duration) -> chrono::Duration {
    chrono::Duration::from_std(window.min(MAX_WINDOW)).unwrap_or_else(|_| chrono::Duration::days(365))
}

/// Rate limiter bound to a store and the configured policy.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(store: Arc<dyn CounterStore>, config: &RateLimitConfig) -> Self {
        Self {
            store,
            max_requests: config.max_requests,
            window: config.window_duration(),
        }
    }

    /// Check-and-increment the window for one caller.
    pub async fn check(&self, caller: &str) -> Result<RateLimitDecision, StoreError> {
        let decision = self.store.hit(caller, self.max_requests, self.window).await?;
        debug!(
            caller,
            allowed = decision.allowed,
            remaining = decision.remaining,
            "Rate limit checked"
        );
        Ok(decision)
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn store_kind(&self) -> &'static str {
        self.store.kind()
    }
}

/// Derive the rate-limit key from the leftmost `X-Forwarded-For` entry.
///
/// Callers without the header all share [`UNKNOWN_CALLER`].
pub fn caller_key(headers: &HeaderMap) -> String {
    headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(UNKNOWN_CALLER)
        .to_string()
}
