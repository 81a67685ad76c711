// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Newsletter Subscribe
//!
//! This crate accepts an email address from a public signup form and forwards
//! it to the mailing-list provider, behind:
//!
//! - Per-caller sliding-window rate limiting (5 requests per 60 s default)
//! - JSON and native form-post intake with matching response shapes
//! - Honeypot bot filtering that answers bots as if they succeeded
//! - Email pre-validation before any provider call
//! - Body inspection of provider replies, which may carry errors under a 200

pub mod config;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod middleware;
pub mod outcome;
pub mod provider;
pub mod upstash;
pub mod validator;

pub use config::Config;
pub use handlers::{build_router, AppState};
pub use limiter::{CounterStore, MemoryStore, RateLimitDecision, RateLimiter};
pub use outcome::Outcome;
pub use provider::{ConvertKitClient, SubscriptionProvider};
pub use validator::{RequestMode, SubmissionRequest};
