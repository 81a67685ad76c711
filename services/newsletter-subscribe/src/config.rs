// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Configuration for the newsletter subscribe service.
//!
//! Everything is optional at load time. Missing provider credentials surface
//! as a 500 on each submission, and a missing rate-limit store turns the
//! limiter off rather than failing startup.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Configuration for the newsletter subscribe service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server bind address (default: 0.0.0.0:8080)
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Path of the subscription endpoint (default: /api/subscribe)
    #[serde(default = "default_subscribe_path")]
    pub subscribe_path: String,

    /// Largest request body the handler reads, in bytes (default: 16 KiB)
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,

    /// Redirect targets for native form posts
    #[serde(default)]
    pub redirect: RedirectConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Mailing-list provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Metrics configuration
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Where form-mode callers are sent after a submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedirectConfig {
    #[serde(default = "default_success_path")]
    pub success_path: String,

    #[serde(default = "default_error_path")]
    pub error_path: String,
}

/// Sliding-window rate limiting for subscription attempts.
#[derive(Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Admitted requests per caller per window (default: 5)
    #[serde(default = "default_max_requests")]
    pub max_requests: u32,

    /// Window length in seconds (default: 60)
    #[serde(default = "default_window_secs")]
    pub window_secs: u64,

    /// Upstash Redis REST endpoint
    #[serde(default)]
    pub store_url: Option<String>,

    /// Upstash Redis REST token
    #[serde(default, skip_serializing)]
    pub store_token: Option<String>,

    /// Fall back to a process-local store when no shared store is configured
    #[serde(default)]
    pub in_memory: bool,
}

/// Mailing-list provider (ConvertKit v3) configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,

    /// Numeric form identifier the subscriber is added to
    #[serde(default)]
    pub form_id: Option<String>,

    #[serde(default = "default_api_base")]
    pub api_base: String,
}

/// Metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable Prometheus metrics endpoint (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Metrics endpoint path (default: /metrics)
    #[serde(default = "default_metrics_path")]
    pub path: String,
}

/// Provider settings that make upstream calls impossible.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("CONVERTKIT_API_KEY is not set")]
    MissingApiKey,

    #[error("CONVERTKIT_FORM_ID is not set")]
    MissingFormId,

    #[error("CONVERTKIT_FORM_ID must be numeric")]
    InvalidFormId,
}

/// Validated provider credentials, ready for an upstream call.
#[derive(Clone, PartialEq, Eq)]
pub struct ProviderCredentials {
    pub api_key: String,
    pub form_id: String,
}

impl std::fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("api_key", &"<redacted>")
            .field("form_id", &self.form_id)
            .finish()
    }
}

impl std::fmt::Debug for RateLimitConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimitConfig")
            .field("max_requests", &self.max_requests)
            .field("window_secs", &self.window_secs)
            .field("store_url", &self.store_url)
            .field("store_token", &self.store_token.as_ref().map(|_| "<redacted>"))
            .field("in_memory", &self.in_memory)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("form_id", &self.form_id)
            .field("api_base", &self.api_base)
            .finish()
    }
}

// Default value functions
fn default_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_subscribe_path() -> String {
    "/api/subscribe".to_string()
}

fn default_max_body_bytes() -> usize {
    16 * 1024
}

fn default_success_path() -> String {
    "/?subscribed=true".to_string()
}

fn default_error_path() -> String {
    "/?subscribe_error=true".to_string()
}

fn default_max_requests() -> u32 {
    5
}

fn default_window_secs() -> u64 {
    60
}

fn default_api_base() -> String {
    "https://api.convertkit.com/v3".to_string()
}

fn default_true() -> bool {
    true
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            subscribe_path: default_subscribe_path(),
            max_body_bytes: default_max_body_bytes(),
            redirect: RedirectConfig::default(),
            rate_limit: RateLimitConfig::default(),
            provider: ProviderConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for RedirectConfig {
    fn default() -> Self {
        Self {
            success_path: default_success_path(),
            error_path: default_error_path(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: default_max_requests(),
            window_secs: default_window_secs(),
            store_url: None,
            store_token: None,
            in_memory: false,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            form_id: None,
            api_base: default_api_base(),
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            path: default_metrics_path(),
        }
    }
}

impl Config {
    /// Load configuration from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// Blank values are treated as unset. Numbers that fail to parse keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        Self {
            bind_addr: var("BIND_ADDR").unwrap_or(defaults.bind_addr),
            subscribe_path: var("SUBSCRIBE_PATH").unwrap_or(defaults.subscribe_path),
            max_body_bytes: var("MAX_BODY_BYTES")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_body_bytes),
            redirect: RedirectConfig {
                success_path: var("SUBSCRIBE_SUCCESS_PATH")
                    .unwrap_or(defaults.redirect.success_path),
                error_path: var("SUBSCRIBE_ERROR_PATH").unwrap_or(defaults.redirect.error_path),
            },
            rate_limit: RateLimitConfig {
                max_requests: var("RATE_LIMIT_MAX")
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(defaults.rate_limit.max_requests),
                window_secs: var("RATE_LIMIT_WINDOW_SECS")
                    .and_then(|v| v.parse().ok())
                    .filter(|secs| *secs > 0)
                    .unwrap_or(defaults.rate_limit.window_secs),
                store_url: var("UPSTASH_REDIS_REST_URL"),
                store_token: var("UPSTASH_REDIS_REST_TOKEN"),
                in_memory: var("RATE_LIMIT_IN_MEMORY").is_some_and(|v| parse_flag(&v)),
            },
            provider: ProviderConfig {
                api_key: var("CONVERTKIT_API_KEY"),
                form_id: var("CONVERTKIT_FORM_ID"),
                api_base: var("CONVERTKIT_API_BASE").unwrap_or(defaults.provider.api_base),
            },
            metrics: MetricsConfig {
                enabled: var("METRICS_ENABLED")
                    .map(|v| parse_flag(&v))
                    .unwrap_or(defaults.metrics.enabled),
                path: var("METRICS_PATH").unwrap_or(defaults.metrics.path),
            },
        }
    }
}

impl RateLimitConfig {
    /// Get the rate window duration
    pub fn window_duration(&self) -> Duration {
        Duration::from_secs(self.window_secs)
    }

    /// Store URL and token, only when both are present.
    pub fn store_credentials(&self) -> Option<(&str, &str)> {
        match (self.store_url.as_deref(), self.store_token.as_deref()) {
            (Some(url), Some(token)) if !url.is_empty() && !token.is_empty() => Some((url, token)),
            _ => None,
        }
    }
}

impl ProviderConfig {
    /// Check that an upstream call can be attempted.
    ///
    /// The form id is interpolated into the provider URL, so anything other
    /// than ASCII digits is refused.
    pub fn credentials(&self) -> Result<ProviderCredentials, ConfigError> {
        let api_key = self
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or(ConfigError::MissingApiKey)?;
        let form_id = self
            .form_id
            .as_deref()
            .filter(|id| !id.is_empty())
            .ok_or(ConfigError::MissingFormId)?;

        if !form_id.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ConfigError::InvalidFormId);
        }

        Ok(ProviderCredentials {
            api_key: api_key.to_string(),
            form_id: form_id.to_string(),
        })
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
