// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Shared counter store over the Upstash Redis REST API.
//!
//! Each check is a single `EVAL`, so pruning, counting and recording happen
//! atomically inside Redis no matter how many instances share the key.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::limiter::{CounterStore, RateLimitDecision, StoreError};

const KEY_PREFIX: &str = "newsletter:ratelimit";

/// Sorted-set sliding log. Returns `{allowed, reset_at_ms, remaining}`.
const SLIDING_WINDOW_SCRIPT: &str = r"
local key = KEYS[1]
local now = tonumber(ARGV[1])
local window = tonumber(ARGV[2])
local limit = tonumber(ARGV[3])

redis.call('ZREMRANGEBYSCORE', key, '-inf', now - window)
local count = redis.call('ZCARD', key)
local allowed = 0
if count < limit then
  redis.call('ZADD', key, now, ARGV[4])
  count = count + 1
  allowed = 1
end
redis.call('PEXPIRE', key, window)

local reset = now + window
local oldest = redis.call('ZRANGE', key, 0, 0, 'WITHSCORES')
if oldest[2] then
  reset = tonumber(oldest[2]) + window
end
return {allowed, reset, limit - count}
";

#[derive(Debug, Deserialize)]
struct RestReply {
    #[serde(default)]
    result: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<String>,
}

/// Counter store backed by Upstash Redis.
pub struct UpstashStore {
    url: String,
    token: String,
    client: reqwest::Client,
}

impl UpstashStore {
    pub fn new(url: &str, token: &str) -> Self {
        Self {
            url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn key_for(caller: &str) -> String {
        format!("{KEY_PREFIX}:{caller}")
    }
}

#[async_trait]
impl CounterStore for UpstashStore {
    async fn hit(
        &self,
        key: &str,
        limit: u32,
        window: Duration,
    ) -> Result<RateLimitDecision, StoreError> {
        let now_ms = Utc::now().timestamp_millis();
        let window_ms = window.as_millis() as i64;
        let member = format!("{now_ms}-{}", uuid::Uuid::new_v4());

        let command = serde_json::json!([
            "EVAL",
            SLIDING_WINDOW_SCRIPT,
            "1",
            Self::key_for(key),
            now_ms.to_string(),
            window_ms.to_string(),
            limit.to_string(),
            member,
        ]);

        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(&command)
            .send()
            .await?;

        let status = response.status();
        let reply: RestReply = match response.json().await {
            Ok(reply) => reply,
            Err(_) if !status.is_success() => return Err(StoreError::Status(status.as_u16())),
            Err(e) => return Err(StoreError::Transport(e)),
        };

        if let Some(error) = reply.error {
            return Err(StoreError::Command(error));
        }
        if !status.is_success() {
            return Err(StoreError::Status(status.as_u16()));
        }

        let decision = decode_decision(reply.result)?;
        debug!(
            key,
            allowed = decision.allowed,
            remaining = decision.remaining,
            "Upstash rate limit reply"
        );
        Ok(decision)
    }

    fn kind(&self) -> &'static str {
        "shared"
    }
}

fn decode_decision(result: Option<serde_json::Value>) -> Result<RateLimitDecision, StoreError> {
    let unexpected = |v: &Option<serde_json::Value>| {
        StoreError::UnexpectedReply(
            v.as_ref()
                .map(|v| v.to_string())
                .unwrap_or_else(|| "null".to_string()),
        )
    };

    let values: Vec<i64> = result
        .as_ref()
        .and_then(|v| v.as_array())
        .and_then(|items| items.iter().map(serde_json::Value::as_i64).collect())
        .ok_or_else(|| unexpected(&result))?;

    let &[allowed, reset_ms, remaining] = values.as_slice() else {
        return Err(unexpected(&result));
    };
    let reset_at = Utc
        .timestamp_millis_opt(reset_ms)
        .single()
        .ok_or_else(|| unexpected(&result))?;

    Ok(RateLimitDecision {
        allowed: allowed == 1,
        remaining: remaining.max(0) as u32,
        reset_at,
    })
}
