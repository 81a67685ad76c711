// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Mailing-list provider client (ConvertKit v3).

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::config::ProviderCredentials;
use crate::outcome::{Outcome, UpstreamFailure};

/// Raw provider response, left uninterpreted.
#[derive(Debug, Clone)]
pub struct UpstreamReply {
    pub status: u16,
    pub body: Vec<u8>,
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("Provider request failed: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Something that can add an address to a mailing list.
///
/// Implementations make exactly one attempt per call.
#[async_trait]
pub trait SubscriptionProvider: Send + Sync {
    async fn subscribe(
        &self,
        credentials: &ProviderCredentials,
        email: &str,
    ) -> Result<UpstreamReply, UpstreamError>;
}

#[derive(Serialize)]
struct SubscribeBody<'a> {
    // ConvertKit v3 takes the key as a body field, not a bearer token
    api_key: &'a str,
    email: &'a str,
}

/// ConvertKit v3 form subscription client
pub struct ConvertKitClient {
    api_base: String,
    client: reqwest::Client,
}

impl ConvertKitClient {
    /// Create new provider client
    pub fn new(api_base: &str) -> Self {
        Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn subscribe_url(&self, form_id: &str) -> String {
        format!("{}/forms/{}/subscribe", self.api_base, form_id)
    }
}

#[async_trait]
impl SubscriptionProvider for ConvertKitClient {
    async fn subscribe(
        &self,
        credentials: &ProviderCredentials,
        email: &str,
    ) -> Result<UpstreamReply, UpstreamError> {
        let response = self
            .client
            .post(self.subscribe_url(&credentials.form_id))
            .json(&SubscribeBody {
                api_key: &credentials.api_key,
                email,
            })
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.bytes().await?.to_vec();
        Ok(UpstreamReply { status, body })
    }
}

/// Decide what a provider response means.
///
/// ConvertKit sometimes answers 200 with an `error` in the body, so the body
/// is always inspected.
pub fn interpret(reply: &UpstreamReply) -> Outcome {
    let body: serde_json::Value = match serde_json::from_slice(&reply.body) {
        Ok(body) => body,
        Err(e) => {
            error!(status = reply.status, error = %e, "Failed to parse provider response");
            return Outcome::UpstreamTransportError(UpstreamFailure::UndecodableBody);
        }
    };

    let success_status = (200..300).contains(&reply.status);
    let embedded_error = body.get("error").is_some_and(is_truthy);

    if !success_status || embedded_error {
        error!(status = reply.status, body = %body, "Provider rejected subscription");
        return Outcome::UpstreamLogicalError;
    }

    Outcome::Success
}

/// JSON truthiness: `null`, `false`, `0` and `""` are falsy.
pub(crate) fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => true,
    }
}
