// SPDX-FileCopyrightText: 2026 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Submission intake: content negotiation, body parsing and email checks.
//!
//! The email check is a cheap pre-filter that keeps obvious junk away from
//! the provider. The provider still runs its own validation.

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::provider::is_truthy;

/// RFC 5321 path limit for a mailbox address.
pub const MAX_EMAIL_LEN: usize = 254;

const JSON_MEDIA_TYPE: &str = "application/json";
const FORM_MEDIA_TYPE: &str = "application/x-www-form-urlencoded";

/// How the caller submitted the form, which also decides the response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    /// Script-driven client posting JSON; answered with JSON
    Json,
    /// Native browser form post; answered with a 303 redirect
    Form,
    /// Anything else; answered with JSON
    Unsupported,
}

/// Fields pulled out of one inbound submission.
///
/// Values are kept as parsed so a JSON client can send any type in either
/// field without the body being refused.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub email: Option<Value>,

    /// Honeypot field, hidden from humans
    pub website: Option<Value>,
}

impl SubmissionRequest {
    /// Email as text before normalization. `None` when absent or not a string.
    pub fn raw_email(&self) -> Option<&str> {
        self.email.as_ref().and_then(Value::as_str)
    }

    /// Any truthy honeypot value marks the sender as a bot.
    pub fn is_bot(&self) -> bool {
        self.website.as_ref().is_some_and(is_truthy)
    }

    /// Normalize and check the email field.
    pub fn validated_email(&self) -> Result<String, EmailError> {
        match &self.email {
            None | Some(Value::Null) => Err(EmailError::Empty),
            Some(Value::String(raw)) => validate_email(raw),
            Some(_) => Err(EmailError::Malformed),
        }
    }
}

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed JSON body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("JSON body is not an object")]
    NotAnObject,

    #[error("Form body is not valid UTF-8")]
    FormEncoding,

    #[error("Unsupported content type")]
    Unsupported,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmailError {
    #[error("Email address is empty")]
    Empty,

    #[error("Email address exceeds 254 characters")]
    TooLong,

    #[error("Email address is malformed")]
    Malformed,
}

/// Classify a `Content-Type` header value.
pub fn negotiate(content_type: Option<&str>) -> RequestMode {
    let media_type = content_type.map(|s| {
        // Extract just the media type, ignoring charset etc.
        s.split(';').next().unwrap_or(s).trim().to_ascii_lowercase()
    });

    let mode = match media_type.as_deref() {
        Some(JSON_MEDIA_TYPE) => RequestMode::Json,
        Some(FORM_MEDIA_TYPE) => RequestMode::Form,
        _ => RequestMode::Unsupported,
    };
    debug!(content_type = ?media_type, ?mode, "Negotiated request mode");
    mode
}

/// Parse a request body under the negotiated mode.
pub fn parse_submission(mode: RequestMode, body: &[u8]) -> Result<SubmissionRequest, ParseError> {
    match mode {
        RequestMode::Json => parse_json(body),
        RequestMode::Form => parse_form(body),
        RequestMode::Unsupported => Err(ParseError::Unsupported),
    }
}

fn parse_json(body: &[u8]) -> Result<SubmissionRequest, ParseError> {
    // Parsed as a generic value so repeated keys keep the last occurrence
    let Value::Object(mut fields) = serde_json::from_slice::<Value>(body)? else {
        return Err(ParseError::NotAnObject);
    };
    Ok(SubmissionRequest {
        email: fields.remove("email"),
        website: fields.remove("website"),
    })
}

fn parse_form(body: &[u8]) -> Result<SubmissionRequest, ParseError> {
    std::str::from_utf8(body).map_err(|_| ParseError::FormEncoding)?;

    let mut submission = SubmissionRequest::default();
    // Later duplicates win
    for (key, value) in url::form_urlencoded::parse(body) {
        match key.as_ref() {
            "email" => submission.email = Some(Value::String(value.into_owned())),
            "website" => submission.website = Some(Value::String(value.into_owned())),
            _ => {}
        }
    }
    Ok(submission)
}

/// Trim and lowercase an address.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Normalize and check an address, returning the normalized form.
pub fn validate_email(raw: &str) -> Result<String, EmailError> {
    let email = normalize_email(raw);

    if email.is_empty() {
        return Err(EmailError::Empty);
    }
    if email.chars().count() > MAX_EMAIL_LEN {
        return Err(EmailError::TooLong);
    }
    if !has_email_shape(&email) {
        return Err(EmailError::Malformed);
    }
    Ok(email)
}

/// `local@domain.tld` with no whitespace, a single `@`, and a dot inside the
/// domain that is neither its first nor last character.
fn has_email_shape(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }

    domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len())
}
