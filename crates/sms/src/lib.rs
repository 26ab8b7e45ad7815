//! SMS gateway client for Rust
//!
//! A small client for a JSON SMS web service plus the template helpers
//! used to build notification texts such as
//! `"Dear {name}, your car {plate} is ready"`.

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Error type
#[derive(Error, Debug)]
pub enum SmsError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Invalid recipient: {0}")]
    InvalidRecipient(String),
}

/// Outcome of one send attempt as reported by the vendor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendResult {
    pub success: bool,
    pub message_id: Option<String>,
    pub cost: f64,
    pub error: Option<String>,
}

impl SendResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            message_id: None,
            cost: 0.0,
            error: Some(error.into()),
        }
    }
}

/// An SMS vendor
#[async_trait]
pub trait SmsGateway: Send + Sync {
    /// Send one text. Vendor-side rejections come back as an unsuccessful
    /// [`SendResult`]; transport failures as `Err`.
    async fn send(&self, to: &str, from: &str, text: &str) -> Result<SendResult, SmsError>;

    /// Remaining credit
    async fn balance(&self) -> Result<f64, SmsError>;
}

/// Extract the names of `{variable}` placeholders in first-seen order,
/// without duplicates.
pub fn extract_placeholders(content: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    let mut rest = content;

    while let Some(start) = rest.find('{') {
        let after = &rest[start + 1..];
        let Some(end) = after.find('}') else {
            break;
        };
        let name = after[..end].trim();
        let valid = !name.is_empty()
            && !name.contains('{')
            && name.chars().all(|c| c.is_alphanumeric() || c == '_');
        if valid && !names.iter().any(|n| n == name) {
            names.push(name.to_string());
        }
        // resume right after the opening brace when the body was not a name
        rest = if valid { &after[end + 1..] } else { after };
    }

    names
}

/// Substitute `{variable}` placeholders. Unknown placeholders are left as is.
pub fn render(content: &str, vars: &HashMap<String, String>) -> String {
    let mut output = content.to_string();
    for name in extract_placeholders(content) {
        if let Some(value) = vars.get(&name) {
            output = output.replace(&format!("{{{}}}", name), value);
        }
    }
    output
}

#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    to: &'a str,
    from: &'a str,
    text: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendResponse {
    status: String,
    message_id: Option<String>,
    #[serde(default)]
    cost: f64,
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CreditResponse {
    credit: f64,
}

/// REST client for the SMS web service
#[derive(Clone)]
pub struct HttpSmsGateway {
    base_url: String,
    api_key: String,
    http_client: Client,
}

impl HttpSmsGateway {
    pub fn new(base_url: &str, api_key: &str, http_client: Client) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            http_client,
        }
    }
}

#[async_trait]
impl SmsGateway for HttpSmsGateway {
    async fn send(&self, to: &str, from: &str, text: &str) -> Result<SendResult, SmsError> {
        if to.trim().is_empty() {
            return Err(SmsError::InvalidRecipient(to.to_string()));
        }

        let url = format!("{}/send", self.base_url);
        debug!("Sending SMS to {}", to);

        let response = self
            .http_client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .json(&SendRequest { to, from, text })
            .send()
            .await?;

        let status = response.status();
        if status.is_server_error() || status == reqwest::StatusCode::UNAUTHORIZED {
            let error_text = response.text().await?;
            return Err(SmsError::ApiError(format!("{}: {}", status, error_text)));
        }

        if !status.is_success() {
            // the vendor rejected this message (bad number, no credit, ...)
            let error_text = response.text().await.unwrap_or_default();
            warn!("SMS to {} rejected: {}", to, error_text);
            return Ok(SendResult::failed(error_text));
        }

        let body: SendResponse = response.json().await?;
        if body.status != "ok" {
            return Ok(SendResult::failed(
                body.message.unwrap_or_else(|| body.status.clone()),
            ));
        }

        Ok(SendResult {
            success: true,
            message_id: body.message_id,
            cost: body.cost,
            error: None,
        })
    }

    async fn balance(&self) -> Result<f64, SmsError> {
        let url = format!("{}/credit", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        if !response.status().is_success() {
            let error_text = response.text().await?;
            return Err(SmsError::ApiError(error_text));
        }

        let body: CreditResponse = response.json().await?;
        Ok(body.credit)
    }
}
