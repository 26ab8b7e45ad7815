//! Bearer credentials for the Google REST APIs
//!
//! This crate provides the credential side of the autoshop client:
//! token sources that can hand out and refresh an OAuth2 access token,
//! and [`AuthorizedClient`], which attaches the token to requests and
//! performs exactly one silent refresh-and-retry when a request is
//! rejected with `401 Unauthorized`.

mod fetch;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use log::{debug, info, warn};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;

pub use fetch::AuthorizedClient;

/// Default OAuth2 token endpoint
pub const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// Scope for reading and writing spreadsheets
pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";

/// Scope for files created by this application
pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Tokens are treated as expired this many seconds before their real expiry.
const EXPIRY_LEEWAY_SECS: i64 = 30;

/// Error type
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("JWT error: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("Re-authentication required: {0}")]
    ReauthenticationRequired(String),
}

/// An access token together with its expiry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub token: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    /// Create a token that expires `expires_in` seconds from now
    pub fn new(token: impl Into<String>, expires_in: Option<i64>) -> Self {
        Self {
            token: token.into(),
            expires_at: expires_in.map(|secs| Utc::now() + Duration::seconds(secs)),
        }
    }

    /// Whether the token is expired or about to expire
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => Utc::now() + Duration::seconds(EXPIRY_LEEWAY_SECS) >= expires_at,
            None => false,
        }
    }
}

/// A source of bearer tokens.
///
/// `access_token` may return a cached token; `refresh` must always obtain a
/// new one (or fail with [`AuthError::ReauthenticationRequired`] when that
/// is impossible).
#[async_trait]
pub trait TokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, AuthError>;

    async fn refresh(&self) -> Result<String, AuthError>;
}

/// A fixed token, typically obtained by an interactive sign-in elsewhere.
///
/// It cannot be refreshed; a rejected token means the user has to sign in again.
pub struct StaticToken {
    token: RwLock<String>,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: RwLock::new(token.into()),
        }
    }

    /// Replace the token after the user signed in again
    pub async fn set(&self, token: impl Into<String>) {
        *self.token.write().await = token.into();
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, AuthError> {
        Ok(self.token.read().await.clone())
    }

    async fn refresh(&self) -> Result<String, AuthError> {
        Err(AuthError::ReauthenticationRequired(
            "static token cannot be refreshed".to_string(),
        ))
    }
}

/// Token endpoint response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
    #[allow(dead_code)]
    token_type: Option<String>,
}

/// Token endpoint error body
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    error_description: Option<String>,
}

async fn exchange(
    http_client: &Client,
    token_url: &str,
    form: &[(&str, &str)],
) -> Result<AccessToken, AuthError> {
    let response = http_client.post(token_url).form(form).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(match serde_json::from_str::<TokenErrorResponse>(&error_text) {
            // invalid_grant: the refresh token or assertion was revoked or expired
            Ok(body) if body.error == "invalid_grant" => AuthError::ReauthenticationRequired(
                body.error_description.unwrap_or(body.error),
            ),
            Ok(body) => AuthError::ApiError(format!(
                "{} ({}): {}",
                body.error,
                status,
                body.error_description.unwrap_or_default()
            )),
            Err(_) => AuthError::ApiError(format!("{}: {}", status, error_text)),
        });
    }

    let body: TokenResponse = response.json().await?;
    Ok(AccessToken::new(body.access_token, body.expires_in))
}

/// OAuth2 refresh-token grant (an installed or web application that the
/// shop owner authorized once).
pub struct RefreshTokenSource {
    token_url: String,
    client_id: String,
    client_secret: String,
    refresh_token: String,
    http_client: Client,
    current: Arc<RwLock<Option<AccessToken>>>,
}

impl RefreshTokenSource {
    pub fn new(
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
        http_client: Client,
    ) -> Self {
        Self {
            token_url: GOOGLE_TOKEN_URL.to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            refresh_token: refresh_token.to_string(),
            http_client,
            current: Arc::new(RwLock::new(None)),
        }
    }

    /// Use a different token endpoint
    pub fn with_token_url(mut self, token_url: &str) -> Self {
        self.token_url = token_url.to_string();
        self
    }

    /// Seed the cache with a token obtained earlier
    pub async fn set_access_token(&self, token: AccessToken) {
        *self.current.write().await = Some(token);
    }
}

#[async_trait]
impl TokenSource for RefreshTokenSource {
    async fn access_token(&self) -> Result<String, AuthError> {
        if let Some(token) = self.current.read().await.as_ref() {
            if !token.is_expired() {
                return Ok(token.token.clone());
            }
        }
        self.refresh().await
    }

    async fn refresh(&self) -> Result<String, AuthError> {
        debug!("Refreshing access token via refresh_token grant");
        let token = exchange(
            &self.http_client,
            &self.token_url,
            &[
                ("grant_type", "refresh_token"),
                ("client_id", &self.client_id),
                ("client_secret", &self.client_secret),
                ("refresh_token", &self.refresh_token),
            ],
        )
        .await?;

        let value = token.token.clone();
        *self.current.write().await = Some(token);
        info!("Access token refreshed");
        Ok(value)
    }
}

/// The fields of a service account key file that matter here
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    #[serde(default)]
    pub token_uri: Option<String>,
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: String,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

/// Service account credentials (JWT bearer grant)
pub struct ServiceAccountSource {
    client_email: String,
    encoding_key: EncodingKey,
    token_url: String,
    scopes: Vec<String>,
    http_client: Client,
    current: Arc<RwLock<Option<AccessToken>>>,
}

impl ServiceAccountSource {
    /// Build from a parsed key
    pub fn new(key: ServiceAccountKey, scopes: &[&str], http_client: Client) -> Result<Self, AuthError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        Ok(Self {
            client_email: key.client_email,
            encoding_key,
            token_url: key.token_uri.unwrap_or_else(|| GOOGLE_TOKEN_URL.to_string()),
            scopes: scopes.iter().map(|s| s.to_string()).collect(),
            http_client,
            current: Arc::new(RwLock::new(None)),
        })
    }

    /// Build from the JSON key file downloaded from the cloud console
    pub fn from_json(key_json: &str, scopes: &[&str], http_client: Client) -> Result<Self, AuthError> {
        let key: ServiceAccountKey = serde_json::from_str(key_json)
            .map_err(|e| AuthError::InvalidCredentials(format!("service account key: {}", e)))?;
        Self::new(key, scopes, http_client)
    }

    /// Use a different token endpoint
    pub fn with_token_url(mut self, token_url: &str) -> Self {
        self.token_url = token_url.to_string();
        self
    }

    fn assertion(&self) -> Result<String, AuthError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &self.client_email,
            scope: self.scopes.join(" "),
            aud: &self.token_url,
            iat: now,
            exp: now + 3600,
        };
        Ok(jsonwebtoken::encode(
            &Header::new(Algorithm::RS256),
            &claims,
            &self.encoding_key,
        )?)
    }
}

#[async_trait]
impl TokenSource for ServiceAccountSource {
    async fn access_token(&self) -> Result<String, AuthError> {
        if let Some(token) = self.current.read().await.as_ref() {
            if !token.is_expired() {
                return Ok(token.token.clone());
            }
        }
        self.refresh().await
    }

    async fn refresh(&self) -> Result<String, AuthError> {
        debug!("Requesting access token for {}", self.client_email);
        let assertion = self.assertion()?;
        let token = exchange(
            &self.http_client,
            &self.token_url,
            &[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", &assertion),
            ],
        )
        .await
        .map_err(|e| {
            warn!("Service account token exchange failed: {}", e);
            e
        })?;

        let value = token.token.clone();
        *self.current.write().await = Some(token);
        Ok(value)
    }
}
