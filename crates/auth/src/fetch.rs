//! Authorized request execution

use log::warn;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use std::sync::Arc;

use crate::{AuthError, TokenSource};

/// HTTP client that attaches a bearer token to every request.
///
/// A `401` response triggers exactly one `refresh` of the token source and
/// one retry of the request. A second `401` surfaces as
/// [`AuthError::ReauthenticationRequired`].
#[derive(Clone)]
pub struct AuthorizedClient {
    http_client: Client,
    tokens: Arc<dyn TokenSource>,
}

impl AuthorizedClient {
    pub fn new(http_client: Client, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            http_client,
            tokens,
        }
    }

    /// The underlying HTTP client
    pub fn http_client(&self) -> &Client {
        &self.http_client
    }

    /// The token source requests are signed with
    pub fn tokens(&self) -> Arc<dyn TokenSource> {
        self.tokens.clone()
    }

    /// Build and send a request.
    ///
    /// `build` is called once per attempt, so request bodies that cannot be
    /// cloned (multipart forms) must be created inside it.
    pub async fn send<F>(&self, build: F) -> Result<Response, AuthError>
    where
        F: Fn(&Client) -> RequestBuilder,
    {
        let token = self.tokens.access_token().await?;
        let response = build(&self.http_client).bearer_auth(&token).send().await?;

        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!(
            "Request to {} was rejected with 401, refreshing token and retrying once",
            response.url()
        );
        let token = self.tokens.refresh().await?;
        let response = build(&self.http_client).bearer_auth(&token).send().await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            let error_text = response.text().await.unwrap_or_default();
            return Err(AuthError::ReauthenticationRequired(error_text));
        }

        Ok(response)
    }
}
