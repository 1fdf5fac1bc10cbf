//! OAuth 2.0 token refresh for YouTube API authentication.
//!
//! The storage never runs an interactive authorization flow. It is configured with a refresh
//! token obtained out of band and trades it for short-lived access tokens as needed.

use eyre::Context;
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{ClientId, ClientSecret, RefreshToken, TokenUrl, reqwest};
use std::fmt;

/// Google OAuth2 token endpoint URL used for token refresh.
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// The OAuth client credentials and the refresh token granted to it.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .finish()
    }
}

/// Manages OAuth 2.0 token refresh for YouTube API access.
///
/// Holds the client configuration and the HTTP client used to talk to the token endpoint, so
/// that every refresh goes through the same setup.
#[derive(Debug, Clone)]
pub(crate) struct OAuthManager {
    client_id: ClientId,
    client_secret: ClientSecret,
    token_url: TokenUrl,
    http_client: reqwest::Client,
}

impl OAuthManager {
    /// Creates a new OAuth manager for the given client that refreshes tokens at `token_url`.
    pub(crate) fn new(client_id: &str, client_secret: &str, token_url: &str) -> eyre::Result<Self> {
        let token_url = TokenUrl::new(token_url.to_string()).context("parse OAuth token URL")?;
        let http_client = reqwest::ClientBuilder::new()
            // SSRF no thank you.
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("build OAuth HTTP client")?;
        Ok(Self {
            client_id: ClientId::new(client_id.to_string()),
            client_secret: ClientSecret::new(client_secret.to_string()),
            token_url,
            http_client,
        })
    }

    /// Exchanges a refresh token for a new access token.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(new_token))` - Refresh succeeded, new token is available
    /// * `Ok(None)` - The token endpoint rejected the refresh token as an invalid grant
    /// * `Err(_)` - Network or other error occurred during refresh attempt
    pub(crate) async fn refresh_token(
        &self,
        refresh_token: &RefreshToken,
    ) -> eyre::Result<Option<BasicTokenResponse>> {
        tracing::debug!("attempting to refresh OAuth token");

        let client = BasicClient::new(self.client_id.clone())
            .set_client_secret(self.client_secret.clone())
            .set_token_uri(self.token_url.clone());

        match client
            .exchange_refresh_token(refresh_token)
            .request_async(&self.http_client)
            .await
        {
            Ok(new_token) => {
                tracing::debug!("successfully refreshed OAuth token");
                Ok(Some(new_token))
            }
            Err(ref e @ oauth2::RequestTokenError::ServerResponse(ref sr))
                if matches!(
                    sr.error(),
                    oauth2::basic::BasicErrorResponseType::InvalidGrant
                ) =>
            {
                tracing::warn!("OAuth refresh token considered invalid grant: {}", e);
                Ok(None)
            }
            Err(e) => Err(e).context("exchange refresh token"),
        }
    }
}
