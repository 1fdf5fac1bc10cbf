//! Configuration of a [`YouTubeStorage`](crate::YouTubeStorage).

use crate::oauth::{Credentials, TOKEN_URL};
use crate::youtube_api::{Privacy, Snippet};
use attachment_sdk::Storage;
use derive_builder::Builder;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Default root of the Google APIs.
pub const ROOT_URL: &str = "https://www.googleapis.com";

/// Everything a [`YouTubeStorage`](crate::YouTubeStorage) is built from.
///
/// The original storage and the three OAuth values are required. Build one with
/// [`Config::builder`]:
///
/// ```rust,no_run
/// use attachment_sdk::MemoryStorage;
/// use std::sync::Arc;
/// use youtube_storage::{Config, Privacy};
///
/// let config = Config::builder()
///     .original_storage(Arc::new(MemoryStorage::new()))
///     .client_id("client-id")
///     .client_secret("client-secret")
///     .refresh_token("refresh-token")
///     .default_privacy(Privacy::Unlisted)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone, Builder)]
#[builder(pattern = "owned", build_fn(validate = "Self::validate"))]
pub struct Config {
    /// Backend that keeps a copy of every uploaded video and serves its bytes.
    pub original_storage: Arc<dyn Storage>,

    #[builder(setter(into))]
    pub client_id: String,

    #[builder(setter(into))]
    pub client_secret: String,

    #[builder(setter(into))]
    pub refresh_token: String,

    /// Channel to upload to. Looked up from the authenticated account when not set.
    #[builder(setter(into, strip_option), default)]
    pub channel_id: Option<String>,

    /// Privacy status given to every uploaded video.
    #[builder(default)]
    pub default_privacy: Privacy,

    /// Snippet fields merged into every upload, e.g. `description` or `categoryId`.
    #[builder(default)]
    pub upload_options: Snippet,

    #[builder(default)]
    pub client_options: ClientOptions,

    #[builder(default)]
    pub request_options: RequestOptions,
}

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn credentials(&self) -> Credentials {
        Credentials {
            client_id: self.client_id.clone(),
            client_secret: self.client_secret.clone(),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("client_id", &self.client_id)
            .field("channel_id", &self.channel_id)
            .field("default_privacy", &self.default_privacy)
            .field("upload_options", &self.upload_options)
            .field("client_options", &self.client_options)
            .field("request_options", &self.request_options)
            .finish_non_exhaustive()
    }
}

impl ConfigBuilder {
    fn validate(&self) -> Result<(), String> {
        let required = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("refresh_token", &self.refresh_token),
        ];
        for (name, value) in required {
            // unset values are reported by the builder itself
            if value.as_ref().is_some_and(|v| v.trim().is_empty()) {
                return Err(format!("{name} cannot be empty"));
            }
        }

        if matches!(&self.channel_id, Some(Some(channel_id)) if channel_id.trim().is_empty()) {
            return Err("channel_id cannot be empty when set".to_string());
        }

        Ok(())
    }

    /// Takes the OAuth credentials and channel from the environment.
    ///
    /// Reads `GOOGLE_OAUTH_CLIENT_ID`, `GOOGLE_OAUTH_CLIENT_SECRET`,
    /// `GOOGLE_OAUTH_REFRESH_TOKEN` and `YOUTUBE_CHANNEL_ID`. Variables that are not set leave
    /// the corresponding option untouched.
    pub fn credentials_from_env(mut self) -> Self {
        if let Ok(client_id) = std::env::var("GOOGLE_OAUTH_CLIENT_ID") {
            self = self.client_id(client_id);
        }
        if let Ok(client_secret) = std::env::var("GOOGLE_OAUTH_CLIENT_SECRET") {
            self = self.client_secret(client_secret);
        }
        if let Ok(refresh_token) = std::env::var("GOOGLE_OAUTH_REFRESH_TOKEN") {
            self = self.refresh_token(refresh_token);
        }
        if let Ok(channel_id) = std::env::var("YOUTUBE_CHANNEL_ID") {
            self = self.channel_id(channel_id);
        }
        self
    }
}

/// How the HTTP client talks to Google.
#[derive(Debug, Clone)]
pub struct ClientOptions {
    /// Root of the YouTube Data API, without a trailing `/youtube/v3`.
    pub root_url: String,
    /// OAuth endpoint used to refresh access tokens.
    pub token_url: String,
    /// Sent as the `User-Agent` of every request.
    pub application_name: Option<String>,
    pub connect_timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            root_url: ROOT_URL.to_string(),
            token_url: TOKEN_URL.to_string(),
            application_name: None,
            connect_timeout: None,
        }
    }
}

/// Per-request transport behavior.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Upper bound on a single request, including reading the response.
    pub timeout: Option<Duration>,
    /// How many times a request is repeated after a connection failure, a timeout or a 5xx
    /// response. Requests YouTube rejected (4xx) are never repeated.
    pub retries: u32,
}
