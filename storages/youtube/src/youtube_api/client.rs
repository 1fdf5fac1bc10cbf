//! Core YouTube API client functionality and authentication management.

use crate::config::{ClientOptions, RequestOptions};
use crate::oauth::{Credentials, OAuthManager};
use crate::youtube_api::{
    ChannelStream, VideoApi,
    channels::ChannelListResponse,
    playlist_items::PlaylistItemListResponse,
    types::{ApiError, PagedStream},
    videos::{Video, VideoListResponse},
};
use async_trait::async_trait;
use bytes::Bytes;
use eyre::Context;
use http::header::{CONTENT_RANGE, CONTENT_TYPE, LOCATION, RANGE};
use http::{Method, StatusCode};
use oauth2::basic::BasicTokenResponse;
use oauth2::{AccessToken, RefreshToken, TokenResponse};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::Mutex;
use tracing::instrument;

/// Upper bound YouTube accepts for `maxResults`.
const MAX_RESULTS: &str = "50";

/// Bytes sent per request of a resumable upload. YouTube wants a multiple of 256 KiB for every
/// chunk except the last.
pub const UPLOAD_CHUNK_SIZE: usize = 32 * 256 * 1024;

/// An access token together with the refresh token it was obtained with and when it stops
/// being usable.
#[derive(Debug, Clone)]
pub struct TimeBoundAccessToken {
    access_token: Option<AccessToken>,
    refresh_token: RefreshToken,
    /// When the current access token expires (with safety buffer)
    expires_at: SystemTime,
}

impl TimeBoundAccessToken {
    /// Creates a token that has no access token yet, forcing a refresh before first use.
    pub fn expired(refresh_token: RefreshToken) -> Self {
        Self {
            access_token: None,
            refresh_token,
            expires_at: SystemTime::UNIX_EPOCH,
        }
    }

    pub fn is_expired(&self) -> bool {
        self.access_token.is_none() || SystemTime::now() >= self.expires_at
    }

    /// Refreshes this token using the provided OAuth manager, preserving the refresh token.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Token was successfully refreshed
    /// * `Ok(false)` - The refresh token was rejected
    /// * `Err(_)` - Network or other error occurred
    pub(crate) async fn refresh(&mut self, oauth_manager: &OAuthManager) -> eyre::Result<bool> {
        tracing::trace!("refreshing token");
        match oauth_manager
            .refresh_token(&self.refresh_token)
            .await
            .context("refresh OAuth token")?
        {
            Some(new_token) => {
                // Google usually omits the refresh token on refresh; keep ours in that case
                if let Some(refresh_token) = new_token.refresh_token() {
                    tracing::debug!("new token includes refresh token");
                    self.refresh_token = refresh_token.clone();
                }
                self.expires_at = Self::calculate_token_expiry(&new_token);
                self.access_token = Some(new_token.access_token().clone());
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Calculates when a token should be considered expired based on its expires_in field.
    ///
    /// Uses the current time + expires_in duration - 5 minute safety buffer.
    /// If no expires_in is provided, assumes a conservative 55-minute lifetime.
    fn calculate_token_expiry(token: &BasicTokenResponse) -> SystemTime {
        let now = SystemTime::now();
        if let Some(expires_in) = token.expires_in() {
            now + expires_in.saturating_sub(Duration::from_secs(300)) // 5 minute buffer
        } else {
            now + Duration::from_secs(3300) // 55 minutes
        }
    }
}

/// Client for the YouTube Data API v3.
///
/// Every request carries a bearer access token. The token is obtained from the configured
/// refresh token on first use and refreshed again shortly before it expires.
#[derive(Debug, Clone)]
pub struct YouTubeClient {
    token: Arc<Mutex<TimeBoundAccessToken>>,
    /// OAuth manager for refreshing tokens (shared across clients)
    oauth_manager: Arc<OAuthManager>,
    client: reqwest::Client,
    /// API root without a trailing slash, e.g. `https://www.googleapis.com`
    root_url: String,
    request_options: RequestOptions,
    upload_chunk_size: usize,
}

impl YouTubeClient {
    /// Creates a client that authenticates with `credentials`.
    ///
    /// No request is made until the first API call.
    pub fn new(
        credentials: Credentials,
        options: &ClientOptions,
        request_options: RequestOptions,
    ) -> eyre::Result<Self> {
        let oauth_manager = OAuthManager::new(
            &credentials.client_id,
            &credentials.client_secret,
            &options.token_url,
        )?;

        let mut builder = reqwest::Client::builder();
        if let Some(application_name) = &options.application_name {
            builder = builder.user_agent(application_name.clone());
        }
        if let Some(connect_timeout) = options.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }
        // a 308 from an upload session means "resume incomplete", not a redirect
        let client = builder
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .context("build YouTube API HTTP client")?;

        Ok(Self {
            token: Arc::new(Mutex::new(TimeBoundAccessToken::expired(RefreshToken::new(
                credentials.refresh_token,
            )))),
            oauth_manager: Arc::new(oauth_manager),
            client,
            root_url: options.root_url.trim_end_matches('/').to_string(),
            request_options,
            upload_chunk_size: UPLOAD_CHUNK_SIZE,
        })
    }

    /// Gets a guaranteed-fresh access token, refreshing if necessary.
    #[instrument(skip(self))]
    pub(crate) async fn fresh_access_token(&self) -> eyre::Result<String> {
        let mut token = self.token.lock().await;

        if token.is_expired() {
            tracing::debug!("access token expired, attempting refresh");

            if token.refresh(&self.oauth_manager).await? {
                tracing::debug!("access token successfully refreshed");
            } else {
                tracing::error!("access token refresh failed, client is unusable");
                return Err(eyre::eyre!("Unable to refresh expired access token"));
            }
        }

        token
            .access_token
            .as_ref()
            .map(|token| token.secret().to_string())
            .ok_or_else(|| eyre::eyre!("no access token after refresh"))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.root_url, path)
    }

    /// Sends an authenticated request, retrying transient failures.
    ///
    /// `decorate` adds everything beyond the method, URL and credentials, and is invoked again
    /// for every attempt. Connection failures, timeouts and 5xx responses are retried up to
    /// [`RequestOptions::retries`] times. A non-success response that is not retried becomes an
    /// [`ApiError`].
    async fn execute<F>(&self, method: Method, url: &str, decorate: F) -> eyre::Result<reqwest::Response>
    where
        F: Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder + Send + Sync,
    {
        self.execute_accepting(method, url, |status| status.is_success(), decorate)
            .await
    }

    /// Like [`Self::execute`], but any status for which `accept` holds counts as success.
    #[instrument(skip(self, accept, decorate), level = tracing::Level::TRACE)]
    async fn execute_accepting<A, F>(
        &self,
        method: Method,
        url: &str,
        accept: A,
        decorate: F,
    ) -> eyre::Result<reqwest::Response>
    where
        A: Fn(StatusCode) -> bool + Send + Sync,
        F: Fn(reqwest::RequestBuilder) -> reqwest::RequestBuilder + Send + Sync,
    {
        let mut attempt = 0;
        loop {
            let access_token = self.fresh_access_token().await?;

            let mut request = self
                .client
                .request(method.clone(), url)
                .bearer_auth(access_token);
            if let Some(timeout) = self.request_options.timeout {
                request = request.timeout(timeout);
            }

            let retries_left = attempt < self.request_options.retries;
            let reason = match decorate(request).send().await {
                Ok(response) if accept(response.status()) => return Ok(response),
                Ok(response) if response.status().is_server_error() && retries_left => {
                    format!("status {}", response.status())
                }
                Ok(response) => {
                    let status = response.status();
                    let message = response
                        .text()
                        .await
                        .unwrap_or_else(|_| "unknown error".to_string());
                    return Err(ApiError::new(method, status, message).into());
                }
                Err(e) if (e.is_connect() || e.is_timeout()) && retries_left => e.to_string(),
                Err(e) => {
                    return Err(e)
                        .with_context(|| format!("send {} request to YouTube API: {}", method, url));
                }
            };

            attempt += 1;
            tracing::warn!(%method, url, attempt, %reason, "retrying YouTube API request");
        }
    }

    /// Makes an authenticated HTTP request to the YouTube API with common error handling.
    ///
    /// # Arguments
    ///
    /// * `method` - The HTTP method to use (GET, POST, etc.)
    /// * `url` - The API endpoint URL
    /// * `query_params` - Optional query parameters
    /// * `json_body` - Optional JSON body
    ///
    /// # Returns
    ///
    /// The raw [`reqwest::Response`] for method-specific JSON parsing.
    pub(crate) async fn make_authenticated_request(
        &self,
        method: Method,
        url: &str,
        query_params: Option<&[(&str, &str)]>,
        json_body: Option<&(impl Serialize + Sync)>,
    ) -> eyre::Result<reqwest::Response> {
        self.execute(method, url, |mut request| {
            if let Some(params) = query_params {
                request = request.query(params);
            }
            if let Some(body) = json_body {
                request = request.json(body);
            }
            request
        })
        .await
    }

    /// Fetches one page of the channels owned by the authenticated user.
    ///
    /// <https://developers.google.com/youtube/v3/docs/channels/list>
    async fn list_my_channels_page(
        &self,
        page_token: Option<String>,
    ) -> eyre::Result<ChannelListResponse> {
        let url = self.endpoint("/youtube/v3/channels");
        let mut query_params = vec![("part", "id"), ("mine", "true"), ("maxResults", MAX_RESULTS)];
        if let Some(ref token) = page_token {
            query_params.push(("pageToken", token.as_str()));
        }

        let response = self
            .make_authenticated_request(Method::GET, &url, Some(&query_params), None::<&()>)
            .await?;

        let channels: ChannelListResponse = response
            .json()
            .await
            .context("parse YouTube channels API response as JSON")?;

        tracing::debug!(
            total_results = channels.page_info.total_results,
            returned_items = channels.items.len(),
            "fetched channels"
        );

        Ok(channels)
    }
}

#[async_trait]
impl VideoApi for YouTubeClient {
    #[instrument(skip(self))]
    fn list_my_channels(&self) -> ChannelStream<'_> {
        Box::pin(PagedStream::new(move |page_token| async move {
            let response = self.list_my_channels_page(page_token).await?;
            Ok((response.items, response.next_page_token))
        }))
    }

    #[instrument(skip(self))]
    async fn list_channels_by_id(
        &self,
        part: &str,
        channel_id: &str,
    ) -> eyre::Result<ChannelListResponse> {
        let url = self.endpoint("/youtube/v3/channels");
        let query_params = [("part", part), ("id", channel_id)];

        let response = self
            .make_authenticated_request(Method::GET, &url, Some(&query_params), None::<&()>)
            .await?;

        let channels: ChannelListResponse = response
            .json()
            .await
            .context("parse YouTube channels API response as JSON")?;

        tracing::debug!(
            channel_id,
            returned_items = channels.items.len(),
            "fetched channel by ID"
        );

        Ok(channels)
    }

    /// <https://developers.google.com/youtube/v3/docs/videos/list>
    #[instrument(skip(self))]
    async fn list_videos(&self, part: &str, video_id: &str) -> eyre::Result<VideoListResponse> {
        let url = self.endpoint("/youtube/v3/videos");
        let query_params = [("part", part), ("id", video_id)];

        let response = self
            .make_authenticated_request(Method::GET, &url, Some(&query_params), None::<&()>)
            .await?;

        let videos: VideoListResponse = response
            .json()
            .await
            .context("parse YouTube videos API response as JSON")?;

        tracing::debug!(
            video_id,
            total_results = videos.page_info.total_results,
            "fetched videos"
        );

        Ok(videos)
    }

    /// Uploads through a resumable upload session.
    ///
    /// The media is sent in chunks of at most `upload_chunk_size` bytes, so memory use does not
    /// grow with the size of the video. A chunk only counts as sent once the session reports its
    /// bytes as received. The part it did not take is sent again.
    ///
    /// <https://developers.google.com/youtube/v3/guides/using_resumable_upload_protocol>
    #[instrument(skip(self, video, media))]
    async fn insert_video(
        &self,
        video: &Video,
        media: &mut (dyn AsyncRead + Send + Unpin),
    ) -> eyre::Result<Video> {
        let url = self.endpoint("/upload/youtube/v3/videos");
        let parts = video.parts();
        let query_params = [("uploadType", "resumable"), ("part", parts.as_str())];

        let response = self
            .execute(Method::POST, &url, |request| {
                request
                    .query(&query_params)
                    .header("X-Upload-Content-Type", "video/*")
                    .json(video)
            })
            .await?;

        let session_url = response
            .headers()
            .get(LOCATION)
            .ok_or_else(|| eyre::eyre!("resumable upload session has no Location header"))?
            .to_str()
            .context("parse resumable upload session URL")?
            .to_string();
        tracing::debug!("opened resumable upload session");

        let chunk_size = self.upload_chunk_size;
        // bytes the session has not confirmed yet, starting at `offset`
        let mut pending = Vec::with_capacity(chunk_size + 1);
        let mut offset = 0u64;
        let mut exhausted = false;
        let response = loop {
            if !exhausted {
                // one byte past a full chunk tells whether more follows
                let wanted = (chunk_size + 1).saturating_sub(pending.len());
                let read = (&mut *media)
                    .take(wanted as u64)
                    .read_to_end(&mut pending)
                    .await
                    .context("read video media")?;
                exhausted = read < wanted;
            }

            let len = pending.len().min(chunk_size);
            let last = exhausted && pending.len() <= chunk_size;
            let chunk = Bytes::copy_from_slice(&pending[..len]);
            let content_range = content_range(offset, len as u64, last);

            let response = self
                .execute_accepting(
                    Method::PUT,
                    &session_url,
                    |status| status.is_success() || status == StatusCode::PERMANENT_REDIRECT,
                    |request| {
                        request
                            .header(CONTENT_TYPE, "video/*")
                            .header(CONTENT_RANGE, content_range.as_str())
                            .body(chunk.clone())
                    },
                )
                .await?;
            if response.status().is_success() {
                break response;
            }

            let received = received_bytes(&response);
            let advanced = received.saturating_sub(offset).min(len as u64);
            if advanced == 0 {
                return Err(eyre::eyre!(
                    "resumable upload session did not accept bytes from offset {offset}"
                ));
            }
            pending.drain(..advanced as usize);
            offset += advanced;
            tracing::trace!(offset, "upload session confirmed bytes");
        };

        let video: Video = response
            .json()
            .await
            .context("parse YouTube videos.insert response as JSON")?;

        tracing::debug!(video_id = ?video.id, "uploaded video");

        Ok(video)
    }

    /// <https://developers.google.com/youtube/v3/docs/videos/update>
    #[instrument(skip(self, video), fields(video_id = ?video.id))]
    async fn update_video(&self, video: &Video) -> eyre::Result<Video> {
        let url = self.endpoint("/youtube/v3/videos");
        let parts = video.parts();
        let query_params = [("part", parts.as_str())];

        let response = self
            .make_authenticated_request(Method::PUT, &url, Some(&query_params), Some(video))
            .await?;

        response
            .json()
            .await
            .context("parse YouTube videos.update response as JSON")
    }

    /// <https://developers.google.com/youtube/v3/docs/videos/delete>
    #[instrument(skip(self))]
    async fn delete_video(&self, video_id: &str) -> eyre::Result<()> {
        let url = self.endpoint("/youtube/v3/videos");
        let query_params = [("id", video_id)];

        self.make_authenticated_request(Method::DELETE, &url, Some(&query_params), None::<&()>)
            .await?;

        tracing::debug!(video_id, "deleted video");
        Ok(())
    }

    /// <https://developers.google.com/youtube/v3/docs/playlistItems/list>
    #[instrument(skip(self))]
    async fn list_playlist_items(
        &self,
        playlist_id: &str,
    ) -> eyre::Result<PlaylistItemListResponse> {
        let url = self.endpoint("/youtube/v3/playlistItems");
        let query_params = [
            ("part", "snippet"),
            ("playlistId", playlist_id),
            ("maxResults", MAX_RESULTS),
        ];

        let response = self
            .make_authenticated_request(Method::GET, &url, Some(&query_params), None::<&()>)
            .await?;

        let items: PlaylistItemListResponse = response
            .json()
            .await
            .context("parse YouTube playlistItems API response as JSON")?;

        tracing::debug!(
            playlist_id,
            total_results = items.page_info.total_results,
            returned_items = items.items.len(),
            "fetched playlist items"
        );

        Ok(items)
    }
}

/// `Content-Range` of a chunk. The total is only known once the last chunk is in hand.
fn content_range(offset: u64, len: u64, last: bool) -> String {
    let total = if last {
        (offset + len).to_string()
    } else {
        "*".to_string()
    };
    if len == 0 {
        format!("bytes */{total}")
    } else {
        format!("bytes {}-{}/{}", offset, offset + len - 1, total)
    }
}

/// How many bytes an incomplete upload session holds, per its `Range: bytes=0-<last>` header.
fn received_bytes(response: &reqwest::Response) -> u64 {
    response
        .headers()
        .get(RANGE)
        .and_then(|range| range.to_str().ok())
        .and_then(|range| range.strip_prefix("bytes=0-"))
        .and_then(|last| last.parse::<u64>().ok())
        .map_or(0, |last| last + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::youtube_api::videos::{Privacy, VideoStatus};
    use http::StatusCode;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tokio_stream::StreamExt;
    use wiremock::matchers::{body_bytes, header, method, path, query_param, query_param_is_missing};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer, retries: u32) -> YouTubeClient {
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "fresh-token",
                "token_type": "bearer",
                "expires_in": 3600
            })))
            .expect(1)
            .mount(server)
            .await;

        let credentials = Credentials {
            client_id: "client".to_string(),
            client_secret: "secret".to_string(),
            refresh_token: "refresh".to_string(),
        };
        let options = ClientOptions {
            root_url: format!("{}/", server.uri()),
            token_url: format!("{}/token", server.uri()),
            ..Default::default()
        };
        let request_options = RequestOptions {
            retries,
            ..Default::default()
        };
        YouTubeClient::new(credentials, &options, request_options).unwrap()
    }

    #[tokio::test]
    async fn refreshes_token_once_and_lists_videos() {
        let server = MockServer::start().await;
        let client = client_for(&server, 0).await;

        Mock::given(method("GET"))
            .and(path("/youtube/v3/videos"))
            .and(header("authorization", "Bearer fresh-token"))
            .and(query_param("part", "id"))
            .and(query_param("id", "abc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "kind": "youtube#videoListResponse",
                "pageInfo": {"totalResults": 1, "resultsPerPage": 1},
                "items": [{"kind": "youtube#video", "id": "abc"}]
            })))
            .expect(2)
            .mount(&server)
            .await;

        for _ in 0..2 {
            let videos = client.list_videos("id", "abc").await.unwrap();
            assert_eq!(videos.page_info.total_results, 1);
            assert_eq!(videos.items[0].id.as_deref(), Some("abc"));
        }
    }

    #[tokio::test]
    async fn channel_stream_follows_pages() {
        let server = MockServer::start().await;
        let client = client_for(&server, 0).await;

        Mock::given(method("GET"))
            .and(path("/youtube/v3/channels"))
            .and(query_param("mine", "true"))
            .and(query_param_is_missing("pageToken"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pageInfo": {"totalResults": 2, "resultsPerPage": 1},
                "items": [{"id": "UC1"}],
                "nextPageToken": "page-2"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/youtube/v3/channels"))
            .and(query_param("pageToken", "page-2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "pageInfo": {"totalResults": 2, "resultsPerPage": 1},
                "items": [{"id": "UC2"}]
            })))
            .mount(&server)
            .await;

        let ids: Vec<String> = client
            .list_my_channels()
            .map(|channel| channel.unwrap().id)
            .collect()
            .await;
        assert_eq!(ids, ["UC1", "UC2"]);
    }

    #[tokio::test]
    async fn rejections_carry_typed_api_error() {
        let server = MockServer::start().await;
        let client = client_for(&server, 3).await;

        Mock::given(method("POST"))
            .and(path("/upload/youtube/v3/videos"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {
                    "code": 400,
                    "errors": [{"reason": "mediaBodyRequired", "domain": "youtube.video"}]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let video = Video {
            snippet: Some(Default::default()),
            ..Default::default()
        };
        let err = client
            .insert_video(&video, &mut &b""[..])
            .await
            .unwrap_err();
        let api_error = err.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api_error.method, Method::POST);
        assert_eq!(api_error.status, StatusCode::BAD_REQUEST);
        assert!(api_error.is_invalid_upload_source());
    }

    fn upload_session(server: &MockServer) -> Mock {
        Mock::given(method("POST"))
            .and(path("/upload/youtube/v3/videos"))
            .and(query_param("uploadType", "resumable"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Location", format!("{}/upload/session/1", server.uri())),
            )
            .expect(1)
    }

    fn chunk(content_range: &str, body: &[u8]) -> wiremock::MockBuilder {
        Mock::given(method("PUT"))
            .and(path("/upload/session/1"))
            .and(header("content-range", content_range))
            .and(body_bytes(body.to_vec()))
    }

    fn incomplete(received_up_to: u64) -> ResponseTemplate {
        ResponseTemplate::new(308).insert_header("Range", format!("bytes=0-{received_up_to}"))
    }

    #[tokio::test]
    async fn resumable_upload_sends_metadata_then_media_in_chunks() {
        let server = MockServer::start().await;
        let mut client = client_for(&server, 0).await;
        client.upload_chunk_size = 6;

        Mock::given(method("POST"))
            .and(path("/upload/youtube/v3/videos"))
            .and(query_param("uploadType", "resumable"))
            .and(query_param("part", "snippet,status"))
            .and(header("x-upload-content-type", "video/*"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("Location", format!("{}/upload/session/1", server.uri())),
            )
            .expect(1)
            .mount(&server)
            .await;
        chunk("bytes 0-5/*", b"video ")
            .respond_with(incomplete(5))
            .expect(1)
            .mount(&server)
            .await;
        chunk("bytes 6-10/11", b"bytes")
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "new-id",
                "snippet": {"title": "clip.mp4"},
                "status": {"privacyStatus": "unlisted", "uploadStatus": "uploaded"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut snippet = serde_json::Map::new();
        snippet.insert("title".to_string(), json!("clip.mp4"));
        let video = Video {
            snippet: Some(snippet),
            status: Some(VideoStatus {
                privacy_status: Some(Privacy::Unlisted),
                ..Default::default()
            }),
            ..Default::default()
        };

        let uploaded = client
            .insert_video(&video, &mut &b"video bytes"[..])
            .await
            .unwrap();
        assert_eq!(uploaded.id.as_deref(), Some("new-id"));
        assert_eq!(
            uploaded.status.unwrap().other.get("uploadStatus"),
            Some(&json!("uploaded"))
        );
    }

    #[tokio::test]
    async fn unconfirmed_part_of_a_chunk_is_sent_again() {
        let server = MockServer::start().await;
        let mut client = client_for(&server, 0).await;
        client.upload_chunk_size = 6;

        upload_session(&server).mount(&server).await;
        chunk("bytes 0-5/*", b"video ")
            .respond_with(incomplete(2))
            .expect(1)
            .mount(&server)
            .await;
        chunk("bytes 3-8/*", b"eo byt")
            .respond_with(incomplete(8))
            .expect(1)
            .mount(&server)
            .await;
        chunk("bytes 9-10/11", b"es")
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "new-id"})))
            .expect(1)
            .mount(&server)
            .await;

        let uploaded = client
            .insert_video(&Video::default(), &mut &b"video bytes"[..])
            .await
            .unwrap();
        assert_eq!(uploaded.id.as_deref(), Some("new-id"));
    }

    #[tokio::test]
    async fn media_of_exactly_one_chunk_is_sent_whole() {
        let server = MockServer::start().await;
        let mut client = client_for(&server, 0).await;
        client.upload_chunk_size = 5;

        upload_session(&server).mount(&server).await;
        chunk("bytes 0-4/5", b"video")
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "new-id"})))
            .expect(1)
            .mount(&server)
            .await;

        let uploaded = client
            .insert_video(&Video::default(), &mut &b"video"[..])
            .await
            .unwrap();
        assert_eq!(uploaded.id.as_deref(), Some("new-id"));
    }

    #[tokio::test]
    async fn stalled_upload_session_is_an_error() {
        let server = MockServer::start().await;
        let mut client = client_for(&server, 0).await;
        client.upload_chunk_size = 6;

        upload_session(&server).mount(&server).await;
        Mock::given(method("PUT"))
            .and(path("/upload/session/1"))
            .respond_with(ResponseTemplate::new(308))
            .expect(1)
            .mount(&server)
            .await;

        let err = client
            .insert_video(&Video::default(), &mut &b"video bytes"[..])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("did not accept bytes from offset 0"));
    }

    #[test]
    fn content_ranges() {
        assert_eq!(content_range(0, 6, false), "bytes 0-5/*");
        assert_eq!(content_range(6, 5, true), "bytes 6-10/11");
        assert_eq!(content_range(0, 0, true), "bytes */0");
    }

    #[tokio::test]
    async fn server_errors_are_retried() {
        let server = MockServer::start().await;
        let client = client_for(&server, 1).await;

        Mock::given(method("DELETE"))
            .and(path("/youtube/v3/videos"))
            .and(query_param("id", "abc"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/youtube/v3/videos"))
            .and(query_param("id", "abc"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        client.delete_video("abc").await.unwrap();
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        let client = client_for(&server, 2).await;

        Mock::given(method("DELETE"))
            .and(path("/youtube/v3/videos"))
            .respond_with(ResponseTemplate::new(404).set_body_string("videoNotFound"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client.delete_video("missing").await.unwrap_err();
        let api_error = err.downcast_ref::<ApiError>().unwrap();
        assert_eq!(api_error.status, StatusCode::NOT_FOUND);
        assert!(!api_error.is_invalid_upload_source());
    }
}
