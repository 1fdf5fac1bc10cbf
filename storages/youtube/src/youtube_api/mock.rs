//! An in-memory [`VideoApi`] for tests.
//!
//! Behaves like a tiny YouTube account: one channel whose uploads playlist lists every video
//! inserted so far. Rejections mirror the status codes and error reasons the real API uses.

use crate::youtube_api::{
    ChannelStream, VideoApi,
    channels::{Channel, ChannelContentDetails, ChannelListResponse, RelatedPlaylists},
    playlist_items::{PlaylistItem, PlaylistItemListResponse, PlaylistItemSnippet, ResourceId},
    types::{ApiError, PageInfo},
    videos::{Video, VideoListResponse},
};
use async_trait::async_trait;
use http::{Method, StatusCode};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::io::{AsyncRead, AsyncReadExt};

pub const MOCK_CHANNEL_ID: &str = "UC-mock";
pub const MOCK_UPLOADS_PLAYLIST_ID: &str = "UU-mock";

const MEDIA_BODY_REQUIRED: &str =
    r#"{"error":{"code":400,"errors":[{"reason":"mediaBodyRequired","domain":"youtube.video"}]}}"#;

#[derive(Debug)]
struct State {
    channels: Vec<Channel>,
    /// In upload order.
    videos: Vec<Video>,
    media: Vec<(String, Vec<u8>)>,
    next_id: u64,
    channel_lookups: usize,
    channel_detail_lookups: usize,
    insert_attempts: usize,
    rejected_inserts: VecDeque<ApiError>,
    fail_deletes: bool,
}

#[derive(Debug)]
pub struct MockYouTube {
    state: Mutex<State>,
    page_size: usize,
}

impl Default for MockYouTube {
    fn default() -> Self {
        Self::new()
    }
}

impl MockYouTube {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                channels: vec![Self::channel(MOCK_CHANNEL_ID, Some(MOCK_UPLOADS_PLAYLIST_ID))],
                videos: Vec::new(),
                media: Vec::new(),
                next_id: 1,
                channel_lookups: 0,
                channel_detail_lookups: 0,
                insert_attempts: 0,
                rejected_inserts: VecDeque::new(),
                fail_deletes: false,
            }),
            page_size: 50,
        }
    }

    /// Builds a channel resource, optionally with an uploads playlist.
    pub fn channel(id: &str, uploads: Option<&str>) -> Channel {
        Channel {
            id: id.to_string(),
            content_details: Some(ChannelContentDetails {
                related_playlists: RelatedPlaylists {
                    uploads: uploads.map(str::to_string),
                },
            }),
        }
    }

    /// Replaces the channels owned by the account.
    pub fn with_channels(self, channels: Vec<Channel>) -> Self {
        self.lock().channels = channels;
        self
    }

    /// Caps how many playlist items a single page returns.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Makes the next insert fail with `error` regardless of its media.
    pub fn reject_next_insert(&self, error: ApiError) {
        self.lock().rejected_inserts.push_back(error);
    }

    /// Makes every later delete fail with 403.
    pub fn fail_deletes(&self) {
        self.lock().fail_deletes = true;
    }

    /// Number of times the account's channels were listed.
    pub fn channel_lookups(&self) -> usize {
        self.lock().channel_lookups
    }

    /// Number of times channels were fetched by id.
    pub fn channel_detail_lookups(&self) -> usize {
        self.lock().channel_detail_lookups
    }

    /// Number of inserts attempted, rejected ones included.
    pub fn insert_attempts(&self) -> usize {
        self.lock().insert_attempts
    }

    pub fn video_count(&self) -> usize {
        self.lock().videos.len()
    }

    pub fn video(&self, id: &str) -> Option<Video> {
        self.lock()
            .videos
            .iter()
            .find(|video| video.id.as_deref() == Some(id))
            .cloned()
    }

    /// The media bytes YouTube received for a video.
    pub fn media(&self, id: &str) -> Option<Vec<u8>> {
        self.lock()
            .media
            .iter()
            .find(|(video_id, _)| video_id == id)
            .map(|(_, media)| media.clone())
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn not_found(method: Method, reason: &str) -> eyre::Report {
        ApiError::new(
            method,
            StatusCode::NOT_FOUND,
            format!(r#"{{"error":{{"code":404,"errors":[{{"reason":"{reason}"}}]}}}}"#),
        )
        .into()
    }
}

fn project(video: &Video, part: &str) -> Video {
    let parts: Vec<&str> = part.split(',').map(str::trim).collect();
    Video {
        id: video.id.clone(),
        snippet: video.snippet.clone().filter(|_| parts.contains(&"snippet")),
        status: video.status.clone().filter(|_| parts.contains(&"status")),
        other: Default::default(),
    }
}

fn page_info(total_results: usize, results_per_page: usize) -> PageInfo {
    PageInfo {
        total_results: total_results as u32,
        results_per_page: results_per_page as u32,
    }
}

#[async_trait]
impl VideoApi for MockYouTube {
    fn list_my_channels(&self) -> ChannelStream<'_> {
        let channels = {
            let mut state = self.lock();
            state.channel_lookups += 1;
            state.channels.clone()
        };
        Box::pin(tokio_stream::iter(channels.into_iter().map(Ok)))
    }

    async fn list_channels_by_id(
        &self,
        part: &str,
        channel_id: &str,
    ) -> eyre::Result<ChannelListResponse> {
        let with_details = part.split(',').any(|part| part.trim() == "contentDetails");
        let mut state = self.lock();
        state.channel_detail_lookups += 1;
        let items: VecDeque<Channel> = state
            .channels
            .iter()
            .filter(|channel| channel.id == channel_id)
            .map(|channel| Channel {
                id: channel.id.clone(),
                content_details: channel.content_details.clone().filter(|_| with_details),
            })
            .collect();
        Ok(ChannelListResponse {
            kind: "youtube#channelListResponse".to_string(),
            page_info: page_info(items.len(), items.len()),
            items,
            next_page_token: None,
        })
    }

    async fn list_videos(&self, part: &str, video_id: &str) -> eyre::Result<VideoListResponse> {
        let items: VecDeque<Video> = self
            .lock()
            .videos
            .iter()
            .filter(|video| video.id.as_deref() == Some(video_id))
            .map(|video| project(video, part))
            .collect();
        Ok(VideoListResponse {
            kind: "youtube#videoListResponse".to_string(),
            page_info: page_info(items.len(), items.len()),
            items,
            next_page_token: None,
        })
    }

    async fn insert_video(
        &self,
        video: &Video,
        media: &mut (dyn AsyncRead + Send + Unpin),
    ) -> eyre::Result<Video> {
        let mut body = Vec::new();
        media.read_to_end(&mut body).await?;

        let mut state = self.lock();
        state.insert_attempts += 1;
        if let Some(error) = state.rejected_inserts.pop_front() {
            return Err(error.into());
        }
        if body.is_empty() {
            return Err(
                ApiError::new(Method::POST, StatusCode::BAD_REQUEST, MEDIA_BODY_REQUIRED).into(),
            );
        }

        let id = format!("video-{}", state.next_id);
        state.next_id += 1;

        let mut status = video.status.clone().unwrap_or_default();
        status
            .other
            .insert("uploadStatus".to_string(), Value::from("uploaded"));
        let mut other = video.other.clone();
        other.insert("kind".to_string(), Value::from("youtube#video"));
        let stored = Video {
            id: Some(id.clone()),
            snippet: Some(video.snippet.clone().unwrap_or_default()),
            status: Some(status),
            other,
        };

        state.media.push((id, body));
        state.videos.push(stored.clone());
        Ok(stored)
    }

    async fn update_video(&self, video: &Video) -> eyre::Result<Video> {
        let mut state = self.lock();
        let Some(stored) = state
            .videos
            .iter_mut()
            .find(|stored| stored.id.is_some() && stored.id == video.id)
        else {
            return Err(Self::not_found(Method::PUT, "videoNotFound"));
        };

        // updates replace each part they name wholesale
        if let Some(snippet) = &video.snippet {
            stored.snippet = Some(snippet.clone());
        }
        if let Some(status) = &video.status {
            stored.status = Some(status.clone());
        }
        Ok(stored.clone())
    }

    async fn delete_video(&self, video_id: &str) -> eyre::Result<()> {
        let mut state = self.lock();
        if state.fail_deletes {
            return Err(ApiError::new(Method::DELETE, StatusCode::FORBIDDEN, "forbidden").into());
        }
        let before = state.videos.len();
        state
            .videos
            .retain(|video| video.id.as_deref() != Some(video_id));
        if state.videos.len() == before {
            return Err(Self::not_found(Method::DELETE, "videoNotFound"));
        }
        state.media.retain(|(id, _)| id != video_id);
        Ok(())
    }

    async fn list_playlist_items(
        &self,
        playlist_id: &str,
    ) -> eyre::Result<PlaylistItemListResponse> {
        let state = self.lock();
        let is_uploads = state.channels.iter().any(|channel| {
            channel.uploads_playlist_id() == Some(playlist_id)
        });
        if !is_uploads {
            return Err(Self::not_found(Method::GET, "playlistNotFound"));
        }

        let items: VecDeque<PlaylistItem> = state
            .videos
            .iter()
            .take(self.page_size)
            .map(|video| PlaylistItem {
                id: video.id.as_ref().map(|id| format!("item-{id}")),
                snippet: PlaylistItemSnippet {
                    playlist_id: Some(playlist_id.to_string()),
                    title: video
                        .snippet
                        .as_ref()
                        .and_then(|snippet| snippet.get("title"))
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    resource_id: ResourceId {
                        kind: "youtube#video".to_string(),
                        video_id: video.id.clone(),
                    },
                },
            })
            .collect();
        Ok(PlaylistItemListResponse {
            kind: "youtube#playlistItemListResponse".to_string(),
            page_info: page_info(state.videos.len(), self.page_size),
            next_page_token: (state.videos.len() > items.len()).then(|| "next".to_string()),
            items,
        })
    }
}
