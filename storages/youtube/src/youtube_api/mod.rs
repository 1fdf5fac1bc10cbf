//! YouTube Data API v3 client library.
//!
//! The storage only needs a narrow slice of the API: finding the authenticated channel and its
//! uploads playlist, inserting, listing, updating and deleting videos, and listing playlist
//! items. That slice is the [`VideoApi`] trait. [`YouTubeClient`] implements it over HTTP, and
//! with the `mock` feature [`MockYouTube`] implements it in memory.
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use youtube_storage::oauth::Credentials;
//! use youtube_storage::youtube_api::{VideoApi, YouTubeClient};
//! use youtube_storage::{ClientOptions, RequestOptions};
//!
//! # async fn example() -> eyre::Result<()> {
//! let credentials = Credentials {
//!     client_id: "...".into(),
//!     client_secret: "...".into(),
//!     refresh_token: "...".into(),
//! };
//! let client = YouTubeClient::new(
//!     credentials,
//!     &ClientOptions::default(),
//!     RequestOptions::default(),
//! )?;
//!
//! let videos = client.list_videos("snippet", "dQw4w9WgXcQ").await?;
//! println!("found {} videos", videos.page_info.total_results);
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use std::pin::Pin;
use tokio::io::AsyncRead;
use tokio_stream::Stream;

pub mod channels;
pub mod client;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod playlist_items;
pub mod types;
pub mod videos;

pub use channels::{Channel, ChannelListResponse};
pub use client::{TimeBoundAccessToken, YouTubeClient};
#[cfg(any(test, feature = "mock"))]
pub use mock::MockYouTube;
pub use playlist_items::{PlaylistItem, PlaylistItemListResponse};
pub use types::{ApiError, PageInfo, PagedStream};
pub use videos::{Privacy, Snippet, Video, VideoListResponse, VideoRecord, VideoStatus};

/// Channels owned by the authenticated account, fetched page by page.
pub type ChannelStream<'a> = Pin<Box<dyn Stream<Item = eyre::Result<Channel>> + Send + 'a>>;

/// The YouTube operations the storage is built on.
///
/// Failures are reported as [`eyre::Report`]s. When YouTube answered with a non-success status
/// the report wraps an [`ApiError`], which callers can recover with `downcast_ref`.
#[async_trait]
pub trait VideoApi: Send + Sync {
    /// All channels of the authenticated account (`channels.list` with `mine=true`).
    fn list_my_channels(&self) -> ChannelStream<'_>;

    /// `channels.list` for a single channel id.
    async fn list_channels_by_id(
        &self,
        part: &str,
        channel_id: &str,
    ) -> eyre::Result<ChannelListResponse>;

    /// `videos.list` for a single video id.
    async fn list_videos(&self, part: &str, video_id: &str) -> eyre::Result<VideoListResponse>;

    /// Uploads `media` as a new video described by `video`.
    ///
    /// The parts sent are the ones present on `video`.
    async fn insert_video(
        &self,
        video: &Video,
        media: &mut (dyn AsyncRead + Send + Unpin),
    ) -> eyre::Result<Video>;

    /// `videos.update`, writing the parts present on `video`.
    async fn update_video(&self, video: &Video) -> eyre::Result<Video>;

    async fn delete_video(&self, video_id: &str) -> eyre::Result<()>;

    /// The first page of `playlistItems.list` with `part=snippet`.
    async fn list_playlist_items(&self, playlist_id: &str)
    -> eyre::Result<PlaylistItemListResponse>;
}
