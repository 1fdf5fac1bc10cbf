//! Attachment storage that keeps videos on YouTube.
//!
//! [`YouTubeStorage`] implements [`Storage`] by uploading every file as a video to the
//! authenticated account's channel. YouTube cannot hand the uploaded bytes back, so each upload
//! is also written to an "original" storage under the same id, and reads are served from there.
//!
//! ```rust,no_run
//! use attachment_sdk::{FileSystemStorage, Metadata, Storage};
//! use std::sync::Arc;
//! use youtube_storage::{Config, YouTubeStorage};
//!
//! # async fn example() -> eyre::Result<()> {
//! let original = Arc::new(FileSystemStorage::new("/var/lib/videos").await?);
//! let config = Config::builder()
//!     .original_storage(original)
//!     .credentials_from_env()
//!     .build()?;
//! let storage = YouTubeStorage::new(config)?;
//!
//! let mut file = tokio::fs::File::open("talk.mp4").await?;
//! let mut metadata = Metadata::new();
//! metadata.insert("filename".into(), "talk.mp4".into());
//! let uploaded = storage
//!     .upload(&mut file, "talk.mp4", &metadata, &Default::default())
//!     .await?;
//! println!("https://youtu.be/{}", uploaded.id);
//! # Ok(())
//! # }
//! ```

use crate::channel::ChannelResolver;
use crate::youtube_api::{Video, VideoApi, YouTubeClient};
use async_trait::async_trait;
use attachment_sdk::{Metadata, Reader, Storage, StorageResult, UploadSource, UrlOptions};
use bytes::Bytes;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tracing::instrument;

mod channel;
pub mod config;
pub mod error;
pub mod oauth;
mod playlist;
pub mod upload;
pub mod youtube_api;

pub use config::{ClientOptions, Config, ConfigBuilder, RequestOptions};
pub use error::{Error, Result};
pub use upload::{RESERVED_METADATA_KEY, UploadedVideo};
pub use youtube_api::{Privacy, Snippet, VideoRecord};

/// Which kind of link [`YouTubeStorage::url`] produces.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum UrlType {
    /// `https://youtube.com/watch?v=<id>`
    #[default]
    Watch,
    /// `https://youtube.com/embed/<id>`
    Embed,
    /// `https://youtu.be/<id>`
    Short,
    /// The URL the original storage gives out for the same id.
    Original,
}

impl From<&str> for UrlType {
    /// Unrecognized names fall back to [`UrlType::Watch`].
    fn from(name: &str) -> Self {
        match name {
            "embed" => UrlType::Embed,
            "short" => UrlType::Short,
            "original" => UrlType::Original,
            _ => UrlType::Watch,
        }
    }
}

/// Storage backend that uploads files to YouTube and mirrors them to an original storage.
pub struct YouTubeStorage {
    config: Config,
    api: Arc<dyn VideoApi>,
    channels: ChannelResolver,
}

impl fmt::Debug for YouTubeStorage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("YouTubeStorage")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl YouTubeStorage {
    /// Creates a storage that talks to YouTube over HTTP.
    pub fn new(config: Config) -> Result<Self> {
        let client = YouTubeClient::new(
            config.credentials(),
            &config.client_options,
            config.request_options.clone(),
        )
        .map_err(|e| Error::Configuration(format!("{e:#}")))?;
        Ok(Self::with_api(config, Arc::new(client)))
    }

    /// Creates a storage on top of any [`VideoApi`].
    pub fn with_api(config: Config, api: Arc<dyn VideoApi>) -> Self {
        let channels = ChannelResolver::new(api.clone(), config.channel_id.clone());
        Self {
            config,
            api,
            channels,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn api(&self) -> &Arc<dyn VideoApi> {
        &self.api
    }

    pub fn original_storage(&self) -> &Arc<dyn Storage> {
        &self.config.original_storage
    }

    /// The channel videos are uploaded to. Looked up on first use unless configured.
    pub async fn channel_id(&self) -> Result<&str> {
        self.channels.channel_id().await
    }

    /// The playlist YouTube adds every upload of the channel to.
    pub async fn uploads_playlist_id(&self) -> Result<&str> {
        self.channels.uploads_playlist_id().await
    }

    #[instrument(skip(self))]
    pub async fn exists(&self, id: &str) -> Result<bool> {
        let response = self.api.list_videos("id", id).await?;
        Ok(response.page_info.total_results == 1)
    }

    /// Deletes the video from YouTube and then from the original storage.
    ///
    /// Ids YouTube does not know are ignored, and the original storage is left alone for them.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> Result<()> {
        if !self.exists(id).await? {
            tracing::debug!("video does not exist, nothing to delete");
            return Ok(());
        }

        self.api.delete_video(id).await?;
        self.config.original_storage.delete(id).await?;
        Ok(())
    }

    /// Applies the reserved `"youtube"` entry of `metadata` to the video's snippet.
    ///
    /// Returns `None` without contacting YouTube when the entry is absent. Keys in the entry
    /// replace the existing ones, every other snippet field is kept.
    #[instrument(skip(self, metadata))]
    pub async fn update(&self, id: &str, metadata: &Metadata) -> Result<Option<VideoRecord>> {
        let mut metadata = metadata.clone();
        let Some(changes) = upload::take_reserved(&mut metadata)? else {
            return Ok(None);
        };

        let response = self.api.list_videos("snippet", id).await?;
        if response.page_info.total_results != 1 {
            return Err(Error::VideoNotFound(id.to_string()));
        }
        let Some(existing) = response.items.into_iter().next() else {
            return Err(Error::VideoNotFound(id.to_string()));
        };

        let mut snippet = existing.snippet.unwrap_or_default();
        snippet.extend(changes);

        let video = Video {
            id: Some(id.to_string()),
            snippet: Some(snippet),
            ..Default::default()
        };
        let updated = self.api.update_video(&video).await?;
        tracing::debug!("updated video snippet");
        Ok(Some(updated.into_record()))
    }

    /// A link to the video. `options` only matter for [`UrlType::Original`], where they are
    /// passed on to the original storage.
    pub fn url(&self, id: &str, url_type: UrlType, options: &UrlOptions) -> Result<String> {
        Ok(match url_type {
            UrlType::Original => self.config.original_storage.url(id, options)?,
            UrlType::Embed => format!("https://youtube.com/embed/{id}"),
            UrlType::Short => format!("https://youtu.be/{id}"),
            UrlType::Watch => format!("https://youtube.com/watch?v={id}"),
        })
    }
}

#[async_trait]
impl Storage for YouTubeStorage {
    /// Returns the id YouTube assigned, not `id`.
    async fn upload(
        &self,
        io: &mut dyn UploadSource,
        id: &str,
        metadata: &Metadata,
    ) -> StorageResult<String> {
        let uploaded = YouTubeStorage::upload(self, io, id, metadata, &Snippet::new()).await?;
        Ok(uploaded.id)
    }

    async fn download(&self, id: &str) -> StorageResult<NamedTempFile> {
        self.config.original_storage.download(id).await
    }

    async fn open(&self, id: &str) -> StorageResult<Reader> {
        self.config.original_storage.open(id).await
    }

    async fn read(&self, id: &str) -> StorageResult<Bytes> {
        self.config.original_storage.read(id).await
    }

    async fn stream(
        &self,
        id: &str,
        consumer: &mut (dyn FnMut(Bytes) + Send),
    ) -> StorageResult<()> {
        self.config.original_storage.stream(id, consumer).await
    }

    async fn exists(&self, id: &str) -> StorageResult<bool> {
        Ok(YouTubeStorage::exists(self, id).await?)
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        Ok(YouTubeStorage::delete(self, id).await?)
    }

    /// The link kind is taken from a `"type"` option (`embed`, `short`, `original`, anything
    /// else meaning watch). The remaining options go to the original storage.
    fn url(&self, id: &str, options: &UrlOptions) -> StorageResult<String> {
        let mut options = options.clone();
        let url_type = options
            .remove("type")
            .as_ref()
            .and_then(Value::as_str)
            .map(UrlType::from)
            .unwrap_or_default();
        Ok(YouTubeStorage::url(self, id, url_type, &options)?)
    }

    async fn clear(&self) -> StorageResult<()> {
        Ok(YouTubeStorage::clear(self).await?)
    }
}
