//! Finds the channel videos are uploaded to, and that channel's uploads playlist.

use crate::error::{Error, Result};
use crate::youtube_api::{Channel, VideoApi};
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio_stream::StreamExt;
use tracing::instrument;

/// Resolves each id at most once per adapter and remembers it.
pub(crate) struct ChannelResolver {
    api: Arc<dyn VideoApi>,
    channel_id: OnceCell<String>,
    uploads_playlist_id: OnceCell<String>,
}

impl ChannelResolver {
    /// A configured channel id is used as is and never looked up.
    pub(crate) fn new(api: Arc<dyn VideoApi>, channel_id: Option<String>) -> Self {
        Self {
            api,
            channel_id: OnceCell::new_with(channel_id),
            uploads_playlist_id: OnceCell::new(),
        }
    }

    pub(crate) async fn channel_id(&self) -> Result<&str> {
        self.channel_id
            .get_or_try_init(|| self.find_user_channel())
            .await
            .map(String::as_str)
    }

    pub(crate) async fn uploads_playlist_id(&self) -> Result<&str> {
        self.uploads_playlist_id
            .get_or_try_init(|| self.find_uploads_playlist())
            .await
            .map(String::as_str)
    }

    #[instrument(skip(self))]
    async fn find_user_channel(&self) -> Result<String> {
        let channels: Vec<Channel> = self
            .api
            .list_my_channels()
            .collect::<eyre::Result<_>>()
            .await?;

        match <[Channel; 1]>::try_from(channels) {
            Ok([channel]) => {
                tracing::debug!(channel_id = channel.id, "resolved user channel");
                Ok(channel.id)
            }
            Err(channels) => Err(Error::UserChannelNotFound {
                found: channels.len(),
            }),
        }
    }

    #[instrument(skip(self))]
    async fn find_uploads_playlist(&self) -> Result<String> {
        let channel_id = self.channel_id().await?;
        let response = self
            .api
            .list_channels_by_id("contentDetails", channel_id)
            .await?;

        let playlist_id = response
            .items
            .iter()
            .find_map(Channel::uploads_playlist_id)
            .ok_or_else(|| Error::UploadsPlaylistNotFound(channel_id.to_string()))?;

        tracing::debug!(channel_id, playlist_id, "resolved uploads playlist");
        Ok(playlist_id.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::youtube_api::MockYouTube;
    use crate::youtube_api::mock::{MOCK_CHANNEL_ID, MOCK_UPLOADS_PLAYLIST_ID};

    fn resolver(api: &Arc<MockYouTube>, channel_id: Option<&str>) -> ChannelResolver {
        ChannelResolver::new(api.clone(), channel_id.map(str::to_string))
    }

    #[tokio::test]
    async fn configured_channel_is_not_looked_up() {
        let api = Arc::new(MockYouTube::new());
        let resolver = resolver(&api, Some("UC-configured"));
        assert_eq!(resolver.channel_id().await.unwrap(), "UC-configured");
        assert_eq!(api.channel_lookups(), 0);
    }

    #[tokio::test]
    async fn single_channel_is_looked_up_once() {
        let api = Arc::new(MockYouTube::new());
        let resolver = resolver(&api, None);

        let (first, second) = tokio::join!(resolver.channel_id(), resolver.channel_id());
        assert_eq!(first.unwrap(), MOCK_CHANNEL_ID);
        assert_eq!(second.unwrap(), MOCK_CHANNEL_ID);
        assert_eq!(resolver.channel_id().await.unwrap(), MOCK_CHANNEL_ID);
        assert_eq!(api.channel_lookups(), 1);

        assert_eq!(
            resolver.uploads_playlist_id().await.unwrap(),
            MOCK_UPLOADS_PLAYLIST_ID
        );
    }

    #[tokio::test]
    async fn uploads_playlist_is_looked_up_once() {
        let api = Arc::new(MockYouTube::new());
        let resolver = resolver(&api, None);

        for _ in 0..2 {
            assert_eq!(
                resolver.uploads_playlist_id().await.unwrap(),
                MOCK_UPLOADS_PLAYLIST_ID
            );
        }
        assert_eq!(api.channel_detail_lookups(), 1);
        assert_eq!(api.channel_lookups(), 1);
    }

    #[tokio::test]
    async fn channel_count_other_than_one_is_an_error() {
        let api = Arc::new(MockYouTube::new().with_channels(vec![]));
        let err = resolver(&api, None).channel_id().await.unwrap_err();
        assert!(matches!(err, Error::UserChannelNotFound { found: 0 }));
        assert!(err.is_configuration());

        let api = Arc::new(MockYouTube::new().with_channels(vec![
            MockYouTube::channel("UC-1", Some("UU-1")),
            MockYouTube::channel("UC-2", Some("UU-2")),
        ]));
        let err = resolver(&api, None).channel_id().await.unwrap_err();
        assert!(matches!(err, Error::UserChannelNotFound { found: 2 }));
        assert!(err.to_string().contains("found 2 channels"));
    }

    #[tokio::test]
    async fn channel_without_uploads_playlist() {
        let api = Arc::new(
            MockYouTube::new().with_channels(vec![MockYouTube::channel("UC-bare", None)]),
        );
        let err = resolver(&api, None).uploads_playlist_id().await.unwrap_err();
        assert!(matches!(err, Error::UploadsPlaylistNotFound(channel) if channel == "UC-bare"));
    }
}
