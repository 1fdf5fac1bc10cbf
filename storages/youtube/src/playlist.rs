//! Bulk removal of everything in the channel's uploads playlist.

use crate::YouTubeStorage;
use crate::error::Result;
use tracing::instrument;

impl YouTubeStorage {
    /// Deletes every video in the uploads playlist, then clears the original storage.
    ///
    /// Only the first page of the playlist is ever requested. Each round deletes the videos on
    /// that page and asks again until the playlist reports no items, which relies on deleted
    /// videos dropping out of the listing, and is fragile if YouTube is slow to drop them. A page
    /// that reports items but names no video stops the loop with a warning, so leftovers YouTube
    /// cannot list are not waited for. The first failed deletion stops the whole operation and
    /// leaves the original storage untouched.
    #[instrument(skip(self))]
    pub async fn clear(&self) -> Result<()> {
        let playlist_id = self.uploads_playlist_id().await?;

        let mut deleted = 0;
        loop {
            let page = self.api().list_playlist_items(playlist_id).await?;
            if page.page_info.total_results == 0 {
                break;
            }

            let video_ids: Vec<&str> = page.items.iter().filter_map(|item| item.video_id()).collect();
            if video_ids.is_empty() {
                // nothing on this page can shrink the playlist
                tracing::warn!(
                    playlist_id,
                    total_results = page.page_info.total_results,
                    "uploads playlist lists no deletable videos"
                );
                break;
            }

            for video_id in video_ids {
                self.api().delete_video(video_id).await?;
                deleted += 1;
            }
        }

        tracing::debug!(deleted, "cleared uploads playlist");
        self.config().original_storage.clear().await?;
        Ok(())
    }
}
