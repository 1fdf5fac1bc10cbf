//! Uploading a source to YouTube and mirroring it to the original storage.

use crate::YouTubeStorage;
use crate::error::{Error, Result};
use crate::youtube_api::{ApiError, Snippet, Video, VideoRecord, VideoStatus};
use attachment_sdk::{Metadata, UploadSource};
use serde_json::Value;
use tracing::instrument;

/// Metadata entry holding snippet fields for YouTube. It is never passed on to the original
/// storage.
pub const RESERVED_METADATA_KEY: &str = "youtube";

/// A video YouTube accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedVideo {
    /// The id YouTube assigned. The video is stored under this id from now on.
    pub id: String,
    /// The full video resource as returned by YouTube.
    pub record: VideoRecord,
}

/// Removes the reserved entry from `metadata` and returns it.
///
/// A `null` entry counts as absent.
pub(crate) fn take_reserved(metadata: &mut Metadata) -> Result<Option<Snippet>> {
    match metadata.remove(RESERVED_METADATA_KEY) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(snippet)) => Ok(Some(snippet)),
        Some(other) => Err(Error::InvalidMetadata(format!(
            "\"{RESERVED_METADATA_KEY}\" must be an object, got {other}"
        ))),
    }
}

impl YouTubeStorage {
    /// Uploads `io` as a new video and copies it to the original storage.
    ///
    /// The snippet starts out with the `filename` from `metadata` as title and the resolved
    /// channel, then takes the configured upload options, then `options`, then the reserved
    /// `"youtube"` metadata entry. Later layers win.
    ///
    /// `id` is only a suggestion. The video is stored under the id YouTube assigns, which is
    /// returned in [`UploadedVideo::id`]. `io` is rewound before this returns, whatever the
    /// outcome.
    #[instrument(skip(self, io, metadata, options))]
    pub async fn upload(
        &self,
        io: &mut dyn UploadSource,
        id: &str,
        metadata: &Metadata,
        options: &Snippet,
    ) -> Result<UploadedVideo> {
        let mut metadata = metadata.clone();
        let overrides = take_reserved(&mut metadata)?;

        let mut snippet = Snippet::new();
        if let Some(Value::String(filename)) = metadata.get("filename") {
            snippet.insert("title".to_string(), Value::String(filename.clone()));
        }
        snippet.insert(
            "channelId".to_string(),
            Value::String(self.channel_id().await?.to_string()),
        );
        snippet.extend(self.config().upload_options.clone());
        snippet.extend(options.clone());
        snippet.extend(overrides.unwrap_or_default());

        let video = Video {
            snippet: Some(snippet),
            status: Some(VideoStatus {
                privacy_status: Some(self.config().default_privacy),
                ..Default::default()
            }),
            ..Default::default()
        };

        let inserted = self.insert_video(&video, io).await;
        let rewound = io.rewind().await;
        let inserted = inserted?;
        rewound?;

        let video_id = inserted
            .id
            .clone()
            .ok_or_else(|| eyre::eyre!("YouTube accepted the upload without assigning an id"))?;
        tracing::debug!(video_id, "video uploaded to YouTube");

        let stored = self
            .config()
            .original_storage
            .upload(io, &video_id, &metadata)
            .await;
        let rewound = io.rewind().await;
        let stored_as = stored?;
        rewound?;
        if stored_as != video_id {
            tracing::warn!(video_id, stored_as, "original storage kept the video under another id");
        }

        Ok(UploadedVideo {
            id: video_id,
            record: inserted.into_record(),
        })
    }

    /// Inserts the video, retrying once from a local copy when YouTube could not use the
    /// streamed body and the source can produce such a copy.
    async fn insert_video(&self, video: &Video, io: &mut dyn UploadSource) -> Result<Video> {
        let report = match self.api().insert_video(video, io.reader()).await {
            Ok(inserted) => return Ok(inserted),
            Err(report) => report,
        };

        let unusable_source = report
            .downcast_ref::<ApiError>()
            .is_some_and(ApiError::is_invalid_upload_source);
        let Some(materializer) = io.materializer().filter(|_| unusable_source) else {
            return Err(report.into());
        };

        tracing::warn!(error = %report, "YouTube rejected the upload source, retrying from a temporary file");
        let tempfile = materializer.materialize().await?;
        let mut file = tokio::fs::File::open(tempfile.path()).await?;
        let retried = self.api().insert_video(video, &mut file).await;

        // the temporary file is removed here, whether or not the retry worked
        drop(file);
        drop(tempfile);

        Ok(retried?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::storage_with;
    use crate::youtube_api::MockYouTube;
    use crate::youtube_api::mock::MOCK_CHANNEL_ID;
    use async_trait::async_trait;
    use attachment_sdk::mock::{Call, MockStorage};
    use attachment_sdk::{Materialize, Storage, StorageResult, StoredFile};
    use http::{Method, StatusCode};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::io::{Cursor, Write};
    use std::path::PathBuf;
    use std::sync::Arc;
    use tempfile::NamedTempFile;
    use tokio::io::{AsyncRead, AsyncReadExt};

    fn metadata(value: Value) -> Metadata {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    fn media_body_required() -> ApiError {
        ApiError::new(
            Method::POST,
            StatusCode::BAD_REQUEST,
            r#"{"error":{"code":400,"errors":[{"reason":"mediaBodyRequired"}]}}"#,
        )
    }

    /// An in-memory source that can materialize itself and remembers where it did.
    struct MaterializableSource {
        content: Cursor<Vec<u8>>,
        materialized_at: Option<PathBuf>,
    }

    #[async_trait]
    impl UploadSource for MaterializableSource {
        fn reader(&mut self) -> &mut (dyn AsyncRead + Send + Unpin) {
            &mut self.content
        }

        async fn rewind(&mut self) -> std::io::Result<()> {
            self.content.set_position(0);
            Ok(())
        }

        fn materializer(&mut self) -> Option<&mut dyn Materialize> {
            Some(self)
        }
    }

    #[async_trait]
    impl Materialize for MaterializableSource {
        async fn materialize(&mut self) -> StorageResult<NamedTempFile> {
            let mut tempfile = NamedTempFile::new()?;
            tempfile.write_all(self.content.get_ref())?;
            self.materialized_at = Some(tempfile.path().to_path_buf());
            Ok(tempfile)
        }
    }

    #[tokio::test]
    async fn upload_returns_youtube_id_and_full_record() {
        let (storage, api, original) = storage_with(MockYouTube::new(), |config| config);
        let mut source = Cursor::new(b"some video".to_vec());

        let uploaded = storage
            .upload(
                &mut source,
                "cache/abc.mp4",
                &metadata(json!({"filename": "abc.mp4", "mime_type": "video/mp4"})),
                &Snippet::new(),
            )
            .await
            .unwrap();

        assert_eq!(uploaded.id, "video-1");
        assert_eq!(uploaded.record["id"], json!("video-1"));
        assert_eq!(uploaded.record["kind"], json!("youtube#video"));
        assert_eq!(
            uploaded.record["snippet"],
            json!({"title": "abc.mp4", "channelId": MOCK_CHANNEL_ID})
        );
        assert_eq!(
            uploaded.record["status"],
            json!({"privacyStatus": "private", "uploadStatus": "uploaded"})
        );
        assert_eq!(api.media("video-1").unwrap(), b"some video");

        // the original storage holds the same bytes under the YouTube id
        assert_eq!(&original.read("video-1").await.unwrap()[..], b"some video");
        assert_eq!(
            original.calls()[0],
            Call::Upload {
                id: "video-1".to_string(),
                metadata: metadata(json!({"filename": "abc.mp4", "mime_type": "video/mp4"})),
            }
        );
    }

    #[tokio::test]
    async fn source_is_readable_after_upload() {
        let (storage, _api, _original) = storage_with(MockYouTube::new(), |config| config);
        let mut source = Cursor::new(b"replay me".to_vec());

        storage
            .upload(&mut source, "id", &Metadata::new(), &Snippet::new())
            .await
            .unwrap();

        let mut content = Vec::new();
        source.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"replay me");
    }

    #[tokio::test]
    async fn source_is_rewound_when_original_storage_fails() {
        let (storage, api, original) = storage_with(MockYouTube::new(), |config| config);
        original.fail_uploads();
        let mut source = Cursor::new(b"payload".to_vec());

        let err = storage
            .upload(&mut source, "id", &Metadata::new(), &Snippet::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Storage(_)));
        assert_eq!(api.video_count(), 1);
        assert_eq!(source.position(), 0);
        let mut content = Vec::new();
        source.read_to_end(&mut content).await.unwrap();
        assert_eq!(content, b"payload");
    }

    #[tokio::test]
    async fn snippet_layers_override_in_order() {
        let (storage, api, original) = storage_with(MockYouTube::new(), |config| {
            config.upload_options(metadata(json!({"title": "A", "x": 1})))
        });
        let mut source = Cursor::new(b"layers".to_vec());

        let uploaded = storage
            .upload(
                &mut source,
                "id",
                &metadata(json!({"filename": "f.mp4", "youtube": {"x": 2, "y": 3}})),
                &metadata(json!({"title": "B"})),
            )
            .await
            .unwrap();

        assert_eq!(
            Value::Object(api.video(&uploaded.id).unwrap().snippet.unwrap()),
            json!({"title": "B", "x": 2, "y": 3, "channelId": MOCK_CHANNEL_ID})
        );
        // the reserved entry stays with YouTube
        assert_eq!(
            original.calls()[0],
            Call::Upload {
                id: uploaded.id,
                metadata: metadata(json!({"filename": "f.mp4"})),
            }
        );
    }

    #[tokio::test]
    async fn non_object_reserved_entry_is_rejected() {
        let (storage, api, original) = storage_with(MockYouTube::new(), |config| config);
        let mut source = Cursor::new(b"x".to_vec());

        let err = storage
            .upload(
                &mut source,
                "id",
                &metadata(json!({"youtube": "not a snippet"})),
                &Snippet::new(),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidMetadata(_)));
        assert_eq!(api.insert_attempts(), 0);
        assert!(original.calls().is_empty());
    }

    #[tokio::test]
    async fn empty_source_surfaces_youtube_error() {
        let (storage, api, original) = storage_with(MockYouTube::new(), |config| config);
        let mut source = Cursor::new(Vec::new());

        let err = storage
            .upload(&mut source, "id", &Metadata::new(), &Snippet::new())
            .await
            .unwrap_err();

        assert!(err.api_error().unwrap().is_invalid_upload_source());
        assert_eq!(api.insert_attempts(), 1);
        assert!(original.calls().is_empty());
    }

    #[tokio::test]
    async fn rejection_without_materializer_propagates() {
        let (storage, api, original) = storage_with(MockYouTube::new(), |config| config);
        api.reject_next_insert(media_body_required());
        let mut source = Cursor::new(b"streamed".to_vec());

        let err = storage
            .upload(&mut source, "id", &Metadata::new(), &Snippet::new())
            .await
            .unwrap_err();

        let api_error = err.api_error().unwrap();
        assert_eq!(api_error.status, StatusCode::BAD_REQUEST);
        assert!(api_error.message.contains("mediaBodyRequired"));
        assert_eq!(api.insert_attempts(), 1);
        assert!(original.calls().is_empty());
        assert_eq!(source.position(), 0);
    }

    #[tokio::test]
    async fn rejection_with_materializer_retries_from_temp_file() {
        let (storage, api, original) = storage_with(MockYouTube::new(), |config| config);
        api.reject_next_insert(media_body_required());
        let mut source = MaterializableSource {
            content: Cursor::new(b"needs a file".to_vec()),
            materialized_at: None,
        };

        let uploaded = storage
            .upload(&mut source, "id", &Metadata::new(), &Snippet::new())
            .await
            .unwrap();

        assert_eq!(api.insert_attempts(), 2);
        assert_eq!(api.media(&uploaded.id).unwrap(), b"needs a file");
        let tempfile = source.materialized_at.unwrap();
        assert!(!tempfile.exists());
        assert_eq!(&original.read(&uploaded.id).await.unwrap()[..], b"needs a file");
    }

    #[tokio::test]
    async fn failed_retry_still_removes_temp_file() {
        let (storage, api, _original) = storage_with(MockYouTube::new(), |config| config);
        api.reject_next_insert(media_body_required());
        api.reject_next_insert(ApiError::new(
            Method::POST,
            StatusCode::FORBIDDEN,
            "quotaExceeded",
        ));
        let mut source = MaterializableSource {
            content: Cursor::new(b"unlucky".to_vec()),
            materialized_at: None,
        };

        let err = storage
            .upload(&mut source, "id", &Metadata::new(), &Snippet::new())
            .await
            .unwrap_err();

        assert_eq!(err.api_error().unwrap().status, StatusCode::FORBIDDEN);
        assert!(!source.materialized_at.unwrap().exists());
        assert_eq!(source.content.position(), 0);
    }

    #[tokio::test]
    async fn other_rejections_do_not_materialize() {
        let (storage, api, _original) = storage_with(MockYouTube::new(), |config| config);
        api.reject_next_insert(ApiError::new(
            Method::POST,
            StatusCode::BAD_REQUEST,
            "invalidTitle",
        ));
        let mut source = MaterializableSource {
            content: Cursor::new(b"content".to_vec()),
            materialized_at: None,
        };

        storage
            .upload(&mut source, "id", &Metadata::new(), &Snippet::new())
            .await
            .unwrap_err();

        assert_eq!(api.insert_attempts(), 1);
        assert!(source.materialized_at.is_none());
    }

    #[tokio::test]
    async fn stored_file_falls_back_through_download() {
        let (storage, api, _original) = storage_with(MockYouTube::new(), |config| config);
        let cache = Arc::new(MockStorage::new());
        cache
            .upload(&mut Cursor::new(b"cached".to_vec()), "cache/1", &Metadata::new())
            .await
            .unwrap();
        api.reject_next_insert(media_body_required());

        let mut source = StoredFile::open(cache.clone(), "cache/1").await.unwrap();
        let uploaded = storage
            .upload(&mut source, "id", &Metadata::new(), &Snippet::new())
            .await
            .unwrap();

        assert_eq!(api.media(&uploaded.id).unwrap(), b"cached");
        assert_eq!(cache.count(|call| matches!(call, Call::Download(_))), 1);
    }
}
