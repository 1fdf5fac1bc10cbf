//! YouTube Videos API types and functionality.

use crate::youtube_api::types::PageInfo;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use std::fmt;

/// The descriptive metadata of a video: title, description, channelId, tags, categoryId, ...
///
/// Kept as an open map because callers may set any field the API accepts.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#snippet>
pub type Snippet = Map<String, Value>;

/// A video resource rendered as a plain JSON object, every part included.
pub type VideoRecord = Map<String, Value>;

/// Response structure for the `videos.list` API call.
///
/// Contains a list of [`Video`] resources that match the request criteria,
/// along with pagination information in [`PageInfo`].
///
/// See: <https://developers.google.com/youtube/v3/docs/videos/list>
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoListResponse {
    /// Identifies the API resource's type.
    ///
    /// The value will be `youtube#videoListResponse`.
    #[serde(default)]
    pub kind: String,
    /// A list of videos that match the request criteria.
    #[serde(default)]
    pub items: VecDeque<Video>,
    #[serde(rename = "pageInfo", default)]
    pub page_info: PageInfo,
    /// Token that can be used as the value of the pageToken parameter to retrieve the next page in the result set.
    #[serde(rename = "nextPageToken", skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// A `video` resource represents a YouTube video.
///
/// Only the parts named in a request's `part` parameter are present. Parts this crate does not
/// model explicitly end up in `other` and survive a round trip unchanged.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#resource>
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Video {
    /// The ID that YouTube uses to uniquely identify the video.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Basic details about the video, such as its title and description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snippet: Option<Snippet>,
    /// Upload, processing, and privacy status of the video.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<VideoStatus>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl Video {
    /// The parts a request for this video has to name, e.g. `snippet,status`.
    pub fn parts(&self) -> String {
        let mut parts = Vec::new();
        if self.snippet.is_some() {
            parts.push("snippet");
        }
        if self.status.is_some() {
            parts.push("status");
        }
        parts.join(",")
    }

    /// Flattens the video into a plain JSON object.
    pub fn into_record(self) -> VideoRecord {
        let mut record = self.other;
        if let Some(id) = self.id {
            record.insert("id".to_string(), Value::String(id));
        }
        if let Some(snippet) = self.snippet {
            record.insert("snippet".to_string(), Value::Object(snippet));
        }
        if let Some(status) = self.status {
            record.insert("status".to_string(), Value::Object(status.into_map()));
        }
        record
    }
}

/// Status of the video.
///
/// See: <https://developers.google.com/youtube/v3/docs/videos#status>
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VideoStatus {
    #[serde(rename = "privacyStatus", skip_serializing_if = "Option::is_none")]
    pub privacy_status: Option<Privacy>,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl VideoStatus {
    fn into_map(self) -> Map<String, Value> {
        let mut map = self.other;
        if let Some(privacy) = self.privacy_status {
            map.insert(
                "privacyStatus".to_string(),
                Value::String(privacy.as_str().to_string()),
            );
        }
        map
    }
}

/// Who can see a video.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Privacy {
    #[default]
    Private,
    Unlisted,
    Public,
}

impl Privacy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Privacy::Private => "private",
            Privacy::Unlisted => "unlisted",
            Privacy::Public => "public",
        }
    }
}

impl fmt::Display for Privacy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Privacy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "private" => Ok(Privacy::Private),
            "unlisted" => Ok(Privacy::Unlisted),
            "public" => Ok(Privacy::Public),
            other => Err(format!(
                "unknown privacy status '{other}', expected private, unlisted, or public"
            )),
        }
    }
}
