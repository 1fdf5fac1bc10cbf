use crate::config::ConfigBuilderError;
use crate::youtube_api::ApiError;
use attachment_sdk::StorageError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required option is missing or empty.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The authenticated account does not own exactly one channel.
    #[error(
        "could not determine the user's channel (found {found} channels); create one at https://www.youtube.com/create_channel or set channel_id"
    )]
    UserChannelNotFound { found: usize },

    #[error("channel {0} has no uploads playlist")]
    UploadsPlaylistNotFound(String),

    #[error("video {0} not found")]
    VideoNotFound(String),

    /// The reserved `"youtube"` metadata entry is not an object.
    #[error("invalid video metadata: {0}")]
    InvalidMetadata(String),

    #[error("{0:#}")]
    Api(eyre::Report),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Error::Configuration(_) | Error::UserChannelNotFound { .. }
        )
    }

    /// The HTTP rejection behind an [`Error::Api`], if YouTube answered at all.
    pub fn api_error(&self) -> Option<&ApiError> {
        match self {
            Error::Api(report) => report.downcast_ref::<ApiError>(),
            _ => None,
        }
    }
}

// eyre::Report does not implement std::error::Error, so #[from] is not available
impl From<eyre::Report> for Error {
    fn from(report: eyre::Report) -> Self {
        Error::Api(report)
    }
}

impl From<ConfigBuilderError> for Error {
    fn from(error: ConfigBuilderError) -> Self {
        Error::Configuration(error.to_string())
    }
}

impl From<Error> for StorageError {
    fn from(error: Error) -> Self {
        match error {
            Error::Storage(error) => error,
            Error::Io(error) => StorageError::Io(error),
            error => StorageError::Backend(Box::new(error)),
        }
    }
}
