//! Sources an upload reads from.

use crate::{Reader, Storage, StorageError, StorageResult};
use async_trait::async_trait;
use std::io::{self, SeekFrom};
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::io::{AsyncRead, AsyncSeekExt};

/// Content handed to [`Storage::upload`].
///
/// A source can be read once and then rewound to its first byte so that several backends
/// can consume the same upload in turn.
#[async_trait]
pub trait UploadSource: Send {
    fn reader(&mut self) -> &mut (dyn AsyncRead + Send + Unpin);

    /// Moves the read position back to the start. Calling it repeatedly is harmless.
    async fn rewind(&mut self) -> io::Result<()>;

    /// Returns the source's [`Materialize`] capability, if it has one.
    fn materializer(&mut self) -> Option<&mut dyn Materialize> {
        None
    }
}

/// A source that can copy its whole content into a local temporary file.
///
/// Consumers that cannot work with a stream use this to get a real file instead.
#[async_trait]
pub trait Materialize: Send {
    async fn materialize(&mut self) -> StorageResult<NamedTempFile>;
}

#[async_trait]
impl<T> UploadSource for io::Cursor<T>
where
    T: AsRef<[u8]> + Send + Unpin,
{
    fn reader(&mut self) -> &mut (dyn AsyncRead + Send + Unpin) {
        self
    }

    async fn rewind(&mut self) -> io::Result<()> {
        self.set_position(0);
        Ok(())
    }
}

#[async_trait]
impl UploadSource for tokio::fs::File {
    fn reader(&mut self) -> &mut (dyn AsyncRead + Send + Unpin) {
        self
    }

    async fn rewind(&mut self) -> io::Result<()> {
        AsyncSeekExt::seek(self, SeekFrom::Start(0)).await?;
        Ok(())
    }
}

/// A file already held by some [`Storage`], read back as an upload source.
///
/// This is what moving an attachment from one backend to another looks like. The file can be
/// materialized through [`Storage::download`].
pub struct StoredFile {
    storage: Arc<dyn Storage>,
    id: String,
    reader: Reader,
}

impl StoredFile {
    pub async fn open(storage: Arc<dyn Storage>, id: impl Into<String>) -> StorageResult<Self> {
        let id = id.into();
        let reader = storage.open(&id).await?;
        Ok(Self {
            storage,
            id,
            reader,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl UploadSource for StoredFile {
    fn reader(&mut self) -> &mut (dyn AsyncRead + Send + Unpin) {
        &mut self.reader
    }

    async fn rewind(&mut self) -> io::Result<()> {
        // stored files can only be read front to back, so start over with a fresh handle
        self.reader = self.storage.open(&self.id).await.map_err(|e| match e {
            StorageError::Io(e) => e,
            e => io::Error::other(e),
        })?;
        Ok(())
    }

    fn materializer(&mut self) -> Option<&mut dyn Materialize> {
        Some(self)
    }
}

#[async_trait]
impl Materialize for StoredFile {
    async fn materialize(&mut self) -> StorageResult<NamedTempFile> {
        tracing::debug!(id = %self.id, "materializing stored file");
        self.storage.download(&self.id).await
    }
}
