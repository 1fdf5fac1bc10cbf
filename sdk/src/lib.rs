//! Storage abstraction for file-attachment backends.
//!
//! An attachment framework talks to every backend through the [`Storage`] trait. Backends
//! persist the bytes of an [`UploadSource`] under a string id and hand them back through
//! [`Storage::download`], [`Storage::open`], [`Storage::read`] or [`Storage::stream`].
//!
//! Backends may also wrap one another: a backend that stores its content somewhere that
//! cannot serve raw bytes (a video hosting service, say) keeps an "original" backend next to
//! it and forwards byte-level operations there.
//!
//! ```rust,no_run
//! use attachment_sdk::{MemoryStorage, Metadata, Storage};
//! use std::io::Cursor;
//!
//! # async fn example() -> Result<(), attachment_sdk::StorageError> {
//! let storage = MemoryStorage::new();
//! let mut source = Cursor::new(b"hello".to_vec());
//! let id = storage.upload(&mut source, "greeting.txt", &Metadata::new()).await?;
//! assert_eq!(&storage.read(&id).await?[..], b"hello");
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use bytes::Bytes;
use std::pin::Pin;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};

pub mod filesystem;
pub mod memory;
#[cfg(feature = "mock")]
pub mod mock;
pub mod source;

pub use filesystem::FileSystemStorage;
pub use memory::MemoryStorage;
pub use source::{Materialize, StoredFile, UploadSource};

/// Caller-supplied metadata accompanying an upload (`filename`, `mime_type`, ...).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Backend-specific options for [`Storage::url`].
pub type UrlOptions = serde_json::Map<String, serde_json::Value>;

/// A readable handle on a stored file.
pub type Reader = Pin<Box<dyn AsyncRead + Send>>;

/// Size of the blocks handed to the consumer of [`Storage::stream`].
pub const STREAM_CHUNK_SIZE: usize = 16 * 1024;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("invalid storage id: {0}")]
    InvalidId(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failure reported by a backend with its own error type.
    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Operations every attachment backend provides.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persists the content of `io` under `id` and returns the id the file was actually
    /// stored under.
    ///
    /// Most backends keep `id` as is. Backends whose remote side assigns identifiers return
    /// that identifier instead, and callers must use the returned value from then on.
    async fn upload(
        &self,
        io: &mut dyn UploadSource,
        id: &str,
        metadata: &Metadata,
    ) -> StorageResult<String>;

    /// Copies the file into a fresh temporary file, which is removed when dropped.
    async fn download(&self, id: &str) -> StorageResult<NamedTempFile>;

    async fn open(&self, id: &str) -> StorageResult<Reader>;

    async fn read(&self, id: &str) -> StorageResult<Bytes> {
        let mut reader = self.open(id).await?;
        let mut content = Vec::new();
        reader.read_to_end(&mut content).await?;
        Ok(Bytes::from(content))
    }

    /// Feeds the file to `consumer` in blocks of at most [`STREAM_CHUNK_SIZE`] bytes.
    async fn stream(
        &self,
        id: &str,
        consumer: &mut (dyn FnMut(Bytes) + Send),
    ) -> StorageResult<()> {
        let mut reader = self.open(id).await?;
        let mut buf = vec![0; STREAM_CHUNK_SIZE];
        loop {
            let n = reader.read(&mut buf).await?;
            if n == 0 {
                return Ok(());
            }
            consumer(Bytes::copy_from_slice(&buf[..n]));
        }
    }

    async fn exists(&self, id: &str) -> StorageResult<bool>;

    /// Removes the file. Deleting a missing file is not an error.
    async fn delete(&self, id: &str) -> StorageResult<()>;

    fn url(&self, id: &str, options: &UrlOptions) -> StorageResult<String>;

    /// Removes every stored file.
    async fn clear(&self) -> StorageResult<()>;
}
