//! Recording storage backend for tests.
//!
//! [`MockStorage`] behaves like [`MemoryStorage`] and additionally journals every call it
//! receives, so tests of wrapping backends can check what was forwarded, with which
//! arguments, and in which order.

use crate::{
    MemoryStorage, Metadata, Reader, Storage, StorageError, StorageResult, UploadSource,
    UrlOptions,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};
use tempfile::NamedTempFile;

/// A call received by [`MockStorage`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Upload { id: String, metadata: Metadata },
    Download(String),
    Open(String),
    Read(String),
    Stream(String),
    Exists(String),
    Delete(String),
    Url { id: String, options: UrlOptions },
    Clear,
}

#[derive(Debug, Default)]
pub struct MockStorage {
    inner: MemoryStorage,
    calls: Mutex<Vec<Call>>,
    fail_uploads: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MockStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call received so far, oldest first.
    pub fn calls(&self) -> Vec<Call> {
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// How many received calls satisfy `predicate`.
    pub fn count(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| predicate(call)).count()
    }

    /// Makes subsequent uploads consume their source and then fail with an I/O error.
    pub fn fail_uploads(&self) {
        self.fail_uploads.store(true, Ordering::SeqCst);
    }

    /// Makes subsequent deletes fail with an I/O error.
    pub fn fail_deletes(&self) {
        self.fail_deletes.store(true, Ordering::SeqCst);
    }

    /// Direct access to the stored content, bypassing the journal.
    pub fn contents(&self) -> &MemoryStorage {
        &self.inner
    }

    fn record(&self, call: Call) {
        tracing::trace!(?call, "mock storage call");
        self.calls
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(call);
    }
}

#[async_trait]
impl Storage for MockStorage {
    async fn upload(
        &self,
        io: &mut dyn UploadSource,
        id: &str,
        metadata: &Metadata,
    ) -> StorageResult<String> {
        self.record(Call::Upload {
            id: id.to_string(),
            metadata: metadata.clone(),
        });
        if self.fail_uploads.load(Ordering::SeqCst) {
            tokio::io::copy(io.reader(), &mut tokio::io::sink()).await?;
            return Err(StorageError::Io(std::io::Error::other("disk full")));
        }
        self.inner.upload(io, id, metadata).await
    }

    async fn download(&self, id: &str) -> StorageResult<NamedTempFile> {
        self.record(Call::Download(id.to_string()));
        self.inner.download(id).await
    }

    async fn open(&self, id: &str) -> StorageResult<Reader> {
        self.record(Call::Open(id.to_string()));
        self.inner.open(id).await
    }

    async fn read(&self, id: &str) -> StorageResult<Bytes> {
        self.record(Call::Read(id.to_string()));
        self.inner.read(id).await
    }

    async fn stream(
        &self,
        id: &str,
        consumer: &mut (dyn FnMut(Bytes) + Send),
    ) -> StorageResult<()> {
        self.record(Call::Stream(id.to_string()));
        self.inner.stream(id, consumer).await
    }

    async fn exists(&self, id: &str) -> StorageResult<bool> {
        self.record(Call::Exists(id.to_string()));
        self.inner.exists(id).await
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        self.record(Call::Delete(id.to_string()));
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other("delete refused")));
        }
        self.inner.delete(id).await
    }

    fn url(&self, id: &str, options: &UrlOptions) -> StorageResult<String> {
        self.record(Call::Url {
            id: id.to_string(),
            options: options.clone(),
        });
        self.inner.url(id, options)
    }

    async fn clear(&self) -> StorageResult<()> {
        self.record(Call::Clear);
        self.inner.clear().await
    }
}
