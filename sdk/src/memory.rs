use crate::{
    Metadata, Reader, Storage, StorageError, StorageResult, UploadSource, UrlOptions,
};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::io::Cursor;
use tempfile::NamedTempFile;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::RwLock;

/// Keeps every file in memory. Mostly useful for tests and as a scratch backend.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    files: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.files.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.files.read().await.is_empty()
    }

    async fn get(&self, id: &str) -> StorageResult<Bytes> {
        self.files
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::FileNotFound(id.to_string()))
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn upload(
        &self,
        io: &mut dyn UploadSource,
        id: &str,
        _metadata: &Metadata,
    ) -> StorageResult<String> {
        let mut content = Vec::new();
        io.reader().read_to_end(&mut content).await?;
        tracing::trace!(id, bytes = content.len(), "stored file in memory");
        self.files
            .write()
            .await
            .insert(id.to_string(), Bytes::from(content));
        Ok(id.to_string())
    }

    async fn download(&self, id: &str) -> StorageResult<NamedTempFile> {
        let content = self.get(id).await?;
        let tempfile = NamedTempFile::new()?;
        let mut file = tokio::fs::File::from_std(tempfile.reopen()?);
        file.write_all(&content).await?;
        file.flush().await?;
        Ok(tempfile)
    }

    async fn open(&self, id: &str) -> StorageResult<Reader> {
        Ok(Box::pin(Cursor::new(self.get(id).await?)))
    }

    async fn read(&self, id: &str) -> StorageResult<Bytes> {
        self.get(id).await
    }

    async fn exists(&self, id: &str) -> StorageResult<bool> {
        Ok(self.files.read().await.contains_key(id))
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        self.files.write().await.remove(id);
        Ok(())
    }

    fn url(&self, id: &str, _options: &UrlOptions) -> StorageResult<String> {
        Ok(format!("memory://{id}"))
    }

    async fn clear(&self) -> StorageResult<()> {
        self.files.write().await.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn upload_read_delete() {
        let storage = MemoryStorage::new();
        let mut source = Cursor::new(b"0123456789".to_vec());
        let id = storage
            .upload(&mut source, "digits", &Metadata::new())
            .await
            .unwrap();
        assert_eq!(id, "digits");
        assert!(storage.exists("digits").await.unwrap());
        assert_eq!(&storage.read("digits").await.unwrap()[..], b"0123456789");

        let mut reader = storage.open("digits").await.unwrap();
        let mut opened = Vec::new();
        reader.read_to_end(&mut opened).await.unwrap();
        assert_eq!(opened, b"0123456789");

        storage.delete("digits").await.unwrap();
        assert!(!storage.exists("digits").await.unwrap());
        // deleting again is fine
        storage.delete("digits").await.unwrap();
    }

    #[tokio::test]
    async fn stream_yields_whole_content() {
        let storage = MemoryStorage::new();
        let content = vec![7u8; crate::STREAM_CHUNK_SIZE + 10];
        let mut source = Cursor::new(content.clone());
        storage
            .upload(&mut source, "big", &Metadata::new())
            .await
            .unwrap();

        let mut chunks = Vec::new();
        storage
            .stream("big", &mut |chunk: Bytes| chunks.push(chunk))
            .await
            .unwrap();
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks.concat(), content);
    }

    #[tokio::test]
    async fn download_and_clear() {
        let storage = MemoryStorage::new();
        let mut source = Cursor::new(b"abc".to_vec());
        storage
            .upload(&mut source, "a", &Metadata::new())
            .await
            .unwrap();

        let tempfile = storage.download("a").await.unwrap();
        assert_eq!(std::fs::read(tempfile.path()).unwrap(), b"abc");
        assert_eq!(
            storage.url("a", &UrlOptions::new()).unwrap(),
            "memory://a"
        );

        storage.clear().await.unwrap();
        assert!(storage.is_empty().await);
        assert!(matches!(
            storage.read("a").await,
            Err(StorageError::FileNotFound(_))
        ));
    }
}
