use crate::{
    Metadata, Reader, Storage, StorageError, StorageResult, UploadSource, UrlOptions,
};
use async_trait::async_trait;
use std::io;
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Stores files under a directory on the local filesystem.
#[derive(Debug, Clone)]
pub struct FileSystemStorage {
    directory: PathBuf,
    base_url: Option<String>,
}

impl FileSystemStorage {
    /// Creates the storage, creating `directory` if it does not exist yet.
    pub async fn new(directory: impl Into<PathBuf>) -> StorageResult<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory).await?;
        let directory = fs::canonicalize(&directory).await?;
        Ok(Self {
            directory,
            base_url: None,
        })
    }

    /// Serves urls as `{base_url}/{id}` instead of absolute file paths.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Maps an id to its path, rejecting ids that would escape the storage directory.
    fn path(&self, id: &str) -> StorageResult<PathBuf> {
        let relative = Path::new(id);
        let well_formed = !id.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !well_formed {
            return Err(StorageError::InvalidId(id.to_string()));
        }
        Ok(self.directory.join(relative))
    }
}

fn not_found(id: &str) -> impl FnOnce(io::Error) -> StorageError + '_ {
    move |e| match e.kind() {
        io::ErrorKind::NotFound => StorageError::FileNotFound(id.to_string()),
        _ => StorageError::Io(e),
    }
}

#[async_trait]
impl Storage for FileSystemStorage {
    async fn upload(
        &self,
        io: &mut dyn UploadSource,
        id: &str,
        _metadata: &Metadata,
    ) -> StorageResult<String> {
        let path = self.path(id)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut file = fs::File::create(&path).await?;
        let size = tokio::io::copy(io.reader(), &mut file).await?;
        file.sync_all().await?;

        tracing::debug!(path = %path.display(), size_bytes = size, "stored file on disk");
        Ok(id.to_string())
    }

    async fn download(&self, id: &str) -> StorageResult<NamedTempFile> {
        let path = self.path(id)?;
        let tempfile = NamedTempFile::new()?;
        let mut source = fs::File::open(&path).await.map_err(not_found(id))?;
        let mut target = fs::File::from_std(tempfile.reopen()?);
        tokio::io::copy(&mut source, &mut target).await?;
        target.flush().await?;
        Ok(tempfile)
    }

    async fn open(&self, id: &str) -> StorageResult<Reader> {
        let path = self.path(id)?;
        let file = fs::File::open(&path).await.map_err(not_found(id))?;
        Ok(Box::pin(file))
    }

    async fn exists(&self, id: &str) -> StorageResult<bool> {
        let path = self.path(id)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn delete(&self, id: &str) -> StorageResult<()> {
        let path = self.path(id)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn url(&self, id: &str, _options: &UrlOptions) -> StorageResult<String> {
        let path = self.path(id)?;
        Ok(match &self.base_url {
            Some(base_url) => format!("{}/{}", base_url.trim_end_matches('/'), id),
            None => path.display().to_string(),
        })
    }

    async fn clear(&self) -> StorageResult<()> {
        let mut entries = fs::read_dir(&self.directory).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                fs::remove_dir_all(entry.path()).await?;
            } else {
                fs::remove_file(entry.path()).await?;
            }
        }
        tracing::debug!(directory = %self.directory.display(), "cleared storage directory");
        Ok(())
    }
}
