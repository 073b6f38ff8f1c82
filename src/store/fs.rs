//! Filesystem-backed stores: one file per key inside a directory.
//!
//! Payload files hold the raw bytes. Result files hold the JSON form of the
//! `ResultRecord` so the postpone flag and parameters survive.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use super::{PayloadStore, ResultStore};
use crate::error::{Error, Result};
use crate::model::{PayloadRecord, ResultRecord};

/// A directory of key-named files.
#[derive(Debug, Clone)]
struct KeyDir {
    root: PathBuf,
}

impl KeyDir {
    fn create(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty()
            || key == "."
            || key == ".."
            || key.contains(['/', '\\'])
            || key.contains('\0')
        {
            return Err(Error::Store(format!("invalid store key {key:?}")));
        }
        Ok(self.root.join(key))
    }

    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path_for(key)?).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()> {
        let path = self.path_for(key)?;
        tokio::fs::write(&path, bytes).await?;
        debug!(path = %path.display(), len = bytes.len(), "record written");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path_for(key)?).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(tokio::fs::try_exists(self.path_for(key)?).await?)
    }
}

pub struct FileSystemPayloadStore {
    dir: KeyDir,
}

impl FileSystemPayloadStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            dir: KeyDir::create(dir)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.dir.root
    }
}

#[async_trait]
impl PayloadStore for FileSystemPayloadStore {
    async fn store(&self, payload: PayloadRecord) -> Result<()> {
        self.dir.write(&payload.key, &payload.data).await
    }

    async fn get(&self, key: &str) -> Result<Option<PayloadRecord>> {
        Ok(self
            .dir
            .read(key)
            .await?
            .map(|data| PayloadRecord::new(key, data)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.dir.remove(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.dir.exists(key).await
    }
}

pub struct FileSystemResultStore {
    dir: KeyDir,
}

impl FileSystemResultStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            dir: KeyDir::create(dir)?,
        })
    }

    pub fn root(&self) -> &Path {
        &self.dir.root
    }
}

#[async_trait]
impl ResultStore for FileSystemResultStore {
    async fn store(&self, result: ResultRecord) -> Result<()> {
        let json = serde_json::to_vec(&result)?;
        self.dir.write(&result.key, &json).await
    }

    async fn get(&self, key: &str) -> Result<Option<ResultRecord>> {
        match self.dir.read(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.dir.remove(key).await
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.dir.exists(key).await
    }
}
