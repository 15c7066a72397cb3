//! Directory operations

use std::path::{Path, PathBuf};

use tokio::fs;

use crate::errors::LaunchError;
use crate::filesys::file::File;

/// A directory on the controller's disk
#[derive(Debug, Clone)]
pub struct Dir {
    path: PathBuf,
}

impl Dir {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    /// Create the directory and its parents
    pub async fn create(&self) -> Result<(), LaunchError> {
        fs::create_dir_all(&self.path).await?;
        Ok(())
    }

    pub async fn delete(&self) -> Result<(), LaunchError> {
        if self.exists().await {
            fs::remove_dir_all(&self.path).await?;
        }
        Ok(())
    }

    /// Files with the given extension, sorted by path
    pub async fn list_files(&self, extension: &str) -> Result<Vec<File>, LaunchError> {
        if !self.exists().await {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        let mut entries = fs::read_dir(&self.path).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some(extension) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths.into_iter().map(File::new).collect())
    }

    pub fn file(&self, name: &str) -> File {
        File::new(self.path.join(name))
    }

    pub fn subdir(&self, name: &str) -> Dir {
        Dir::new(self.path.join(name))
    }

    /// Fresh directory under the system temp dir
    pub async fn create_temp_dir(prefix: &str) -> Result<Dir, LaunchError> {
        let path = std::env::temp_dir().join(format!("{}-{}", prefix, uuid::Uuid::new_v4()));
        fs::create_dir_all(&path).await?;
        Ok(Dir::new(path))
    }
}
