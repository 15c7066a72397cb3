//! File operations

use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::errors::LaunchError;

/// A file on the controller's disk
#[derive(Debug, Clone)]
pub struct File {
    path: PathBuf,
}

impl File {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        fs::metadata(&self.path)
            .await
            .map(|m| m.is_file())
            .unwrap_or(false)
    }

    pub async fn read_string(&self) -> Result<String, LaunchError> {
        Ok(fs::read_to_string(&self.path).await?)
    }

    /// Read and parse JSON
    pub async fn read_json<T: DeserializeOwned>(&self) -> Result<T, LaunchError> {
        let contents = self.read_string().await?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Read JSON, `None` if the file does not exist
    pub async fn read_json_opt<T: DeserializeOwned>(&self) -> Result<Option<T>, LaunchError> {
        match fs::read_to_string(&self.path).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Serialize as pretty JSON and replace the file atomically.
    ///
    /// Records may hold server passwords, so the file is owner-only on Unix.
    pub async fn write_json<T: Serialize>(&self, value: &T) -> Result<(), LaunchError> {
        let contents = serde_json::to_vec_pretty(value)?;
        self.write_atomic(&contents).await?;
        self.set_permissions_600().await
    }

    /// Write through a sibling temp file and rename over the target
    pub async fn write_atomic(&self, contents: &[u8]) -> Result<(), LaunchError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let temp_path = self.path.with_extension("tmp");

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(contents).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, &self.path).await?;
        Ok(())
    }

    pub async fn delete(&self) -> Result<(), LaunchError> {
        if self.exists().await {
            fs::remove_file(&self.path).await?;
        }
        Ok(())
    }

    /// Owner read/write only (0o600) on Unix, no-op elsewhere
    pub async fn set_permissions_600(&self) -> Result<(), LaunchError> {
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600)).await?;
        }
        Ok(())
    }
}
