//! Persisted credential cache for the streaming session.
//!
//! The cache stores an opaque, service-defined blob at a platform-standard
//! location (override via [`ServiceConfig::credentials_path`]). The blob is
//! only mutated during authentication, which callers must serialize through
//! [`CredentialCache::lock`] so concurrent track pipelines never race on
//! re-authentication.
//!
//! [`ServiceConfig::credentials_path`]: crate::config::ServiceConfig

use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};

/// File name of the cached credential blob inside the cache directory
const CREDENTIALS_FILE: &str = "credentials.json";

/// Persisted credential cache with an in-process critical section.
pub struct CredentialCache {
    path: PathBuf,
    /// Held across the whole authenticate() flow
    auth_lock: tokio::sync::Mutex<()>,
}

impl CredentialCache {
    /// Create a cache at the configured or platform-standard location.
    ///
    /// Fails with [`Error::Config`] when no override is configured and the
    /// platform cache directory cannot be determined.
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let path = match &config.credentials_path {
            Some(path) => path.clone(),
            None => {
                let dirs = directories::ProjectDirs::from("io", "playlist-dl", "playlist-dl")
                    .ok_or_else(|| Error::Config {
                        message: "unable to determine the platform cache directory".to_string(),
                        key: Some("credentials_path".to_string()),
                    })?;
                dirs.cache_dir().join(CREDENTIALS_FILE)
            }
        };
        Ok(Self::at_path(path))
    }

    /// Create a cache backed by an explicit file path.
    pub fn at_path(path: PathBuf) -> Self {
        Self {
            path,
            auth_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Location of the cached blob
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True if a cached blob is present
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the cached blob, or None if no cache exists.
    pub async fn read(&self) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Write the blob, creating parent directories as needed.
    pub async fn write(&self, blob: &[u8]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&self.path, blob).await?;
        tracing::debug!(path = %self.path.display(), "Persisted credential cache");
        Ok(())
    }

    /// Delete the cached blob, forcing re-authentication on next use.
    ///
    /// Succeeds even when no cache exists.
    pub async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "Cleared cached credentials");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Enter the authenticate() critical section.
    ///
    /// The returned guard must be held for the full cached-read / device-flow /
    /// write sequence.
    pub async fn lock(&self) -> tokio::sync::MutexGuard<'_, ()> {
        self.auth_lock.lock().await
    }
}
