//! Directory transport for remotes mounted into the local filesystem.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{local_path, RemoteTransport, TransportError, TransportResult};
use crate::util::now_millis;

/// Remote backed by a local or mounted directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryTransport {
    root: PathBuf,
}

impl DirectoryTransport {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

fn io_error(target: &Path, source: std::io::Error) -> TransportError {
    TransportError::Io {
        target: target.display().to_string(),
        source,
    }
}

impl RemoteTransport for DirectoryTransport {
    async fn ensure_collection(&self, collection: &str) -> TransportResult<()> {
        let path = local_path(&self.root, collection)?;
        tokio::fs::create_dir_all(&path)
            .await
            .map_err(|error| io_error(&path, error))
    }

    async fn exists(&self, object: &str) -> TransportResult<bool> {
        let path = local_path(&self.root, object)?;
        match tokio::fs::metadata(&path).await {
            Ok(metadata) => Ok(metadata.is_file()),
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(false),
            Err(error) => Err(io_error(&path, error)),
        }
    }

    async fn fetch(&self, object: &str) -> TransportResult<Vec<u8>> {
        let path = local_path(&self.root, object)?;
        tokio::fs::read(&path).await.map_err(|error| {
            if error.kind() == ErrorKind::NotFound {
                TransportError::NotFound(path.display().to_string())
            } else {
                io_error(&path, error)
            }
        })
    }

    async fn store(&self, object: &str, bytes: &[u8]) -> TransportResult<()> {
        let path = local_path(&self.root, object)?;
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        // Same directory as the target so the rename stays on one filesystem.
        let staging = path.with_file_name(format!(
            ".{file_name}.{}.part",
            now_millis().timestamp_millis()
        ));

        if let Err(error) = tokio::fs::write(&staging, bytes).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(io_error(&staging, error));
        }
        if let Err(error) = tokio::fs::rename(&staging, &path).await {
            let _ = tokio::fs::remove_file(&staging).await;
            return Err(io_error(&path, error));
        }
        Ok(())
    }
}
