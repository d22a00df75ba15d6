//! File-backed key source

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{KeySnapshot, KeySource, certificate_error, parse_public_keys};
use crate::error::Result;
use crate::http::with_cancellation;

/// Reads a `{kid: "<PEM certificate>"}` JSON file on first use and keeps the
/// parsed snapshot for the lifetime of the source
///
/// A failed read is not cached; the next call tries again.
#[derive(Debug)]
pub struct FileKeySource {
    path: PathBuf,
    snapshot: OnceCell<Arc<KeySnapshot>>,
}

impl FileKeySource {
    /// Create a source for the file at `path`
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            snapshot: OnceCell::new(),
        }
    }

    /// Path of the backing file
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<Arc<KeySnapshot>> {
        let contents = tokio::fs::read(&self.path).await.map_err(|e| {
            certificate_error(format!(
                "failed to read public keys from {}: {e}",
                self.path.display()
            ))
        })?;
        let keys = parse_public_keys(&contents)?;

        info!(path = %self.path.display(), key_count = keys.len(), "Loaded public keys from file");
        Ok(Arc::new(KeySnapshot::permanent(keys)))
    }
}

#[async_trait]
impl KeySource for FileKeySource {
    async fn keys(&self, cancel: &CancellationToken) -> Result<Arc<KeySnapshot>> {
        let snapshot = with_cancellation(cancel, self.snapshot.get_or_try_init(|| self.load()))
            .await??;
        Ok(Arc::clone(snapshot))
    }
}
