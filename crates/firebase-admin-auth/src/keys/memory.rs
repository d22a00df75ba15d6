//! In-memory key source

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{KeySnapshot, KeySource, PublicKey};
use crate::error::Result;

/// Serves a fixed snapshot injected at construction
#[derive(Debug, Clone)]
pub struct StaticKeySource {
    snapshot: Arc<KeySnapshot>,
}

impl StaticKeySource {
    /// Serve `keys` forever
    pub fn new(keys: impl IntoIterator<Item = PublicKey>) -> Self {
        Self {
            snapshot: Arc::new(KeySnapshot::permanent(keys)),
        }
    }

    /// Parse a `kid -> PEM certificate` map
    ///
    /// # Errors
    ///
    /// Fails if any certificate is unusable.
    pub fn from_pem_map(certificates: &HashMap<String, String>) -> Result<Self> {
        let keys = certificates
            .iter()
            .map(|(kid, pem)| PublicKey::from_pem(kid.clone(), pem.as_bytes()))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(keys))
    }
}

#[async_trait]
impl KeySource for StaticKeySource {
    async fn keys(&self, _cancel: &CancellationToken) -> Result<Arc<KeySnapshot>> {
        Ok(Arc::clone(&self.snapshot))
    }
}
