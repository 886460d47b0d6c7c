//! Secret store interface

use crate::error::ClusterResult;
use async_trait::async_trait;
use liquid_types::{SecretPath, SecretValue};

/// Path-addressed store for sensitive values
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Read a secret; `None` when nothing is stored at the path.
    async fn read(&self, path: &SecretPath) -> ClusterResult<Option<SecretValue>>;

    /// Write a secret, replacing any previous value.
    async fn set(&self, path: &SecretPath, value: &SecretValue) -> ClusterResult<()>;

    /// Names directly under a prefix. Sub-folders end in `/`.
    async fn list(&self, prefix: &str) -> ClusterResult<Vec<String>>;

    /// Enable the secret engine Liquid stores its secrets in, if needed.
    async fn ensure_engine(&self) -> ClusterResult<()>;
}
