//! Persisted collection data interface

use crate::error::ClusterResult;
use async_trait::async_trait;
use liquid_types::CollectionName;

/// Data left on disk by collections
#[async_trait]
pub trait ResidualData: Send + Sync {
    /// Collections that have persisted data.
    async fn list(&self) -> ClusterResult<Vec<CollectionName>>;

    /// Delete a collection's persisted data.
    async fn remove(&self, collection: &CollectionName) -> ClusterResult<()>;
}
