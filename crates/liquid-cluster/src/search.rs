//! Search index interface

use crate::error::ClusterResult;
use async_trait::async_trait;
use liquid_types::CollectionName;

/// The search service collections are registered with
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Collections currently registered.
    async fn list_collections(&self) -> ClusterResult<Vec<CollectionName>>;

    /// Register a collection, pointing the index at its data source.
    async fn add_collection(
        &self,
        name: &CollectionName,
        index: &str,
        source_url: &str,
        public: bool,
    ) -> ClusterResult<()>;

    /// Remove a collection and its index.
    async fn remove_collection(&self, name: &CollectionName) -> ClusterResult<()>;

    /// Set display titles.
    async fn push_titles(&self, titles: &[(CollectionName, String)]) -> ClusterResult<()>;
}
