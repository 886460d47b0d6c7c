//! Health registry and shared key/value configuration interfaces

use crate::error::ClusterResult;
use async_trait::async_trait;
use liquid_types::CheckReport;

/// Service discovery registry holding health check results
#[async_trait]
pub trait HealthRegistry: Send + Sync {
    /// All checks currently registered for a service.
    ///
    /// The registry may report the same check more than once (one entry per
    /// registered instance); callers decide how to reconcile duplicates.
    async fn checks(&self, service: &str) -> ClusterResult<Vec<CheckReport>>;
}

/// Cluster-wide key/value configuration read by the jobs
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn set(&self, key: &str, value: &str) -> ClusterResult<()>;
}
