//! Host checks run before a deployment

use crate::error::{DeployError, DeployResult};
use std::path::Path;
use tracing::{debug, instrument};

/// Kernel setting read by the memory-map check.
pub const MAX_MAP_COUNT_PATH: &str = "/proc/sys/vm/max_map_count";

/// Smallest `vm.max_map_count` the search engine starts with.
pub const MIN_MAX_MAP_COUNT: u64 = 262_144;

/// Check that the kernel allows enough memory maps.
#[instrument]
pub async fn check_max_map_count(path: &Path) -> DeployResult<()> {
    let text = tokio::fs::read_to_string(path).await.map_err(|e| {
        DeployError::Preflight(format!("could not read {}: {}", path.display(), e))
    })?;

    let count: u64 = text.trim().parse().map_err(|_| {
        DeployError::Preflight(format!(
            "unexpected content in {}: {:?}",
            path.display(),
            text.trim()
        ))
    })?;

    if count < MIN_MAX_MAP_COUNT {
        return Err(DeployError::Preflight(format!(
            "vm.max_map_count is {}, it should be at least {}; \
             run `sysctl -w vm.max_map_count={}`",
            count, MIN_MAX_MAP_COUNT, MIN_MAX_MAP_COUNT
        )));
    }

    debug!(count, "vm.max_map_count is large enough");
    Ok(())
}

/// Run every host check.
pub async fn run_checks() -> DeployResult<()> {
    check_max_map_count(Path::new(MAX_MAP_COUNT_PATH)).await
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn check(content: &str) -> DeployResult<()> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("max_map_count");
        std::fs::write(&path, content).unwrap();
        check_max_map_count(&path).await
    }

    #[tokio::test]
    async fn test_large_enough() {
        assert!(check("262144\n").await.is_ok());
        assert!(check("1048576").await.is_ok());
    }

    #[tokio::test]
    async fn test_too_small() {
        let err = check("65530\n").await.unwrap_err();
        assert!(matches!(err, DeployError::Preflight(_)));
        assert!(err.to_string().contains("65530"));
    }

    #[tokio::test]
    async fn test_garbage_and_missing() {
        assert!(matches!(check("lots").await, Err(DeployError::Preflight(_))));

        let dir = tempfile::tempdir().unwrap();
        let missing = check_max_map_count(&dir.path().join("nope")).await;
        assert!(matches!(missing, Err(DeployError::Preflight(_))));
    }
}
