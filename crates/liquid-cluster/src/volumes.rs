//! Residual collection data stored under the volumes directory

use crate::data::ResidualData;
use crate::error::ClusterResult;
use async_trait::async_trait;
use liquid_types::CollectionName;
use std::io::{Error, ErrorKind};
use std::path::{Component, Path, PathBuf};
use tracing::info;

/// [`ResidualData`] rooted at `<volumes>/collections`
pub struct VolumeData {
    root: PathBuf,
}

impl VolumeData {
    pub fn new(volumes: impl AsRef<Path>) -> Self {
        Self {
            root: volumes.as_ref().join("collections"),
        }
    }

    pub fn collection_dir(&self, collection: &CollectionName) -> PathBuf {
        self.root.join(collection.as_str())
    }
}

#[async_trait]
impl ResidualData for VolumeData {
    async fn list(&self) -> ClusterResult<Vec<CollectionName>> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                names.push(CollectionName::new(entry.file_name().to_string_lossy()));
            }
        }
        names.sort();
        Ok(names)
    }

    async fn remove(&self, collection: &CollectionName) -> ClusterResult<()> {
        // Only ever a single directory directly below the root.
        let mut components = Path::new(collection.as_str()).components();
        if !matches!(
            (components.next(), components.next()),
            (Some(Component::Normal(_)), None)
        ) {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("refusing to remove collection data for {:?}", collection.as_str()),
            )
            .into());
        }

        let dir = self.collection_dir(collection);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => {
                info!(collection = %collection, path = %dir.display(), "Removed collection data");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
