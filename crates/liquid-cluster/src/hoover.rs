//! Search index backed by the hoover-search management commands

use crate::containers::ContainerRuntime;
use crate::error::ClusterResult;
use crate::search::SearchIndex;
use async_trait::async_trait;
use liquid_types::CollectionName;
use std::sync::Arc;
use tracing::info;

/// Task running the search web application.
pub const SEARCH_TASK: &str = "hoover-search";

const MANAGE: &str = "./manage.py";

/// [`SearchIndex`] that runs `manage.py` commands in the search task
pub struct HooverSearch {
    containers: Arc<dyn ContainerRuntime>,
}

impl HooverSearch {
    pub fn new(containers: Arc<dyn ContainerRuntime>) -> Self {
        Self { containers }
    }
}

#[async_trait]
impl SearchIndex for HooverSearch {
    async fn list_collections(&self) -> ClusterResult<Vec<CollectionName>> {
        let stdout = self
            .containers
            .exec(SEARCH_TASK, &[MANAGE, "listcollections"])
            .await?;

        Ok(stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(CollectionName::from)
            .collect())
    }

    async fn add_collection(
        &self,
        name: &CollectionName,
        index: &str,
        source_url: &str,
        public: bool,
    ) -> ClusterResult<()> {
        let mut command = vec![
            MANAGE,
            "addcollection",
            name.as_str(),
            "--index",
            index,
            source_url,
        ];
        if public {
            command.push("--public");
        }

        self.containers.exec(SEARCH_TASK, &command).await?;
        Ok(())
    }

    async fn remove_collection(&self, name: &CollectionName) -> ClusterResult<()> {
        self.containers
            .exec(SEARCH_TASK, &[MANAGE, "removecollection", name.as_str()])
            .await?;
        Ok(())
    }

    async fn push_titles(&self, titles: &[(CollectionName, String)]) -> ClusterResult<()> {
        for (name, title) in titles {
            info!(collection = %name, title = %title, "Setting collection title");
            self.containers
                .exec(
                    SEARCH_TASK,
                    &[MANAGE, "setcollectiontitle", name.as_str(), title.as_str()],
                )
                .await?;
        }
        Ok(())
    }
}
