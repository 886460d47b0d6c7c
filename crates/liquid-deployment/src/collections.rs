//! Collection lifecycle reconciliation
//!
//! The declared collections (configuration) are compared with what the
//! cluster actually holds:
//!
//! - `running`: collections with a running `collection-<name>` or
//!   `collection-<name>-deps` job,
//! - `indexed`: collections registered with the search index,
//! - `residual`: collections with data left on disk.
//!
//! From these, [`CollectionPlan`] derives what to initialize, what to stop
//! and what to purge.

use crate::config::LiquidConfig;
use crate::error::{DeployError, DeployResult};
use async_trait::async_trait;
use liquid_cluster::{ContainerRuntime, JobScheduler, ResidualData, SearchIndex};
use liquid_health::{PollOutcome, PollTarget, PollTick, Poller};
use liquid_types::{CollectionJob, CollectionName, JobStatus};
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Port the collection API serves collection feeds on.
pub const COLLECTION_SOURCE_PORT: u16 = 8765;

/// What reconciliation would do
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionPlan {
    /// Declared but not indexed.
    pub to_initialize: BTreeSet<CollectionName>,
    /// Running but not declared.
    pub to_gc: BTreeSet<CollectionName>,
    /// Leftover data or index entries, neither declared nor running.
    pub to_purge: BTreeSet<CollectionName>,
}

impl CollectionPlan {
    pub fn compute(
        declared: &BTreeSet<CollectionName>,
        running: &BTreeSet<CollectionName>,
        indexed: &BTreeSet<CollectionName>,
        residual: &BTreeSet<CollectionName>,
    ) -> Self {
        let to_initialize = declared.difference(indexed).cloned().collect();
        let to_gc = running.difference(declared).cloned().collect();
        let to_purge = residual
            .union(indexed)
            .filter(|name| !declared.contains(*name) && !running.contains(*name))
            .cloned()
            .collect();

        Self {
            to_initialize,
            to_gc,
            to_purge,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.to_initialize.is_empty() && self.to_gc.is_empty() && self.to_purge.is_empty()
    }
}

/// Polls the scheduler until every watched job is dead or gone
struct JobDeathWatch<'a> {
    scheduler: &'a dyn JobScheduler,
    pending: BTreeSet<String>,
}

#[async_trait]
impl<'a> PollTarget for JobDeathWatch<'a> {
    type Output = ();
    type Error = DeployError;

    async fn poll(&mut self, _tick: &PollTick) -> DeployResult<Option<()>> {
        let jobs = self.scheduler.list_jobs().await?;

        let alive: BTreeSet<String> = jobs
            .into_iter()
            .filter(|job| job.status != JobStatus::Dead && self.pending.contains(&job.id))
            .map(|job| job.id)
            .collect();

        for job in self.pending.difference(&alive) {
            info!(job = %job, "Job is dead");
        }
        self.pending = alive;

        Ok(self.pending.is_empty().then_some(()))
    }
}

/// Drives collections towards the declared set
pub struct CollectionReconciler {
    config: Arc<LiquidConfig>,
    scheduler: Arc<dyn JobScheduler>,
    containers: Arc<dyn ContainerRuntime>,
    search: Arc<dyn SearchIndex>,
    data: Arc<dyn ResidualData>,
}

impl CollectionReconciler {
    pub fn new(
        config: Arc<LiquidConfig>,
        scheduler: Arc<dyn JobScheduler>,
        containers: Arc<dyn ContainerRuntime>,
        search: Arc<dyn SearchIndex>,
        data: Arc<dyn ResidualData>,
    ) -> Self {
        Self {
            config,
            scheduler,
            containers,
            search,
            data,
        }
    }

    pub fn declared(&self) -> BTreeSet<CollectionName> {
        self.config.collection_names().into_iter().collect()
    }

    /// Collections with at least one running job.
    pub async fn running(&self) -> DeployResult<BTreeSet<CollectionName>> {
        Ok(self
            .scheduler
            .list_jobs()
            .await?
            .into_iter()
            .filter(|job| job.status == JobStatus::Running)
            .filter_map(|job| CollectionJob::parse(&job.id))
            .map(|job| job.collection)
            .collect())
    }

    pub async fn indexed(&self) -> DeployResult<BTreeSet<CollectionName>> {
        Ok(self.search.list_collections().await?.into_iter().collect())
    }

    pub async fn plan(&self) -> DeployResult<CollectionPlan> {
        let running = self.running().await?;
        let indexed = self.indexed().await?;
        let residual: BTreeSet<CollectionName> = self.data.list().await?.into_iter().collect();

        Ok(CollectionPlan::compute(
            &self.declared(),
            &running,
            &indexed,
            &residual,
        ))
    }

    /// Set up a declared collection and register it with the search index.
    ///
    /// Returns `false` when the collection was already indexed.
    #[instrument(skip(self), fields(collection = %name))]
    pub async fn initialize(&self, name: &CollectionName) -> DeployResult<bool> {
        if !self.config.is_declared(name) {
            return Err(DeployError::configuration(format!(
                "collection {} is not declared",
                name
            )));
        }

        if self.indexed().await?.contains(name) {
            warn!(collection = %name, "Collection was already initialized");
            return Ok(false);
        }

        self.setup(name).await?;
        Ok(true)
    }

    /// Initialize every declared collection missing from the search index.
    pub async fn initialize_missing(&self) -> DeployResult<Vec<CollectionName>> {
        let indexed = self.indexed().await?;
        let mut initialized = Vec::new();

        for name in self.declared() {
            if indexed.contains(&name) {
                info!(collection = %name, "Already initialized collection");
                continue;
            }
            info!(collection = %name, "Initializing collection");
            self.setup(&name).await?;
            initialized.push(name);
        }

        Ok(initialized)
    }

    async fn setup(&self, name: &CollectionName) -> DeployResult<()> {
        self.containers
            .exec(&name.api_task(), &["./manage.py", "initcollection"])
            .await?;

        let address = self.scheduler.address().await?;
        let source_url = format!(
            "http://{}:{}/{}/collection/json",
            address, COLLECTION_SOURCE_PORT, name
        );
        self.search
            .add_collection(name, name.as_str(), &source_url, true)
            .await?;
        Ok(())
    }

    /// Push display titles of all declared collections.
    pub async fn push_titles(&self) -> DeployResult<()> {
        let titles: Vec<(CollectionName, String)> = self
            .config
            .collections
            .iter()
            .map(|(name, settings)| {
                (
                    CollectionName::new(name.as_str()),
                    settings.title.clone().unwrap_or_else(|| name.clone()),
                )
            })
            .collect();

        self.search.push_titles(&titles).await?;
        Ok(())
    }

    /// Stop running jobs of undeclared collections and wait for them to die.
    ///
    /// Returns the stopped jobs.
    #[instrument(skip(self))]
    pub async fn collect_garbage(&self) -> DeployResult<Vec<String>> {
        let mut stopped = Vec::new();

        for job in self.scheduler.list_jobs().await? {
            let Some(collection_job) = CollectionJob::parse(&job.id) else {
                continue;
            };
            if self.config.is_declared(&collection_job.collection) || job.status != JobStatus::Running {
                continue;
            }

            info!(job = %job.id, "Stopping job");
            self.scheduler.stop(&job.id).await?;
            stopped.push(job.id);
        }

        self.wait_for_death(&stopped).await?;
        Ok(stopped)
    }

    /// Poll until every job is dead or gone, or fail naming the survivors.
    pub async fn wait_for_death(&self, jobs: &[String]) -> DeployResult<()> {
        if jobs.is_empty() {
            return Ok(());
        }

        info!(jobs = ?jobs, "Waiting for jobs to die");
        let poller = Poller::new(
            self.config.deploy.interval(),
            self.config.deploy.gc_timeout(),
        );
        let mut watch = JobDeathWatch {
            scheduler: self.scheduler.as_ref(),
            pending: jobs.iter().cloned().collect(),
        };

        match poller.run(&mut watch).await? {
            PollOutcome::Ready(()) => Ok(()),
            PollOutcome::TimedOut | PollOutcome::GaveUp => Err(DeployError::JobTeardownTimeout {
                jobs: watch.pending.into_iter().collect(),
            }),
        }
    }

    /// Collections that can be purged.
    pub async fn purge_candidates(&self) -> DeployResult<Vec<CollectionName>> {
        Ok(self.plan().await?.to_purge.into_iter().collect())
    }

    /// Delete a collection's index entry and persisted data.
    ///
    /// Refused while the collection is declared or has running jobs.
    #[instrument(skip(self), fields(collection = %name))]
    pub async fn purge(&self, name: &CollectionName) -> DeployResult<()> {
        check_name(name)?;
        if self.config.is_declared(name) {
            return Err(DeployError::configuration(format!(
                "collection {} is still declared; remove it from the settings first",
                name
            )));
        }
        if self.running().await?.contains(name) {
            return Err(DeployError::configuration(format!(
                "collection {} still has running jobs; run collectionsgc first",
                name
            )));
        }

        if self.indexed().await?.contains(name) {
            self.search.remove_collection(name).await?;
        }
        self.data.remove(name).await?;
        info!(collection = %name, "Collection purged");
        Ok(())
    }

    /// Stop an undeclared collection's jobs, then purge it.
    pub async fn delete(&self, name: &CollectionName) -> DeployResult<()> {
        check_name(name)?;
        if self.config.is_declared(name) {
            return Err(DeployError::configuration(format!(
                "collection {} is still declared; remove it from the settings first",
                name
            )));
        }

        let jobs = [name.job_name(), name.deps_job_name()];
        let existing: Vec<String> = self
            .scheduler
            .list_jobs()
            .await?
            .into_iter()
            .filter(|job| jobs.contains(&job.id) && job.status != JobStatus::Dead)
            .map(|job| job.id)
            .collect();

        for job in &existing {
            info!(job = %job, "Stopping job");
            self.scheduler.stop(job).await?;
        }
        self.wait_for_death(&existing).await?;

        self.purge(name).await
    }

    pub fn gc_timeout(&self) -> Duration {
        self.config.deploy.gc_timeout()
    }
}

/// Names typed by an operator end up in filesystem paths.
fn check_name(name: &CollectionName) -> DeployResult<()> {
    name.validate().map_err(|e| {
        DeployError::configuration(format!("invalid collection name {:?}: {}", name.as_str(), e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CollectionConfig;
    use liquid_cluster::memory::{
        InMemoryContainerRuntime, InMemoryResidualData, InMemoryScheduler, InMemorySearchIndex,
    };

    fn names(list: &[&str]) -> BTreeSet<CollectionName> {
        list.iter().map(|n| CollectionName::new(*n)).collect()
    }

    struct Fixture {
        reconciler: CollectionReconciler,
        scheduler: Arc<InMemoryScheduler>,
        containers: Arc<InMemoryContainerRuntime>,
        search: Arc<InMemorySearchIndex>,
        data: Arc<InMemoryResidualData>,
    }

    fn fixture(declared: &[&str]) -> Fixture {
        let mut config = LiquidConfig::default();
        for name in declared {
            config
                .collections
                .insert(name.to_string(), CollectionConfig::default());
        }
        config.deploy.wait_interval_secs = 1;
        config.deploy.gc_timeout_secs = 10;

        let scheduler = Arc::new(InMemoryScheduler::new());
        scheduler.set_address("10.0.0.5");
        let containers = Arc::new(InMemoryContainerRuntime::new());
        let search = Arc::new(InMemorySearchIndex::new());
        let data = Arc::new(InMemoryResidualData::new());

        let reconciler = CollectionReconciler::new(
            Arc::new(config),
            scheduler.clone(),
            containers.clone(),
            search.clone(),
            data.clone(),
        );

        Fixture {
            reconciler,
            scheduler,
            containers,
            search,
            data,
        }
    }

    #[test]
    fn test_plan_gc_scenario() {
        let plan = CollectionPlan::compute(
            &names(&["alice"]),
            &names(&["alice", "bob"]),
            &names(&["alice"]),
            &names(&[]),
        );
        assert_eq!(plan.to_gc, names(&["bob"]));
        assert!(plan.to_initialize.is_empty());
        assert!(plan.to_purge.is_empty());
    }

    #[test]
    fn test_plan_purge_scenario() {
        let plan = CollectionPlan::compute(&names(&[]), &names(&[]), &names(&[]), &names(&["carol"]));
        assert_eq!(plan.to_purge, names(&["carol"]));
        assert!(plan.to_gc.is_empty());
        assert!(plan.to_initialize.is_empty());
    }

    #[test]
    fn test_plan_nothing_declared() {
        let plan = CollectionPlan::compute(
            &names(&[]),
            &names(&["a", "b"]),
            &names(&["a", "c"]),
            &names(&[]),
        );
        assert_eq!(plan.to_gc, names(&["a", "b"]));
        assert_eq!(plan.to_purge, names(&["c"]));
    }

    #[tokio::test]
    async fn test_running_recognises_both_jobs() {
        let f = fixture(&[]);
        f.scheduler.insert_job("collection-alice", JobStatus::Running);
        f.scheduler.insert_job("collection-bob-deps", JobStatus::Running);
        f.scheduler.insert_job("collection-carol", JobStatus::Dead);
        f.scheduler.insert_job("hoover", JobStatus::Running);

        assert_eq!(f.reconciler.running().await.unwrap(), names(&["alice", "bob"]));
    }

    #[tokio::test]
    async fn test_initialize_declared_collection() {
        let f = fixture(&["alice"]);
        f.containers.add_container("snoop-alice-api", "api-1");

        assert!(f.reconciler.initialize(&CollectionName::new("alice")).await.unwrap());

        assert_eq!(
            f.containers.executed(),
            vec![("snoop-alice-api".to_string(), "./manage.py initcollection".to_string())]
        );
        let indexed = f.search.get("alice").unwrap();
        assert_eq!(indexed.index, "alice");
        assert_eq!(indexed.source_url, "http://10.0.0.5:8765/alice/collection/json");
        assert!(indexed.public);

        // Second run is a no-op.
        assert!(!f.reconciler.initialize(&CollectionName::new("alice")).await.unwrap());
        assert_eq!(f.containers.executed().len(), 1);
    }

    #[tokio::test]
    async fn test_initialize_undeclared_is_configuration_error() {
        let f = fixture(&["alice"]);
        let err = f
            .reconciler
            .initialize(&CollectionName::new("mallory"))
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_initialize_missing_skips_indexed() {
        let f = fixture(&["alice", "bob"]);
        f.search.insert("alice");
        f.containers.add_container("snoop-bob-api", "api-2");

        let initialized = f.reconciler.initialize_missing().await.unwrap();
        assert_eq!(initialized, vec![CollectionName::new("bob")]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gc_stops_undeclared_jobs() {
        let f = fixture(&["alice"]);
        f.scheduler.insert_job("collection-alice", JobStatus::Running);
        f.scheduler.insert_job("collection-bob", JobStatus::Running);
        f.scheduler.insert_job("collection-bob-deps", JobStatus::Running);
        f.scheduler.insert_job("collection-old", JobStatus::Dead);
        f.scheduler.dies_after("collection-bob", 3);

        let stopped = f.reconciler.collect_garbage().await.unwrap();
        assert_eq!(stopped, vec!["collection-bob", "collection-bob-deps"]);
        assert_eq!(f.scheduler.job_status("collection-alice"), Some(JobStatus::Running));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gc_fails_naming_stuck_job() {
        let f = fixture(&[]);
        f.scheduler.insert_job("collection-bob", JobStatus::Running);
        f.scheduler.insert_job("collection-eve", JobStatus::Running);
        f.scheduler.never_dies("collection-bob");

        let started = tokio::time::Instant::now();
        let err = f.reconciler.collect_garbage().await.unwrap_err();

        match err {
            DeployError::JobTeardownTimeout { jobs } => assert_eq!(jobs, vec!["collection-bob"]),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(started.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_purge_removes_index_and_data() {
        let f = fixture(&["alice"]);
        f.search.insert("carol");
        f.data.insert("carol");
        f.data.insert("dave");

        assert_eq!(
            f.reconciler.purge_candidates().await.unwrap(),
            vec![CollectionName::new("carol"), CollectionName::new("dave")]
        );

        f.reconciler.purge(&CollectionName::new("carol")).await.unwrap();
        assert!(f.search.get("carol").is_none());
        assert!(!f.data.contains("carol"));
    }

    #[tokio::test]
    async fn test_purge_refuses_declared_or_running() {
        let f = fixture(&["alice"]);
        f.scheduler.insert_job("collection-bob", JobStatus::Running);

        assert!(matches!(
            f.reconciler.purge(&CollectionName::new("alice")).await,
            Err(DeployError::Configuration(_))
        ));
        assert!(matches!(
            f.reconciler.purge(&CollectionName::new("bob")).await,
            Err(DeployError::Configuration(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_stops_then_purges() {
        let f = fixture(&[]);
        f.scheduler.insert_job("collection-bob", JobStatus::Running);
        f.scheduler.insert_job("collection-bob-deps", JobStatus::Running);
        f.search.insert("bob");
        f.data.insert("bob");

        f.reconciler.delete(&CollectionName::new("bob")).await.unwrap();

        assert_eq!(f.scheduler.job_status("collection-bob"), Some(JobStatus::Dead));
        assert_eq!(f.scheduler.job_status("collection-bob-deps"), Some(JobStatus::Dead));
        assert!(f.search.get("bob").is_none());
        assert!(!f.data.contains("bob"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_names_touch_nothing() {
        let f = fixture(&["alice"]);
        f.scheduler.insert_job("collection-alice", JobStatus::Running);
        f.search.insert("alice");
        f.data.insert("alice");

        for name in ["..", "", "../alice", "Bob"] {
            let name = CollectionName::new(name);
            assert!(matches!(
                f.reconciler.delete(&name).await,
                Err(DeployError::Configuration(_))
            ));
            assert!(matches!(
                f.reconciler.purge(&name).await,
                Err(DeployError::Configuration(_))
            ));
        }

        assert_eq!(f.scheduler.job_status("collection-alice"), Some(JobStatus::Running));
        assert!(f.search.get("alice").is_some());
        assert!(f.data.contains("alice"));
    }

    #[tokio::test]
    async fn test_push_titles_defaults_to_name() {
        let mut f = fixture(&[]);
        let mut config = LiquidConfig::default();
        config.collections.insert(
            "alice".into(),
            CollectionConfig {
                title: Some("Alice's Files".into()),
                ..Default::default()
            },
        );
        config
            .collections
            .insert("bob".into(), CollectionConfig::default());
        f.reconciler.config = Arc::new(config);

        f.reconciler.push_titles().await.unwrap();
        let titles = f.search.titles();
        assert_eq!(titles[&CollectionName::new("alice")], "Alice's Files");
        assert_eq!(titles[&CollectionName::new("bob")], "bob");
    }
}
