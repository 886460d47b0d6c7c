//! In-memory implementations of the collaborator traits
//!
//! These are suitable for development and testing. Every implementation can
//! share a [`CallLog`] so tests can assert the order in which side effects
//! happened across different collaborators.

use crate::containers::ContainerRuntime;
use crate::data::ResidualData;
use crate::error::{ClusterError, ClusterResult};
use crate::registry::{HealthRegistry, KeyValueStore};
use crate::scheduler::JobScheduler;
use crate::search::SearchIndex;
use crate::secrets::SecretStore;
use async_trait::async_trait;
use dashmap::DashMap;
use liquid_types::{
    Allocation, CheckReport, CollectionName, JobSpec, JobStatus, JobSummary, SecretPath,
    SecretValue,
};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Ordered record of side effects, shareable between fakes
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, entry: impl Into<String>) {
        locked(&self.entries).push(entry.into());
    }

    pub fn entries(&self) -> Vec<String> {
        locked(&self.entries).clone()
    }

    /// Position of the first entry equal to `entry`.
    pub fn position(&self, entry: &str) -> Option<usize> {
        locked(&self.entries).iter().position(|e| e == entry)
    }
}

/// In-memory job scheduler
///
/// Templates are parsed as JSON job documents. Stopped jobs become dead on
/// the next listing unless configured to linger or to never die.
pub struct InMemoryScheduler {
    jobs: DashMap<String, JobStatus>,
    specs: DashMap<String, JobSpec>,
    allocations: DashMap<String, Vec<Allocation>>,
    /// Listings left before a stopped job reports dead.
    stopping: DashMap<String, usize>,
    stuck: Mutex<HashSet<String>>,
    rejected: Mutex<HashSet<String>>,
    address: Mutex<String>,
    log: CallLog,
}

impl InMemoryScheduler {
    pub fn new() -> Self {
        Self::with_log(CallLog::new())
    }

    pub fn with_log(log: CallLog) -> Self {
        Self {
            jobs: DashMap::new(),
            specs: DashMap::new(),
            allocations: DashMap::new(),
            stopping: DashMap::new(),
            stuck: Mutex::new(HashSet::new()),
            rejected: Mutex::new(HashSet::new()),
            address: Mutex::new("127.0.0.1".to_string()),
            log,
        }
    }

    /// Seed a job as if it had been submitted earlier.
    pub fn insert_job(&self, id: &str, status: JobStatus) {
        self.jobs.insert(id.to_string(), status);
    }

    pub fn job_status(&self, id: &str) -> Option<JobStatus> {
        self.jobs.get(id).map(|s| s.clone())
    }

    /// Last submitted spec of a job.
    pub fn submitted(&self, id: &str) -> Option<JobSpec> {
        self.specs.get(id).map(|s| s.clone())
    }

    /// Keep a job running forever, even after it is stopped.
    pub fn never_dies(&self, id: &str) {
        locked(&self.stuck).insert(id.to_string());
    }

    /// Keep a stopped job running for a number of listings.
    pub fn dies_after(&self, id: &str, listings: usize) {
        self.stopping.insert(id.to_string(), listings);
    }

    /// Reject submissions of a job.
    pub fn reject(&self, id: &str) {
        locked(&self.rejected).insert(id.to_string());
    }

    pub fn set_allocations(&self, job: &str, allocations: Vec<Allocation>) {
        self.allocations.insert(job.to_string(), allocations);
    }

    pub fn set_address(&self, address: &str) {
        *locked(&self.address) = address.to_string();
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }
}

impl Default for InMemoryScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobScheduler for InMemoryScheduler {
    async fn parse(&self, template: &str) -> ClusterResult<JobSpec> {
        let raw: serde_json::Value =
            serde_json::from_str(template).map_err(|e| ClusterError::decode("scheduler", e))?;
        JobSpec::from_json(raw).map_err(|e| ClusterError::decode("scheduler", e))
    }

    async fn run(&self, spec: &JobSpec) -> ClusterResult<()> {
        let id = spec.id().to_string();
        if locked(&self.rejected).contains(&id) {
            return Err(ClusterError::Status {
                service: "scheduler",
                status: 400,
                body: format!("job {} rejected", id),
            });
        }

        self.log.record(format!("run {}", id));
        self.jobs.insert(id.clone(), JobStatus::Running);
        self.specs.insert(id, spec.clone());
        Ok(())
    }

    async fn stop(&self, job: &str) -> ClusterResult<()> {
        self.log.record(format!("stop {}", job));
        if locked(&self.stuck).contains(job) {
            return Ok(());
        }
        if let Some(mut status) = self.jobs.get_mut(job) {
            *status = JobStatus::Dead;
        }
        Ok(())
    }

    async fn list_jobs(&self) -> ClusterResult<Vec<JobSummary>> {
        let mut jobs: Vec<JobSummary> = self
            .jobs
            .iter()
            .map(|entry| {
                let status = match (entry.value(), self.stopping.get_mut(entry.key())) {
                    (JobStatus::Dead, Some(mut left)) if *left > 0 => {
                        *left -= 1;
                        JobStatus::Running
                    }
                    (status, _) => status.clone(),
                };
                JobSummary::new(entry.key().clone(), status)
            })
            .collect();
        jobs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(jobs)
    }

    async fn job_allocations(&self, job: &str) -> ClusterResult<Vec<Allocation>> {
        Ok(self
            .allocations
            .get(job)
            .map(|a| a.clone())
            .unwrap_or_default())
    }

    async fn address(&self) -> ClusterResult<String> {
        Ok(locked(&self.address).clone())
    }

    async fn gc(&self) -> ClusterResult<()> {
        self.log.record("gc");
        self.jobs.retain(|_, status| *status != JobStatus::Dead);
        Ok(())
    }
}

/// In-memory health registry
///
/// Each service is scripted with a sequence of reports; every query returns
/// the next one and the last report repeats forever. Unscripted services
/// report no checks.
pub struct InMemoryHealthRegistry {
    scripts: DashMap<String, Vec<Vec<CheckReport>>>,
    queries: DashMap<String, usize>,
}

impl InMemoryHealthRegistry {
    pub fn new() -> Self {
        Self {
            scripts: DashMap::new(),
            queries: DashMap::new(),
        }
    }

    /// Report the same checks on every query.
    pub fn set(&self, service: &str, reports: Vec<CheckReport>) {
        self.script(service, vec![reports]);
    }

    /// Report a sequence of check sets, one per query.
    pub fn script(&self, service: &str, frames: Vec<Vec<CheckReport>>) {
        self.scripts.insert(service.to_string(), frames);
        self.queries.insert(service.to_string(), 0);
    }

    /// Number of times a service's checks were read.
    pub fn queries(&self, service: &str) -> usize {
        self.queries.get(service).map(|q| *q).unwrap_or(0)
    }
}

impl Default for InMemoryHealthRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HealthRegistry for InMemoryHealthRegistry {
    async fn checks(&self, service: &str) -> ClusterResult<Vec<CheckReport>> {
        let mut queries = self.queries.entry(service.to_string()).or_insert(0);
        let index = *queries;
        *queries += 1;

        Ok(self
            .scripts
            .get(service)
            .and_then(|frames| {
                let last = frames.len().checked_sub(1)?;
                frames.get(index.min(last)).cloned()
            })
            .unwrap_or_default())
    }
}

/// In-memory key/value store
pub struct InMemoryKeyValueStore {
    values: DashMap<String, String>,
    log: CallLog,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        Self::with_log(CallLog::new())
    }

    pub fn with_log(log: CallLog) -> Self {
        Self {
            values: DashMap::new(),
            log,
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).map(|v| v.clone())
    }
}

impl Default for InMemoryKeyValueStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn set(&self, key: &str, value: &str) -> ClusterResult<()> {
        self.log.record(format!("kv {}", key));
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// In-memory secret store
pub struct InMemorySecretStore {
    secrets: DashMap<SecretPath, SecretValue>,
    writes: Mutex<Vec<SecretPath>>,
    engine: AtomicBool,
    log: CallLog,
}

impl InMemorySecretStore {
    pub fn new() -> Self {
        Self::with_log(CallLog::new())
    }

    pub fn with_log(log: CallLog) -> Self {
        Self {
            secrets: DashMap::new(),
            writes: Mutex::new(Vec::new()),
            engine: AtomicBool::new(false),
            log,
        }
    }

    /// Seed a secret without recording a write.
    pub fn insert(&self, path: &str, value: SecretValue) {
        self.secrets.insert(SecretPath::new(path), value);
    }

    pub fn get(&self, path: &str) -> Option<SecretValue> {
        self.secrets.get(&SecretPath::new(path)).map(|v| v.clone())
    }

    /// Every path written through the trait, in order.
    pub fn writes(&self) -> Vec<SecretPath> {
        locked(&self.writes).clone()
    }

    pub fn engine_enabled(&self) -> bool {
        self.engine.load(Ordering::SeqCst)
    }
}

impl Default for InMemorySecretStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SecretStore for InMemorySecretStore {
    async fn read(&self, path: &SecretPath) -> ClusterResult<Option<SecretValue>> {
        Ok(self.secrets.get(path).map(|v| v.clone()))
    }

    async fn set(&self, path: &SecretPath, value: &SecretValue) -> ClusterResult<()> {
        self.log.record(format!("secret {}", path));
        locked(&self.writes).push(path.clone());
        self.secrets.insert(path.clone(), value.clone());
        Ok(())
    }

    async fn list(&self, prefix: &str) -> ClusterResult<Vec<String>> {
        let prefix = format!("{}/", prefix.trim_end_matches('/'));

        let names: BTreeSet<String> = self
            .secrets
            .iter()
            .filter_map(|entry| {
                let rest = entry.key().as_str().strip_prefix(&prefix)?;
                Some(match rest.split_once('/') {
                    Some((folder, _)) => format!("{}/", folder),
                    None => rest.to_string(),
                })
            })
            .collect();

        Ok(names.into_iter().collect())
    }

    async fn ensure_engine(&self) -> ClusterResult<()> {
        if !self.engine.swap(true, Ordering::SeqCst) {
            self.log.record("secret engine");
        }
        Ok(())
    }
}

/// In-memory container runtime
///
/// Commands answer with the output registered for the longest matching
/// argument prefix, or with an empty string.
pub struct InMemoryContainerRuntime {
    containers: DashMap<String, Vec<String>>,
    responses: Mutex<Vec<(Vec<String>, String)>>,
    failures: Mutex<Vec<(Vec<String>, String)>>,
    executed: Mutex<Vec<(String, String)>>,
    log: CallLog,
}

impl InMemoryContainerRuntime {
    pub fn new() -> Self {
        Self::with_log(CallLog::new())
    }

    pub fn with_log(log: CallLog) -> Self {
        Self {
            containers: DashMap::new(),
            responses: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            executed: Mutex::new(Vec::new()),
            log,
        }
    }

    pub fn add_container(&self, task: &str, id: &str) {
        self.containers
            .entry(task.to_string())
            .or_default()
            .push(id.to_string());
    }

    /// Answer commands starting with `prefix` with `stdout`.
    pub fn respond(&self, prefix: &[&str], stdout: &str) {
        locked(&self.responses).push((
            prefix.iter().map(|s| s.to_string()).collect(),
            stdout.to_string(),
        ));
    }

    /// Fail commands starting with `prefix`.
    pub fn fail(&self, prefix: &[&str], stderr: &str) {
        locked(&self.failures).push((
            prefix.iter().map(|s| s.to_string()).collect(),
            stderr.to_string(),
        ));
    }

    /// Every executed `(task, command line)`, in order.
    pub fn executed(&self) -> Vec<(String, String)> {
        locked(&self.executed).clone()
    }

    fn lookup(table: &[(Vec<String>, String)], command: &[&str]) -> Option<String> {
        table
            .iter()
            .filter(|(prefix, _)| {
                prefix.len() <= command.len() && prefix.iter().zip(command).all(|(p, c)| p == c)
            })
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, output)| output.clone())
    }
}

impl Default for InMemoryContainerRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ContainerRuntime for InMemoryContainerRuntime {
    async fn find_containers(&self, task: &str) -> ClusterResult<Vec<String>> {
        Ok(self
            .containers
            .get(task)
            .map(|c| c.clone())
            .unwrap_or_default())
    }

    async fn exec(&self, task: &str, command: &[&str]) -> ClusterResult<String> {
        if self.find_containers(task).await?.is_empty() {
            return Err(ClusterError::NoContainer(task.to_string()));
        }

        let line = command.join(" ");
        self.log.record(format!("exec {} {}", task, line));
        locked(&self.executed).push((task.to_string(), line.clone()));

        if let Some(stderr) = Self::lookup(&locked(&self.failures), command) {
            return Err(ClusterError::Command {
                command: line,
                status: "exit status: 1".to_string(),
                stderr,
            });
        }

        Ok(Self::lookup(&locked(&self.responses), command).unwrap_or_default())
    }

    async fn shell(&self, task: &str, command: &[&str]) -> ClusterResult<()> {
        self.exec(task, command).await.map(|_| ())
    }
}

/// Registration of one collection in the in-memory search index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedCollection {
    pub index: String,
    pub source_url: String,
    pub public: bool,
}

/// In-memory search index
pub struct InMemorySearchIndex {
    collections: Mutex<BTreeMap<CollectionName, IndexedCollection>>,
    titles: Mutex<BTreeMap<CollectionName, String>>,
    log: CallLog,
}

impl InMemorySearchIndex {
    pub fn new() -> Self {
        Self::with_log(CallLog::new())
    }

    pub fn with_log(log: CallLog) -> Self {
        Self {
            collections: Mutex::new(BTreeMap::new()),
            titles: Mutex::new(BTreeMap::new()),
            log,
        }
    }

    /// Seed an already indexed collection.
    pub fn insert(&self, name: &str) {
        locked(&self.collections).insert(
            CollectionName::new(name),
            IndexedCollection {
                index: name.to_string(),
                source_url: String::new(),
                public: true,
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<IndexedCollection> {
        locked(&self.collections)
            .get(&CollectionName::new(name))
            .cloned()
    }

    pub fn titles(&self) -> BTreeMap<CollectionName, String> {
        locked(&self.titles).clone()
    }
}

impl Default for InMemorySearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SearchIndex for InMemorySearchIndex {
    async fn list_collections(&self) -> ClusterResult<Vec<CollectionName>> {
        Ok(locked(&self.collections).keys().cloned().collect())
    }

    async fn add_collection(
        &self,
        name: &CollectionName,
        index: &str,
        source_url: &str,
        public: bool,
    ) -> ClusterResult<()> {
        self.log.record(format!("search add {}", name));
        locked(&self.collections).insert(
            name.clone(),
            IndexedCollection {
                index: index.to_string(),
                source_url: source_url.to_string(),
                public,
            },
        );
        Ok(())
    }

    async fn remove_collection(&self, name: &CollectionName) -> ClusterResult<()> {
        self.log.record(format!("search remove {}", name));
        locked(&self.collections).remove(name);
        Ok(())
    }

    async fn push_titles(&self, titles: &[(CollectionName, String)]) -> ClusterResult<()> {
        self.log.record("search titles");
        locked(&self.titles).extend(titles.iter().cloned());
        Ok(())
    }
}

/// In-memory residual data
pub struct InMemoryResidualData {
    collections: Mutex<BTreeSet<CollectionName>>,
    log: CallLog,
}

impl InMemoryResidualData {
    pub fn new() -> Self {
        Self::with_log(CallLog::new())
    }

    pub fn with_log(log: CallLog) -> Self {
        Self {
            collections: Mutex::new(BTreeSet::new()),
            log,
        }
    }

    pub fn insert(&self, name: &str) {
        locked(&self.collections).insert(CollectionName::new(name));
    }

    pub fn contains(&self, name: &str) -> bool {
        locked(&self.collections).contains(&CollectionName::new(name))
    }
}

impl Default for InMemoryResidualData {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ResidualData for InMemoryResidualData {
    async fn list(&self) -> ClusterResult<Vec<CollectionName>> {
        Ok(locked(&self.collections).iter().cloned().collect())
    }

    async fn remove(&self, collection: &CollectionName) -> ClusterResult<()> {
        self.log.record(format!("data remove {}", collection));
        locked(&self.collections).remove(collection);
        Ok(())
    }
}
