//! Whole-sequence deployment scenarios against the in-memory cluster

use liquid_cluster::memory::{
    CallLog, InMemoryContainerRuntime, InMemoryHealthRegistry, InMemoryKeyValueStore,
    InMemoryResidualData, InMemoryScheduler, InMemorySearchIndex, InMemorySecretStore,
};
use liquid_cluster::ClusterError;
use liquid_deployment::config::CollectionConfig;
use liquid_deployment::{
    DeployError, DeployOptions, Deployer, DeploymentContext, InMemoryTemplates, LiquidConfig,
};
use liquid_health::HealthError;
use liquid_types::{CheckReport, CollectionName, HealthStatus, JobStatus, SecretValue};
use std::sync::Arc;

const CORE: &str = r#"{"ID": "liquid", "TaskGroups": [{"Name": "core", "Tasks": [{
    "Name": "liquid-core",
    "Services": [{"Name": "liquid-core", "Checks": [{"Name": "http"}]}],
    "Resources": {"CPU": 100, "MemoryMB": 256}
}]}]}"#;

const HOOVER: &str = r#"{"ID": "hoover", "TaskGroups": [{"Name": "web", "Tasks": [{
    "Name": "hoover-search",
    "Services": [{"Name": "hoover-search", "Checks": [{"Name": "http"}]}],
    "Resources": {"CPU": 200, "MemoryMB": 512}
}]}]}"#;

const HOOVER_DEPS: &str = r#"{"ID": "hoover-deps", "TaskGroups": [{"Name": "db",
    "EphemeralDisk": {"SizeMB": 300},
    "Tasks": [{
        "Name": "hoover-pg",
        "Services": [{"Name": "hoover-pg", "Checks": [{"Name": "pg"}]}],
        "Resources": {"CPU": 100, "MemoryMB": 256}
    }]
}]}"#;

const COLLECTION_DEPS: &str = r#"{"ID": "collection-${name}-deps", "TaskGroups": [{"Name": "db", "Tasks": [{
    "Name": "snoop-${name}-pg",
    "Services": [{"Name": "snoop-${name}-pg", "Checks": [{"Name": "pg"}]}],
    "Resources": {"CPU": 100, "MemoryMB": 128}
}]}]}"#;

const COLLECTION: &str = r#"{"ID": "collection-${name}", "TaskGroups": [{"Name": "api", "Tasks": [{
    "Name": "snoop-${name}-api",
    "Services": [{"Name": "snoop-${name}-api", "Checks": [{"Name": "http"}]}],
    "Resources": {"CPU": 50, "MemoryMB": 64}
}]}]}"#;

const SERVICES: &[(&str, &str)] = &[
    ("liquid-core", "http"),
    ("hoover-search", "http"),
    ("hoover-pg", "pg"),
    ("snoop-alice-pg", "pg"),
    ("snoop-alice-api", "http"),
];

struct Cluster {
    log: CallLog,
    scheduler: Arc<InMemoryScheduler>,
    health: Arc<InMemoryHealthRegistry>,
    kv: Arc<InMemoryKeyValueStore>,
    secrets: Arc<InMemorySecretStore>,
    containers: Arc<InMemoryContainerRuntime>,
    search: Arc<InMemorySearchIndex>,
    data: Arc<InMemoryResidualData>,
}

impl Cluster {
    /// A cluster where every container exists and every check passes.
    fn healthy() -> Self {
        let log = CallLog::new();
        let cluster = Self {
            scheduler: Arc::new(InMemoryScheduler::with_log(log.clone())),
            health: Arc::new(InMemoryHealthRegistry::new()),
            kv: Arc::new(InMemoryKeyValueStore::with_log(log.clone())),
            secrets: Arc::new(InMemorySecretStore::with_log(log.clone())),
            containers: Arc::new(InMemoryContainerRuntime::with_log(log.clone())),
            search: Arc::new(InMemorySearchIndex::with_log(log.clone())),
            data: Arc::new(InMemoryResidualData::with_log(log.clone())),
            log,
        };

        for (service, check) in SERVICES {
            cluster
                .health
                .set(service, vec![CheckReport::new(*check, HealthStatus::Passing)]);
            cluster.containers.add_container(service, &format!("{}-1", service));
        }
        cluster.containers.respond(
            &["./manage.py", "createoauth2app"],
            r#"{"client_id": "id", "client_secret": "secret"}"#,
        );
        cluster
    }

    fn config() -> LiquidConfig {
        let mut config = LiquidConfig::default();
        config.liquid.domain = "example.org".to_string();
        config.deploy.wait_max_secs = 30;
        config.deploy.wait_interval_secs = 1;
        config.deploy.wait_green_count = 2;
        config.collections.insert(
            "alice".to_string(),
            CollectionConfig {
                title: Some("Alice".to_string()),
                ..Default::default()
            },
        );
        config
    }

    fn deployer(&self, config: LiquidConfig) -> Deployer {
        let templates = InMemoryTemplates::new()
            .with("liquid.nomad", CORE)
            .with("hoover.nomad", HOOVER)
            .with("hoover-deps.nomad", HOOVER_DEPS)
            .with("collection-deps.nomad", COLLECTION_DEPS)
            .with("collection.nomad", COLLECTION);

        Deployer::new(DeploymentContext {
            config: Arc::new(config),
            scheduler: self.scheduler.clone(),
            health: self.health.clone(),
            kv: self.kv.clone(),
            secrets: self.secrets.clone(),
            containers: self.containers.clone(),
            search: self.search.clone(),
            data: self.data.clone(),
            templates: Arc::new(templates),
        })
    }

    /// Index of the first log entry that is `prefix` or starts with its words.
    fn at(&self, prefix: &str) -> usize {
        let words = format!("{} ", prefix);
        self.log
            .entries()
            .iter()
            .position(|entry| entry == prefix || entry.starts_with(&words))
            .unwrap_or_else(|| panic!("no log entry starting with {prefix:?}"))
    }
}

#[tokio::test(start_paused = true)]
async fn test_deploy_runs_steps_in_order() {
    let cluster = Cluster::healthy();
    let report = cluster.deployer(Cluster::config()).deploy(DeployOptions::default()).await.unwrap();

    let order = [
        "kv liquid_domain",
        "secret engine",
        "secret liquid/liquid/core.django",
        "run liquid",
        "exec liquid-core ./manage.py createoauth2app authdemo",
        "run collection-alice-deps",
        "run hoover-deps",
        "exec snoop-alice-pg sh /local/set_pg_password.sh",
        "exec hoover-pg sh /local/set_pg_password.sh",
        "run hoover",
        "run collection-alice",
        "exec snoop-alice-api ./manage.py initcollection",
        "search add alice",
        "search titles",
    ];
    let positions: Vec<usize> = order.iter().map(|prefix| cluster.at(prefix)).collect();
    for (pair, steps) in positions.windows(2).zip(order.windows(2)) {
        assert!(pair[0] < pair[1], "{} should happen before {}", steps[0], steps[1]);
    }

    assert_eq!(
        report.started_jobs,
        vec!["liquid", "collection-alice-deps", "hoover-deps", "hoover", "collection-alice"]
    );
    assert_eq!(report.registered_apps.len(), 6);
    assert_eq!(report.generated_secrets.len(), 16);
    assert_eq!(report.initialized_collections.len(), 1);

    assert_eq!(cluster.kv.get("liquid_domain").as_deref(), Some("example.org"));
    assert_eq!(cluster.kv.get("liquid_debug").as_deref(), Some("false"));
    assert_eq!(
        cluster.secrets.get("liquid/hoover/auth.oauth2").unwrap().get("client_id"),
        Some("id")
    );
    assert_eq!(cluster.search.titles()[&CollectionName::new("alice")], "Alice");
}

#[tokio::test(start_paused = true)]
async fn test_core_wait_ignores_other_services() {
    let cluster = Cluster::healthy();
    cluster.deployer(Cluster::config()).deploy(DeployOptions::default()).await.unwrap();

    // Core wait, then the full wait: two polls each with a green count of 2.
    assert_eq!(cluster.health.queries("liquid-core"), 4);
    // Database wait, dependency wait, full wait.
    assert_eq!(cluster.health.queries("hoover-pg"), 6);
    assert_eq!(cluster.health.queries("hoover-search"), 2);
}

#[tokio::test(start_paused = true)]
async fn test_redeploy_is_idempotent() {
    let cluster = Cluster::healthy();
    let deployer = cluster.deployer(Cluster::config());

    deployer.deploy(DeployOptions::default()).await.unwrap();
    let writes = cluster.secrets.writes().len();

    let report = deployer.deploy(DeployOptions::default()).await.unwrap();
    assert!(report.generated_secrets.is_empty());
    assert!(report.registered_apps.is_empty());
    assert!(report.initialized_collections.is_empty());
    assert_eq!(cluster.secrets.writes().len(), writes);

    let forced = deployer
        .deploy(DeployOptions {
            reregister_apps: true,
        })
        .await
        .unwrap();
    assert_eq!(forced.registered_apps.len(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_rejected_job_aborts_sequence() {
    let cluster = Cluster::healthy();
    cluster.scheduler.reject("hoover");

    let err = cluster
        .deployer(Cluster::config())
        .deploy(DeployOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DeployError::Cluster(ClusterError::Status { status: 400, .. })
    ));
    // Started jobs are left running; later steps never ran.
    assert_eq!(cluster.scheduler.job_status("liquid"), Some(JobStatus::Running));
    assert!(cluster.search.get("alice").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_unhealthy_database_stops_before_password_script() {
    let cluster = Cluster::healthy();
    cluster.health.set(
        "snoop-alice-pg",
        vec![CheckReport::new("pg", HealthStatus::Critical)],
    );

    let err = cluster
        .deployer(Cluster::config())
        .deploy(DeployOptions::default())
        .await
        .unwrap_err();

    match err {
        DeployError::Health(HealthError::ConvergenceTimeout { failing, .. }) => {
            assert_eq!(failing.len(), 1);
            assert_eq!(failing[0].key.service, "snoop-alice-pg");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(cluster
        .containers
        .executed()
        .iter()
        .all(|(_, line)| !line.contains("set_pg_password")));
}

#[tokio::test(start_paused = true)]
async fn test_registration_garbage_aborts() {
    let cluster = Cluster::healthy();
    cluster
        .containers
        .respond(&["./manage.py", "createoauth2app", "dokuwiki"], "CommandError: boom");

    let err = cluster
        .deployer(Cluster::config())
        .deploy(DeployOptions::default())
        .await
        .unwrap_err();

    assert!(matches!(err, DeployError::Registration { ref app, .. } if app == "dokuwiki"));
    assert!(cluster.scheduler.job_status("hoover-deps").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_ci_credentials_are_overwritten() {
    let cluster = Cluster::healthy();
    cluster.secrets.insert(
        "liquid/ci/drone.github",
        SecretValue::new().with("client_id", "stale"),
    );

    let mut config = Cluster::config();
    config.ci.enabled = true;
    config.ci.github_client_id = "fresh".to_string();
    config.ci.docker_username = "bot".to_string();

    cluster.deployer(config).deploy(DeployOptions::default()).await.unwrap();

    assert_eq!(
        cluster.secrets.get("liquid/ci/drone.github").unwrap().get("client_id"),
        Some("fresh")
    );
    assert_eq!(
        cluster.secrets.get("liquid/ci/drone.docker").unwrap().get("username"),
        Some("bot")
    );
}

#[tokio::test(start_paused = true)]
async fn test_halt_stops_every_job() {
    let cluster = Cluster::healthy();
    let deployer = cluster.deployer(Cluster::config());
    deployer.deploy(DeployOptions::default()).await.unwrap();

    let stopped = deployer.halt().await.unwrap();
    assert_eq!(
        stopped,
        vec!["liquid", "hoover", "hoover-deps", "collection-alice", "collection-alice-deps"]
    );
    for job in &stopped {
        assert_eq!(cluster.scheduler.job_status(job), Some(JobStatus::Dead));
    }

    // Nothing left to stop.
    assert!(deployer.halt().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_resource_totals() {
    let cluster = Cluster::healthy();
    let totals = cluster.deployer(Cluster::config()).resources().await.unwrap();

    assert_eq!(totals["task MemoryMB"], 256 + 512 + 256 + 128 + 64);
    assert_eq!(totals["task CPU"], 100 + 200 + 100 + 100 + 50);
    assert_eq!(totals["group EphemeralDiskMB"], 300);
}
