//! Deployment Sequencer - brings the whole stack to its declared state
//!
//! `deploy` runs a fixed sequence of steps. Every step is idempotent against
//! the cluster, so after any failure the whole sequence is simply run again;
//! nothing is rolled back.
//!
//! 1. static key/value settings
//! 2. secret engine
//! 3. generated secrets
//! 4. CI credentials (overwritten)
//! 5. core job, waiting on its own checks
//! 6. auth app registration
//! 7. dependency jobs (one per collection plus the shared one)
//! 8. wait on the database checks
//! 9. database password scripts
//! 10. wait on all dependency checks
//! 11. remaining jobs
//! 12. wait on everything
//! 13. initialize new collections
//! 14. push collection titles

use crate::auth_apps::core_auth_apps;
use crate::config::{CollectionConfig, CORE_JOB};
use crate::context::DeploymentContext;
use crate::error::{DeployError, DeployResult};
use crate::render::{collection_vars, node_vars, TemplateVars};
use crate::resources::{sum_requirements, ResourceTotals};
use liquid_types::{CollectionName, HealthChecks, JobSpec, JobStatus, SecretPath, SecretValue};
use std::collections::BTreeSet;
use tracing::{info, instrument, warn};

/// Shared dependency job of the search service.
pub const SHARED_DEPS_JOB: &str = "hoover-deps";
pub const SHARED_DEPS_TEMPLATE: &str = "hoover-deps.nomad";
/// Database task of the shared dependency job.
pub const SHARED_DATABASE_TASK: &str = "hoover-pg";

pub const COLLECTION_TEMPLATE: &str = "collection.nomad";
pub const COLLECTION_DEPS_TEMPLATE: &str = "collection-deps.nomad";

/// Finalizes database credentials once a database container runs.
pub const SET_PG_PASSWORD: &[&str] = &["sh", "/local/set_pg_password.sh"];

pub const CI_GITHUB_PATH: &str = "liquid/ci/drone.github";
pub const CI_DOCKER_PATH: &str = "liquid/ci/drone.docker";

/// Options of a deployment run
#[derive(Debug, Clone, Copy, Default)]
pub struct DeployOptions {
    /// Register auth apps even when their credentials are stored.
    pub reregister_apps: bool,
}

/// What a deployment run did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeployReport {
    pub started_jobs: Vec<String>,
    pub generated_secrets: Vec<SecretPath>,
    pub registered_apps: Vec<String>,
    pub initialized_collections: Vec<CollectionName>,
}

/// A job to render from a template
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedJob {
    pub name: String,
    pub template: String,
    pub vars: TemplateVars,
}

/// Add a job's declared checks to a combined set.
///
/// Services without checks are skipped with a warning; there is nothing to
/// wait for on them.
pub fn merge_checks(into: &mut HealthChecks, job: &JobSpec) {
    for service in job.health_checks() {
        if service.checks.is_empty() {
            warn!(job = %job.id(), service = %service.service, "Service has no health checks");
            continue;
        }
        merge_service_checks(into, service.service, service.checks);
    }
}

/// Add checks for one service, skipping names it already has.
fn merge_service_checks(
    into: &mut HealthChecks,
    service: String,
    checks: impl IntoIterator<Item = String>,
) {
    let existing = into.entry(service).or_default();
    for check in checks {
        if !existing.contains(&check) {
            existing.push(check);
        }
    }
}

/// Combine two check sets without repeating a service's check names.
fn union_checks(mut into: HealthChecks, other: HealthChecks) -> HealthChecks {
    for (service, checks) in other {
        merge_service_checks(&mut into, service, checks);
    }
    into
}

/// Runs deploy, halt and resource planning
pub struct Deployer {
    ctx: DeploymentContext,
}

impl Deployer {
    pub fn new(ctx: DeploymentContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &DeploymentContext {
        &self.ctx
    }

    fn collections(&self) -> impl Iterator<Item = (CollectionName, &CollectionConfig)> + '_ {
        self.ctx
            .config
            .collections
            .iter()
            .map(|(name, settings)| (CollectionName::new(name.as_str()), settings))
    }

    /// The core job.
    pub fn core_job(&self) -> DeployResult<PlannedJob> {
        let job = self
            .ctx
            .config
            .job(CORE_JOB)
            .ok_or_else(|| DeployError::configuration(format!("job {} is not configured", CORE_JOB)))?;

        Ok(PlannedJob {
            name: job.name.clone(),
            template: job.template.clone(),
            vars: node_vars(&self.ctx.config),
        })
    }

    /// Dependency jobs: one per collection, then the shared one.
    pub fn deps_jobs(&self) -> Vec<PlannedJob> {
        let mut jobs: Vec<PlannedJob> = self
            .collections()
            .map(|(name, settings)| PlannedJob {
                name: name.deps_job_name(),
                template: COLLECTION_DEPS_TEMPLATE.to_string(),
                vars: collection_vars(&self.ctx.config, &name, settings),
            })
            .collect();

        jobs.push(PlannedJob {
            name: SHARED_DEPS_JOB.to_string(),
            template: SHARED_DEPS_TEMPLATE.to_string(),
            vars: node_vars(&self.ctx.config),
        });
        jobs
    }

    /// Every configured job except the core one, then one job per collection.
    pub fn app_jobs(&self) -> Vec<PlannedJob> {
        let vars = node_vars(&self.ctx.config);

        let configured = self
            .ctx
            .config
            .jobs
            .iter()
            .filter(|job| job.name != CORE_JOB)
            .map(|job| PlannedJob {
                name: job.name.clone(),
                template: job.template.clone(),
                vars: vars.clone(),
            });

        let collections = self.collections().map(|(name, settings)| PlannedJob {
            name: name.job_name(),
            template: COLLECTION_TEMPLATE.to_string(),
            vars: collection_vars(&self.ctx.config, &name, settings),
        });

        configured.chain(collections).collect()
    }

    /// Database tasks: one per collection, then the shared one.
    pub fn database_tasks(&self) -> Vec<String> {
        self.collections()
            .map(|(name, _)| name.database_task())
            .chain(std::iter::once(SHARED_DATABASE_TASK.to_string()))
            .collect()
    }

    async fn parse(&self, job: &PlannedJob) -> DeployResult<JobSpec> {
        let text = self.ctx.templates.render(&job.template, &job.vars).await?;
        Ok(self.ctx.scheduler.parse(&text).await?)
    }

    /// Render, parse and submit a job, merging its checks into `checks`.
    async fn start(&self, job: &PlannedJob, checks: &mut HealthChecks) -> DeployResult<()> {
        let spec = self.parse(job).await?;
        info!(job = %spec.id(), "Starting job");
        self.ctx.scheduler.run(&spec).await?;
        merge_checks(checks, &spec);
        Ok(())
    }

    #[instrument(skip(self, checks))]
    async fn wait(&self, stage: &str, checks: &HealthChecks) -> DeployResult<()> {
        let convergence = self.ctx.waiter().wait(checks).await?;
        info!(
            stage,
            polls = convergence.polls,
            elapsed_secs = convergence.elapsed.as_secs_f64(),
            "Health checks converged"
        );
        Ok(())
    }

    async fn push_settings(&self) -> DeployResult<()> {
        let node = &self.ctx.config.liquid;
        let settings = [
            ("liquid_domain", node.domain.clone()),
            ("liquid_debug", node.debug.to_string()),
            ("liquid_http_protocol", node.http_protocol.clone()),
        ];

        for (key, value) in &settings {
            self.ctx.kv.set(key, value).await?;
        }
        Ok(())
    }

    async fn push_ci_credentials(&self) -> DeployResult<()> {
        let ci = &self.ctx.config.ci;
        if !ci.enabled {
            return Ok(());
        }

        info!("Storing CI credentials");
        let provisioner = self.ctx.provisioner();
        provisioner
            .set(
                &SecretPath::new(CI_GITHUB_PATH),
                &SecretValue::new()
                    .with("client_id", ci.github_client_id.as_str())
                    .with("client_secret", ci.github_client_secret.as_str())
                    .with("user_filter", ci.github_user_filter.as_str()),
            )
            .await?;
        provisioner
            .set(
                &SecretPath::new(CI_DOCKER_PATH),
                &SecretValue::new()
                    .with("username", ci.docker_username.as_str())
                    .with("password", ci.docker_password.as_str()),
            )
            .await
    }

    /// Bring the whole stack up.
    #[instrument(skip(self))]
    pub async fn deploy(&self, options: DeployOptions) -> DeployResult<DeployReport> {
        let config = self.ctx.config.clone();
        let mut report = DeployReport::default();

        self.push_settings().await?;
        self.ctx.secrets.ensure_engine().await?;

        let extra_keys: Vec<String> = config
            .jobs
            .iter()
            .flat_map(|job| job.vault_secret_keys.iter().cloned())
            .collect();
        report.generated_secrets = self
            .ctx
            .provisioner()
            .ensure_all(&extra_keys, &config.collection_names())
            .await?;

        self.push_ci_credentials().await?;

        let core = self.core_job()?;
        let mut core_checks = HealthChecks::new();
        self.start(&core, &mut core_checks).await?;
        report.started_jobs.push(core.name);
        self.wait("core", &core_checks).await?;

        report.registered_apps = self
            .ctx
            .registrar()
            .register_all(&core_auth_apps(&config), options.reregister_apps)
            .await?;

        let mut deps_checks = HealthChecks::new();
        for job in self.deps_jobs() {
            self.start(&job, &mut deps_checks).await?;
            report.started_jobs.push(job.name);
        }

        let databases: BTreeSet<String> = self.database_tasks().into_iter().collect();
        let database_checks: HealthChecks = deps_checks
            .iter()
            .filter(|(service, _)| databases.contains(*service))
            .map(|(service, checks)| (service.clone(), checks.clone()))
            .collect();
        self.wait("databases", &database_checks).await?;

        for task in self.database_tasks() {
            info!(task = %task, "Setting database password");
            self.ctx.containers.exec(&task, SET_PG_PASSWORD).await?;
        }

        self.wait("dependencies", &deps_checks).await?;

        let mut checks = union_checks(core_checks, deps_checks);
        for job in self.app_jobs() {
            self.start(&job, &mut checks).await?;
            report.started_jobs.push(job.name);
        }
        self.wait("all", &checks).await?;

        let reconciler = self.ctx.reconciler();
        report.initialized_collections = reconciler.initialize_missing().await?;
        reconciler.push_titles().await?;

        info!(
            jobs = report.started_jobs.len(),
            secrets = report.generated_secrets.len(),
            apps = report.registered_apps.len(),
            collections = report.initialized_collections.len(),
            "Deployment complete"
        );
        Ok(report)
    }

    /// Stop every job a deployment starts.
    ///
    /// Jobs the scheduler does not list as alive are skipped. Returns the
    /// stopped jobs.
    #[instrument(skip(self))]
    pub async fn halt(&self) -> DeployResult<Vec<String>> {
        let alive: BTreeSet<String> = self
            .ctx
            .scheduler
            .list_jobs()
            .await?
            .into_iter()
            .filter(|job| job.status != JobStatus::Dead)
            .map(|job| job.id)
            .collect();

        let mut names: Vec<String> = self.ctx.config.jobs.iter().map(|job| job.name.clone()).collect();
        names.push(SHARED_DEPS_JOB.to_string());
        for (name, _) in self.collections() {
            names.push(name.job_name());
            names.push(name.deps_job_name());
        }

        let mut stopped = Vec::new();
        for name in names {
            if !alive.contains(&name) {
                continue;
            }
            info!(job = %name, "Stopping job");
            self.ctx.scheduler.stop(&name).await?;
            stopped.push(name);
        }
        Ok(stopped)
    }

    /// Total resources requested by every job a deployment runs.
    pub async fn resources(&self) -> DeployResult<ResourceTotals> {
        let mut jobs = vec![self.core_job()?];
        jobs.extend(self.deps_jobs());
        jobs.extend(self.app_jobs());

        let mut requirements = Vec::new();
        for job in &jobs {
            let spec = self.parse(job).await?;
            requirements.extend(self.ctx.scheduler.resource_requirements(&spec));
        }
        sum_requirements(requirements)
    }
}
