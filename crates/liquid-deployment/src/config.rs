//! Node configuration
//!
//! Loaded once at start-up from built-in defaults, a TOML settings file and
//! `LIQUID_*` environment variables (sections separated by `__`, e.g.
//! `LIQUID_DEPLOY__WAIT_MAX_SECS=600`), in that order of precedence.

use crate::error::{DeployError, DeployResult};
use liquid_health::WaitConfig;
use liquid_types::{AuthApp, CollectionName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Name of the core job every deployment needs.
pub const CORE_JOB: &str = "liquid";

/// Default settings file name.
pub const DEFAULT_CONFIG_FILE: &str = "liquid.toml";

/// Main node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidConfig {
    #[serde(default)]
    pub liquid: NodeConfig,

    #[serde(default)]
    pub deploy: DeployConfig,

    #[serde(default)]
    pub cluster: ClusterConfig,

    #[serde(default)]
    pub ci: CiConfig,

    /// Jobs deployed besides the collection jobs; the core job first.
    #[serde(default)]
    pub jobs: Vec<JobConfig>,

    /// Declared collections by name.
    #[serde(default, deserialize_with = "deserialize_collections")]
    pub collections: BTreeMap<String, CollectionConfig>,
}

impl Default for LiquidConfig {
    fn default() -> Self {
        Self {
            liquid: NodeConfig::default(),
            deploy: DeployConfig::default(),
            cluster: ClusterConfig::default(),
            ci: CiConfig::default(),
            jobs: default_jobs(),
            collections: BTreeMap::new(),
        }
    }
}

/// Settings shared by every application on the node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    #[serde(default = "default_domain")]
    pub domain: String,

    #[serde(default)]
    pub debug: bool,

    #[serde(default = "default_http_protocol")]
    pub http_protocol: String,

    /// Root of persisted data.
    #[serde(default = "default_volumes")]
    pub volumes: PathBuf,

    /// Directory holding job templates.
    #[serde(default = "default_templates")]
    pub templates: PathBuf,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            domain: default_domain(),
            debug: false,
            http_protocol: default_http_protocol(),
            volumes: default_volumes(),
            templates: default_templates(),
        }
    }
}

/// Waiting parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    #[serde(default = "default_wait_max")]
    pub wait_max_secs: u64,

    #[serde(default = "default_wait_interval")]
    pub wait_interval_secs: u64,

    #[serde(default = "default_green_count")]
    pub wait_green_count: u32,

    /// How long stopped collection jobs get to die.
    #[serde(default = "default_gc_timeout")]
    pub gc_timeout_secs: u64,
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            wait_max_secs: default_wait_max(),
            wait_interval_secs: default_wait_interval(),
            wait_green_count: default_green_count(),
            gc_timeout_secs: default_gc_timeout(),
        }
    }
}

impl DeployConfig {
    pub fn wait_config(&self) -> WaitConfig {
        WaitConfig {
            max_wait: Duration::from_secs(self.wait_max_secs),
            interval: self.interval(),
            green_count: self.wait_green_count,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.wait_interval_secs)
    }

    pub fn gc_timeout(&self) -> Duration {
        Duration::from_secs(self.gc_timeout_secs)
    }
}

/// Addresses of the cluster services
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterConfig {
    #[serde(default = "default_nomad_url")]
    pub nomad_url: String,

    #[serde(default = "default_consul_url")]
    pub consul_url: String,

    #[serde(default = "default_vault_url")]
    pub vault_url: String,

    /// Falls back to the `VAULT_TOKEN` environment variable.
    #[serde(default)]
    pub vault_token: Option<String>,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            nomad_url: default_nomad_url(),
            consul_url: default_consul_url(),
            vault_url: default_vault_url(),
            vault_token: None,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl ClusterConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Continuous integration credentials
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub github_client_id: String,
    #[serde(default)]
    pub github_client_secret: String,
    #[serde(default)]
    pub github_user_filter: String,
    #[serde(default)]
    pub docker_username: String,
    #[serde(default)]
    pub docker_password: String,
}

/// A job deployed from a template
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobConfig {
    pub name: String,
    /// Template file, relative to the templates directory.
    pub template: String,
    /// Extra secret paths holding a generated `secret_key`.
    #[serde(default)]
    pub vault_secret_keys: Vec<String>,
    /// Extra auth apps to register with the core job.
    #[serde(default)]
    pub core_auth_apps: Vec<AuthApp>,
}

impl JobConfig {
    pub fn new(name: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: template.into(),
            vault_secret_keys: Vec::new(),
            core_auth_apps: Vec::new(),
        }
    }
}

/// Settings of one declared collection
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollectionConfig {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub workers: Option<u32>,

    /// Any other keys, passed to the collection templates.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// Collections declared with an empty table come through as empty values.
fn deserialize_collections<'de, D>(
    deserializer: D,
) -> Result<BTreeMap<String, CollectionConfig>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: BTreeMap<String, Option<CollectionConfig>> = Deserialize::deserialize(deserializer)?;
    Ok(raw
        .into_iter()
        .map(|(name, settings)| (name, settings.unwrap_or_default()))
        .collect())
}

fn default_jobs() -> Vec<JobConfig> {
    vec![
        JobConfig::new(CORE_JOB, "liquid.nomad"),
        JobConfig::new("hoover", "hoover.nomad"),
    ]
}

fn default_domain() -> String {
    "localhost".to_string()
}

fn default_http_protocol() -> String {
    "http".to_string()
}

fn default_volumes() -> PathBuf {
    PathBuf::from("volumes")
}

fn default_templates() -> PathBuf {
    PathBuf::from("templates")
}

fn default_wait_max() -> u64 {
    300
}

fn default_wait_interval() -> u64 {
    3
}

fn default_green_count() -> u32 {
    6
}

fn default_gc_timeout() -> u64 {
    300
}

fn default_nomad_url() -> String {
    "http://127.0.0.1:4646".to_string()
}

fn default_consul_url() -> String {
    "http://127.0.0.1:8500".to_string()
}

fn default_vault_url() -> String {
    "http://127.0.0.1:8200".to_string()
}

fn default_request_timeout() -> u64 {
    30
}

impl LiquidConfig {
    /// Load configuration from defaults, a settings file and the environment.
    ///
    /// An explicitly given file must exist; the default `liquid.toml` is
    /// optional.
    pub fn load(path: Option<&Path>) -> DeployResult<Self> {
        Self::load_with_env(path, None)
    }

    /// Like [`LiquidConfig::load`], reading overrides from `env` instead of
    /// the process environment when given.
    pub fn load_with_env(
        path: Option<&Path>,
        env: Option<config::Map<String, String>>,
    ) -> DeployResult<Self> {
        let mut builder = config::Config::builder();

        // Jobs are left out of the defaults: lists from several sources
        // would be merged element by element.
        let defaults = Self {
            jobs: Vec::new(),
            ..Self::default()
        };
        builder = builder.add_source(config::Config::try_from(&defaults)?);

        let file = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        builder = builder.add_source(
            config::File::from(file)
                .format(config::FileFormat::Toml)
                .required(path.is_some()),
        );

        builder = builder.add_source(
            config::Environment::with_prefix("LIQUID")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true)
                .source(env),
        );

        let mut config: Self = builder.build()?.try_deserialize()?;
        if config.jobs.is_empty() {
            config.jobs = default_jobs();
        }
        config.validate()?;
        Ok(config)
    }

    /// Check naming rules and required settings.
    pub fn validate(&self) -> DeployResult<()> {
        for name in self.collections.keys() {
            CollectionName::new(name.as_str())
                .validate()
                .map_err(|e| DeployError::configuration(e.to_string()))?;
        }

        if self.job(CORE_JOB).is_none() {
            return Err(DeployError::configuration(format!(
                "the core job \"{}\" must be declared",
                CORE_JOB
            )));
        }

        let mut seen = std::collections::BTreeSet::new();
        for job in &self.jobs {
            if !seen.insert(job.name.as_str()) {
                return Err(DeployError::configuration(format!(
                    "job \"{}\" is declared twice",
                    job.name
                )));
            }
        }

        match self.liquid.http_protocol.as_str() {
            "http" | "https" => {}
            other => {
                return Err(DeployError::configuration(format!(
                    "http_protocol must be \"http\" or \"https\", not {:?}",
                    other
                )))
            }
        }

        if self.deploy.wait_green_count == 0 {
            return Err(DeployError::configuration(
                "wait_green_count must be at least 1",
            ));
        }

        Ok(())
    }

    pub fn job(&self, name: &str) -> Option<&JobConfig> {
        self.jobs.iter().find(|job| job.name == name)
    }

    /// Declared collection names, sorted.
    pub fn collection_names(&self) -> Vec<CollectionName> {
        self.collections
            .keys()
            .map(|name| CollectionName::new(name.as_str()))
            .collect()
    }

    pub fn is_declared(&self, collection: &CollectionName) -> bool {
        self.collections.contains_key(collection.as_str())
    }

    /// Public URL of an application, e.g. `https://hoover.example.org`.
    pub fn app_url(&self, app: &str) -> String {
        format!(
            "{}://{}.{}",
            self.liquid.http_protocol, app, self.liquid.domain
        )
    }
}
