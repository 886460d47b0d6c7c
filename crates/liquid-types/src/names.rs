//! Strongly-typed names for Liquid entities
//!
//! Collections drive most of the naming in the cluster: every collection owns
//! a main job, a dependency job, a database task and an API task, all derived
//! from the collection name by a fixed convention.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

const COLLECTION_JOB_PREFIX: &str = "collection-";
const DEPS_JOB_SUFFIX: &str = "-deps";

/// Reasons a collection name is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("collection name is empty")]
    Empty,

    #[error("collection name {name:?} contains invalid character {found:?}")]
    InvalidCharacter { name: String, found: char },

    #[error("collection name {0:?} must start with a letter or digit")]
    InvalidStart(String),

    #[error("collection name {0:?} must not end with \"-deps\"")]
    ReservedSuffix(String),
}

/// Name of a tenant collection
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CollectionName(String);

impl CollectionName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check the name against the naming rules.
    ///
    /// Names come from operator configuration and end up in job names, task
    /// labels, index names and filesystem paths.
    pub fn validate(&self) -> Result<(), NameError> {
        let name = &self.0;
        let first = name.chars().next().ok_or(NameError::Empty)?;

        if let Some(found) = name
            .chars()
            .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '_' || *c == '-'))
        {
            return Err(NameError::InvalidCharacter {
                name: name.clone(),
                found,
            });
        }

        if !(first.is_ascii_lowercase() || first.is_ascii_digit()) {
            return Err(NameError::InvalidStart(name.clone()));
        }

        if name.ends_with(DEPS_JOB_SUFFIX) {
            return Err(NameError::ReservedSuffix(name.clone()));
        }

        Ok(())
    }

    /// Scheduler job running the collection's processing services.
    pub fn job_name(&self) -> String {
        format!("{}{}", COLLECTION_JOB_PREFIX, self.0)
    }

    /// Scheduler job running the collection's databases and queues.
    pub fn deps_job_name(&self) -> String {
        format!("{}{}{}", COLLECTION_JOB_PREFIX, self.0, DEPS_JOB_SUFFIX)
    }

    /// Task running the collection's database.
    pub fn database_task(&self) -> String {
        format!("snoop-{}-pg", self.0)
    }

    /// Task running the collection's API.
    pub fn api_task(&self) -> String {
        format!("snoop-{}-api", self.0)
    }
}

impl fmt::Display for CollectionName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CollectionName {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Which of a collection's two jobs a scheduler job is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionJobKind {
    Main,
    Deps,
}

/// A scheduler job recognised as belonging to a collection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CollectionJob {
    pub collection: CollectionName,
    pub kind: CollectionJobKind,
}

impl CollectionJob {
    /// Recognise a collection job from its scheduler id.
    ///
    /// Returns `None` for jobs outside the `collection-` namespace.
    pub fn parse(job_id: &str) -> Option<Self> {
        let rest = job_id.strip_prefix(COLLECTION_JOB_PREFIX)?;

        let (name, kind) = match rest.strip_suffix(DEPS_JOB_SUFFIX) {
            Some(name) => (name, CollectionJobKind::Deps),
            None => (rest, CollectionJobKind::Main),
        };

        if name.is_empty() {
            return None;
        }

        Some(Self {
            collection: CollectionName::new(name),
            kind,
        })
    }
}

/// Path of a secret in the secret store
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretPath(String);

impl SecretPath {
    pub fn new(path: impl Into<String>) -> Self {
        Self(path.into())
    }

    /// Secret owned by a collection, e.g. `liquid/collections/<name>/snoop.django`.
    pub fn for_collection(collection: &CollectionName, key: &str) -> Self {
        Self(format!("liquid/collections/{}/{}", collection, key))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SecretPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SecretPath {
    fn from(path: &str) -> Self {
        Self::new(path)
    }
}
