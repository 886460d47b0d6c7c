//! Idempotent secret provisioning
//!
//! A secret is generated the first time its path is ensured and never
//! touched again: presence at the path is the only idempotency signal.
//! Two processes ensuring the same absent path at the same time may both
//! generate a value; the last write wins.

use crate::error::DeployResult;
use liquid_cluster::SecretStore;
use liquid_types::{CollectionName, SecretPath, SecretValue};
use rand::rngs::OsRng;
use rand::RngCore;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Entropy of generated secrets unless stated otherwise.
pub const DEFAULT_SECRET_BITS: usize = 256;

/// Secrets holding a `secret_key` that every deployment needs.
pub const CORE_SECRET_KEYS: &[&str] = &[
    "liquid/liquid/core.django",
    "liquid/hoover/auth.django",
    "liquid/hoover/search.django",
    "liquid/hoover/search.postgres",
    "liquid/authdemo/auth.django",
    "liquid/nextcloud/nextcloud.admin",
    "liquid/nextcloud/nextcloud.uploads",
    "liquid/nextcloud/nextcloud.maria",
    "liquid/dokuwiki/auth.django",
    "liquid/nextcloud/auth.django",
    "liquid/rocketchat/auth.django",
    "liquid/ci/vmck.django",
    "liquid/ci/drone.secret",
];

/// Secret keys owned by each collection.
pub const COLLECTION_SECRET_KEYS: &[&str] = &["snoop.django", "snoop.postgres"];

pub const ROCKETCHAT_ADMIN_PATH: &str = "liquid/rocketchat/adminuser";
pub const ROCKETCHAT_ADMIN_USER: &str = "rocketchatadmin";

/// Hex-encoded, lower-case random string with `bits` bits of entropy.
///
/// Uses the operating system's random source.
pub fn random_secret(bits: usize) -> String {
    let mut bytes = vec![0u8; bits / 8];
    OsRng.fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Ensures secrets exist in the secret store
pub struct SecretProvisioner {
    store: Arc<dyn SecretStore>,
}

impl SecretProvisioner {
    pub fn new(store: Arc<dyn SecretStore>) -> Self {
        Self { store }
    }

    /// Write `factory()` at `path` unless something is already stored there.
    ///
    /// Returns whether a value was generated.
    #[instrument(skip(self, factory), fields(path = %path))]
    pub async fn ensure<F>(&self, path: &SecretPath, factory: F) -> DeployResult<bool>
    where
        F: FnOnce() -> SecretValue + Send,
    {
        if self.store.read(path).await?.is_some() {
            debug!(path = %path, "Secret already present");
            return Ok(false);
        }

        info!(path = %path, "Generating secret");
        self.store.set(path, &factory()).await?;
        Ok(true)
    }

    /// Ensure a secret holding a random `secret_key`.
    pub async fn ensure_secret_key(&self, path: &SecretPath) -> DeployResult<bool> {
        self.ensure(path, || {
            SecretValue::new().with("secret_key", random_secret(DEFAULT_SECRET_BITS))
        })
        .await
    }

    /// Overwrite a secret unconditionally.
    pub async fn set(&self, path: &SecretPath, value: &SecretValue) -> DeployResult<()> {
        self.store.set(path, value).await?;
        Ok(())
    }

    /// Ensure every secret the deployment needs.
    ///
    /// `extra_keys` are contributed by the configured jobs. Returns the paths
    /// that were generated.
    pub async fn ensure_all(
        &self,
        extra_keys: &[String],
        collections: &[CollectionName],
    ) -> DeployResult<Vec<SecretPath>> {
        let mut paths: Vec<SecretPath> = CORE_SECRET_KEYS
            .iter()
            .map(|p| SecretPath::new(*p))
            .chain(extra_keys.iter().map(|p| SecretPath::new(p.as_str())))
            .collect();
        for collection in collections {
            for key in COLLECTION_SECRET_KEYS {
                paths.push(SecretPath::for_collection(collection, key));
            }
        }

        let mut generated = Vec::new();
        for path in paths {
            if self.ensure_secret_key(&path).await? {
                generated.push(path);
            }
        }

        let admin = SecretPath::new(ROCKETCHAT_ADMIN_PATH);
        let created = self
            .ensure(&admin, || {
                SecretValue::new()
                    .with("username", ROCKETCHAT_ADMIN_USER)
                    .with("pass", random_secret(64))
            })
            .await?;
        if created {
            generated.push(admin);
        }

        Ok(generated)
    }
}
