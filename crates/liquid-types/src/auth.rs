//! OAuth client registrations against the core job

use crate::names::SecretPath;
use serde::{Deserialize, Serialize};

/// An OAuth client application that must be registered with the core job
///
/// The credentials returned by the registration are stored at `vault_path`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthApp {
    pub name: String,
    pub vault_path: SecretPath,
    pub callback: String,
}

impl AuthApp {
    pub fn new(
        name: impl Into<String>,
        vault_path: impl Into<String>,
        callback: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            vault_path: SecretPath::new(vault_path),
            callback: callback.into(),
        }
    }
}
