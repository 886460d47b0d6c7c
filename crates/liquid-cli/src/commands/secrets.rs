//! Secret inspection

use crate::error::{CliError, CliResult};
use liquid_cluster::SecretStore;
use liquid_types::SecretPath;

/// Mount point of every secret Liquid manages.
pub const SECRET_ROOT: &str = "liquid";

/// Every secret path below `root`, depth first, sorted.
pub async fn list_recursive(store: &dyn SecretStore, root: &str) -> CliResult<Vec<String>> {
    let mut found = Vec::new();
    let mut pending = vec![root.trim_end_matches('/').to_string()];

    while let Some(prefix) = pending.pop() {
        let mut names = store.list(&prefix).await?;
        names.sort();

        // Pushed in reverse so folders come out in order.
        for name in names.iter().rev() {
            match name.strip_suffix('/') {
                Some(folder) => pending.push(format!("{}/{}", prefix, folder)),
                None => found.push(format!("{}/{}", prefix, name)),
            }
        }
    }

    found.sort();
    Ok(found)
}

pub async fn getsecret(store: &dyn SecretStore, path: Option<&str>) -> CliResult<()> {
    let Some(path) = path else {
        for path in list_recursive(store, SECRET_ROOT).await? {
            println!("{}", path);
        }
        return Ok(());
    };

    let value = store
        .read(&SecretPath::new(path))
        .await?
        .ok_or_else(|| CliError::NotFound(format!("secret {}", path)))?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
