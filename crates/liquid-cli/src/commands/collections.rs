//! Collection lifecycle commands

use crate::error::{CliError, CliResult};
use crate::output::{print_error, print_info, print_success, print_warning};
use liquid_deployment::CollectionReconciler;
use liquid_types::CollectionName;

pub async fn collectionsgc(reconciler: &CollectionReconciler) -> CliResult<()> {
    let stopped = reconciler.collect_garbage().await?;
    if stopped.is_empty() {
        print_info("No stale collection jobs");
    } else {
        print_success(&format!("Stopped {}", stopped.join(", ")));
    }
    Ok(())
}

/// Parse a collection name typed on the command line.
fn collection_name(name: &str) -> CliResult<CollectionName> {
    let name = CollectionName::new(name);
    name.validate().map_err(|e| CliError::Config(e.to_string()))?;
    Ok(name)
}

pub async fn initcollection(reconciler: &CollectionReconciler, name: &str) -> CliResult<()> {
    let name = collection_name(name)?;
    if reconciler.initialize(&name).await? {
        print_success(&format!("Initialized collection {}", name));
    } else {
        print_warning(&format!("Collection {} was already initialized", name));
    }
    Ok(())
}

/// Ask the operator on the terminal. Fails when there is no terminal.
pub fn confirm_on_terminal(prompt: String) -> CliResult<bool> {
    Ok(dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()?)
}

/// Purge every undeclared collection, asking `confirm` first unless forced.
///
/// Returns the purged collections.
pub async fn purge(
    reconciler: &CollectionReconciler,
    force: bool,
    confirm: impl FnOnce(String) -> CliResult<bool>,
) -> CliResult<Vec<CollectionName>> {
    let candidates = reconciler.purge_candidates().await?;
    if candidates.is_empty() {
        print_info("Nothing to purge");
        return Ok(Vec::new());
    }

    let names: Vec<&str> = candidates.iter().map(CollectionName::as_str).collect();
    print_warning(&format!(
        "The following collections will be deleted: {}",
        names.join(", ")
    ));

    if !force && !confirm("Delete their data and search index?".to_string())? {
        print_error("Aborted");
        return Ok(Vec::new());
    }

    for name in &candidates {
        reconciler.purge(name).await?;
        print_success(&format!("Purged {}", name));
    }
    Ok(candidates)
}

pub async fn deletecollection(
    reconciler: &CollectionReconciler,
    name: &str,
    yes: bool,
    confirm: impl FnOnce(String) -> CliResult<bool>,
) -> CliResult<()> {
    let name = collection_name(name)?;
    if !yes && !confirm(format!("Delete collection {} with all its data?", name))? {
        print_error("Aborted");
        return Ok(());
    }

    reconciler.delete(&name).await?;
    print_success(&format!("Deleted collection {}", name));
    Ok(())
}
