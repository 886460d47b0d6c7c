//! Deploy, halt and resource commands

use crate::error::CliResult;
use crate::output::{print_info, print_success, print_table};
use liquid_deployment::preflight;
use liquid_deployment::{DeployOptions, Deployer, ResourceTotals};
use tabled::Tabled;

/// Table row for resource totals
#[derive(Debug, Tabled)]
struct ResourceRow {
    resource: String,
    total: u64,
}

fn resource_rows(totals: ResourceTotals) -> Vec<ResourceRow> {
    totals
        .into_iter()
        .map(|(resource, total)| ResourceRow { resource, total })
        .collect()
}

pub async fn deploy(deployer: &Deployer, skip_preflight: bool, reregister_apps: bool) -> CliResult<()> {
    if skip_preflight {
        print_info("Skipping system checks");
    } else {
        preflight::run_checks().await?;
    }

    let report = deployer.deploy(DeployOptions { reregister_apps }).await?;

    print_success(&format!(
        "Deployed {} jobs ({} new secrets, {} auth apps registered, {} collections initialized)",
        report.started_jobs.len(),
        report.generated_secrets.len(),
        report.registered_apps.len(),
        report.initialized_collections.len(),
    ));
    Ok(())
}

pub async fn halt(deployer: &Deployer) -> CliResult<()> {
    let stopped = deployer.halt().await?;
    if stopped.is_empty() {
        print_info("No jobs running");
    } else {
        print_success(&format!("Stopped {}", stopped.join(", ")));
    }
    Ok(())
}

pub async fn resources(deployer: &Deployer) -> CliResult<()> {
    print_table(resource_rows(deployer.resources().await?));
    Ok(())
}
