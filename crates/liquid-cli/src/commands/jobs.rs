//! Scheduler and container pass-through commands

use crate::error::{CliError, CliResult};
use crate::output::print_success;
use liquid_cluster::{ContainerRuntime, JobScheduler};

pub async fn nomadgc(scheduler: &dyn JobScheduler) -> CliResult<()> {
    scheduler.gc().await?;
    print_success("Garbage collection requested");
    Ok(())
}

pub async fn nomad_address(scheduler: &dyn JobScheduler) -> CliResult<()> {
    println!("{}", scheduler.address().await?);
    Ok(())
}

/// First running allocation of a job's task group.
pub async fn running_allocation(
    scheduler: &dyn JobScheduler,
    job: &str,
    group: &str,
) -> CliResult<String> {
    scheduler
        .job_allocations(job)
        .await?
        .into_iter()
        .find(|alloc| alloc.task_group == group && alloc.is_running())
        .map(|alloc| alloc.id)
        .ok_or_else(|| CliError::NotFound(format!("no running allocation of {}/{}", job, group)))
}

pub async fn alloc(scheduler: &dyn JobScheduler, job: &str, group: &str) -> CliResult<()> {
    println!("{}", running_allocation(scheduler, job, group).await?);
    Ok(())
}

pub async fn shell(containers: &dyn ContainerRuntime, task: &str, args: &[String]) -> CliResult<()> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    containers.shell(task, &args).await?;
    Ok(())
}

pub async fn dockerexec(
    containers: &dyn ContainerRuntime,
    task: &str,
    args: &[String],
) -> CliResult<()> {
    let args: Vec<&str> = args.iter().map(String::as_str).collect();
    print!("{}", containers.exec(task, &args).await?);
    Ok(())
}
