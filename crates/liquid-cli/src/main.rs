//! Liquid CLI - Deploy and maintain a Liquid node
//!
//! This CLI gives operators a terminal interface to:
//! - Deploy the whole stack, or halt it
//! - Initialize, garbage-collect, purge and delete collections
//! - Inspect secrets, scheduler state and resource totals
//! - Open a shell inside a running task

#![deny(unsafe_code)]

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cluster;
mod commands;
mod error;
mod output;

use commands::{collections, deploy, jobs, secrets};
use error::CliResult;
use liquid_deployment::{Deployer, LiquidConfig};

/// Liquid CLI application
#[derive(Parser)]
#[command(name = "liquid")]
#[command(about = "Liquid - deploy and maintain a Liquid node", long_about = None)]
#[command(version)]
struct Cli {
    /// Settings file (defaults to ./liquid.toml when present)
    #[arg(short, long, env = "LIQUID_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,

    /// Log as JSON lines
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand)]
enum Commands {
    /// Deploy the whole stack and wait for it to be healthy
    Deploy {
        /// Skip host checks
        #[arg(long)]
        skip_preflight: bool,

        /// Register auth apps again even when credentials exist
        #[arg(long)]
        reregister_apps: bool,
    },

    /// Stop every job
    Halt,

    /// Stop jobs of collections that are no longer declared
    Collectionsgc,

    /// Garbage-collect dead scheduler jobs
    Nomadgc,

    /// Print the scheduler address
    NomadAddress,

    /// Print the first running allocation of a job's task group
    Alloc {
        job: String,
        group: String,
    },

    /// Initialize a declared collection
    Initcollection {
        name: String,
    },

    /// Delete data and index entries of undeclared collections
    Purge {
        /// Skip confirmation
        #[arg(short, long)]
        force: bool,
    },

    /// Stop an undeclared collection's jobs and delete its data
    Deletecollection {
        name: String,

        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Print a secret, or list every secret path
    Getsecret {
        path: Option<String>,
    },

    /// Print resources requested by all jobs
    Resources,

    /// Open an interactive shell in a task's container
    Shell {
        task: String,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Run a command in a task's container
    Dockerexec {
        task: String,

        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        args: Vec<String>,
    },
}

fn init_logging(verbose: bool, json: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| level.into());

    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(command: Commands, config: Arc<LiquidConfig>) -> CliResult<()> {
    let ctx = cluster::connect(config)?;

    match command {
        Commands::Deploy {
            skip_preflight,
            reregister_apps,
        } => deploy::deploy(&Deployer::new(ctx), skip_preflight, reregister_apps).await,
        Commands::Halt => deploy::halt(&Deployer::new(ctx)).await,
        Commands::Resources => deploy::resources(&Deployer::new(ctx)).await,

        Commands::Collectionsgc => collections::collectionsgc(&ctx.reconciler()).await,
        Commands::Initcollection { name } => {
            collections::initcollection(&ctx.reconciler(), &name).await
        }
        Commands::Purge { force } => {
            collections::purge(&ctx.reconciler(), force, collections::confirm_on_terminal)
                .await
                .map(|_| ())
        }
        Commands::Deletecollection { name, yes } => {
            collections::deletecollection(
                &ctx.reconciler(),
                &name,
                yes,
                collections::confirm_on_terminal,
            )
            .await
        }

        Commands::Nomadgc => jobs::nomadgc(ctx.scheduler.as_ref()).await,
        Commands::NomadAddress => jobs::nomad_address(ctx.scheduler.as_ref()).await,
        Commands::Alloc { job, group } => jobs::alloc(ctx.scheduler.as_ref(), &job, &group).await,
        Commands::Shell { task, args } => jobs::shell(ctx.containers.as_ref(), &task, &args).await,
        Commands::Dockerexec { task, args } => {
            jobs::dockerexec(ctx.containers.as_ref(), &task, &args).await
        }

        Commands::Getsecret { path } => {
            secrets::getsecret(ctx.secrets.as_ref(), path.as_deref()).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match LiquidConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            output::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };

    init_logging(cli.verbose || config.liquid.debug, cli.log_json);

    match run(cli.command, Arc::new(config)).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            output::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
