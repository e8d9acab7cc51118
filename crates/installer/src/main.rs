//! Crossplane AWS demo CLI.
//!
//! Installs, validates and cleans up a Crossplane-managed AWS demo
//! environment from the current kubeconfig context.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use xpdemo_cli::commands::cleanup::CleanupCommand;
use xpdemo_cli::commands::install::InstallCommand;
use xpdemo_cli::commands::manifests::ManifestsCommand;
use xpdemo_cli::commands::validate::ValidateCommand;
use xpdemo_cli::commands::GlobalArgs;

/// Crossplane AWS demo environment.
#[derive(Parser)]
#[command(
    name = "xpdemo",
    version,
    about = "Crossplane AWS demo environment",
    long_about = "Install Crossplane and the AWS provider into the current cluster and\n\
                  manage a demo environment: VPC, subnets, security groups, an RDS\n\
                  database, an S3 bucket and a sample web workload.\n\n\
                  Cleanup keeps the VPC and subnets in the AWS account."
)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to ~/.config/xpdemo/config.yaml when present).
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// AWS CLI profile with credentials for the target account.
    #[arg(long, global = true, env = "AWS_PROFILE")]
    profile: Option<String>,

    /// AWS region for the managed resources.
    #[arg(long, global = true, env = "AWS_REGION")]
    region: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install Crossplane, the AWS provider and the demo resources.
    Install(InstallCommand),

    /// Check the controller, provider, credentials and demo resources.
    Validate(ValidateCommand),

    /// Delete the demo resources, keeping the VPC and subnets.
    Cleanup(CleanupCommand),

    /// Inspect the embedded resource library.
    Manifests(ManifestsCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("info,xpdemo_cli=debug")
        } else {
            EnvFilter::new("warn,xpdemo_cli=info")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let global = GlobalArgs {
        config: cli.config,
        profile: cli.profile,
        region: cli.region,
    };

    match cli.command {
        Commands::Install(cmd) => cmd.run(&global).await,
        Commands::Validate(cmd) => cmd.run(&global).await,
        Commands::Cleanup(cmd) => cmd.run(&global).await,
        Commands::Manifests(cmd) => cmd.run(&global).await,
    }
}
