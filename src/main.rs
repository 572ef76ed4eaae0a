use std::process;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use ndbctl::cli::{
    create_cluster, delete_cluster, format_create_report, format_plan, format_teardown_report,
    plan_cluster, seed_database, Cli, CommandError, Commands,
};
use ndbctl::config::load_settings;
use ndbctl::runtime::ProcessExecutor;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Load .env file if specified
    if let Some(ref env_file) = cli.env_file {
        dotenvy::from_path(env_file).map_err(|e| {
            anyhow::anyhow!("Failed to load env file {}: {}", env_file.display(), e)
        })?;
    }

    let settings = load_settings(cli.config.as_deref())?;
    let executor = ProcessExecutor::new();

    match cli.command {
        Commands::Plan(args) => {
            let plan = plan_cluster(&settings, &args.shape)?;
            print!("{}", format_plan(&plan, args.show_config));
        }
        Commands::Create(args) => {
            let report = create_cluster(&settings, executor, &args).await?;
            print!("{}", format_create_report(&report));
        }
        Commands::Delete(args) => {
            let report = delete_cluster(&settings, executor, &args.shape, args.manifest).await?;
            print!("{}", format_teardown_report(&report));
            if !report.is_clean() {
                return Err(CommandError::IncompleteTeardown(report.failures.len()).into());
            }
        }
        Commands::Seed(args) => {
            let output = seed_database(&settings, &executor, &args).await?;
            info!("Applied {}", args.file.display());
            print!("{}", output);
        }
    }

    Ok(())
}
