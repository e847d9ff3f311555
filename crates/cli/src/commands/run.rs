//! `run` command implementation.

use anyhow::{Context, Result};
use std::time::Duration;
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::error::CliError;
use crate::pipeline::{Orchestrator, OrchestratorConfig};

/// Execute the `run` command
pub async fn run_dispatch(args: &RunArgs) -> Result<()> {
    info!(config = %args.config.display(), "Loading configuration");

    if !args.config.exists() {
        return Err(CliError::config_not_found(args.config.display().to_string()).into());
    }

    let mut blueprint = config_loader::ConfigLoader::load_from_path(&args.config)
        .with_context(|| format!("Failed to load config from {}", args.config.display()))?;

    // Apply CLI overrides
    if let Some(workers) = args.workers {
        info!(workers, "Overriding worker count from CLI");
        blueprint.dispatch.workers = workers;
        config_loader::ConfigLoader::validate(&blueprint)
            .context("Invalid worker override")?;
    }

    info!(
        destination = %blueprint.destination.kind,
        router = %blueprint.routing.name,
        batching = blueprint.batch.is_some(),
        workers = blueprint.dispatch.workers,
        "Configuration loaded"
    );

    // Dry run - just validate and exit
    if args.dry_run {
        info!("Dry run mode - configuration is valid, exiting");
        println!("{}", config_loader::ConfigLoader::to_toml(&blueprint)?);
        return Ok(());
    }

    let config = OrchestratorConfig {
        blueprint,
        input: args.input.clone(),
        output: args.output.clone(),
        timeout: if args.timeout == 0 {
            None
        } else {
            Some(Duration::from_secs(args.timeout))
        },
        metrics_port: if args.metrics_port == 0 {
            None
        } else {
            Some(args.metrics_port)
        },
    };

    let orchestrator = Orchestrator::new(config);
    let shutdown_signal = setup_shutdown_signal();

    info!(input = %args.input.display(), "Starting dispatch...");

    tokio::select! {
        result = orchestrator.run() => {
            let stats = result.context("Dispatch failed")?;
            info!(
                records = stats.records,
                dispatched = stats.summary.dispatched,
                temporary_failures = stats.summary.temporary_failures,
                duration_secs = stats.duration.as_secs_f64(),
                "Dispatch completed"
            );
            stats.print_summary();
        }
        _ = shutdown_signal => {
            warn!("Received shutdown signal, stopping dispatch...");
        }
    }

    info!("CDC Outbound finished");
    Ok(())
}

/// Setup Ctrl+C and SIGTERM signal handlers
async fn setup_shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
