//! s3hub host binary.
//!
//! Loads configuration, registers the built-in plugins, and runs one
//! command through the plugin manager.

mod builtin;
mod cli;

use clap::Parser;
use tracing_subscriber::{EnvFilter, fmt};

use s3hub_core::config::AppConfig;
use s3hub_core::error::AppError;
use s3hub_plugin::{PluginError, PluginManager};

use crate::builtin::{AuditTrail, KeyNormalizer};
use crate::cli::Cli;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match AppConfig::load(&cli.env) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    init_logging(&config);

    if let Err(e) = run(&cli, config).await {
        tracing::error!(error = %e, "Command failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Initialize tracing/logging
fn init_logging(config: &AppConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            fmt()
                .json()
                .with_env_filter(filter)
                .with_target(true)
                .with_thread_ids(true)
                .with_writer(std::io::stderr)
                .init();
        }
        _ => {
            fmt()
                .pretty()
                .with_env_filter(filter)
                .with_target(true)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

async fn run(cli: &Cli, config: AppConfig) -> Result<(), AppError> {
    tracing::debug!(env = %cli.env, "Starting s3hub v{}", env!("CARGO_PKG_VERSION"));

    let manager = PluginManager::new(config.plugins);
    for descriptor in [KeyNormalizer::descriptor(), AuditTrail::descriptor()] {
        match manager.register_plugin(descriptor).await {
            Ok(()) => {}
            Err(e @ (PluginError::Blocked { .. } | PluginError::NotAllowed { .. })) => {
                tracing::warn!(error = %e, "Built-in plugin disabled by configuration");
            }
            Err(e) => return Err(e.into()),
        }
    }

    let outcome = cli.execute(&manager).await;

    manager.shutdown().await?;
    outcome
}
