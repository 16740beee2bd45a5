use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use hmipd::Config;
use hmipd::Engine;
use hmipd::LogLevel;
use tokio::sync::oneshot;
use tracing_subscriber::EnvFilter;

/// Bridge a HomematicIP cloud access point into host entities.
#[derive(Parser, Debug)]
#[command(name = "hmipd", version, about)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "hmipd.toml")]
    config: PathBuf,

    /// Override the configured global log level
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = Config::from_file(&cli.config)?;
    if let Some(level) = cli.log_level {
        config.logging.level = level;
    }

    // RUST_LOG wins over the config file
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.env_filter_directives()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    tracing::info!("hmipd starting");
    tracing::info!("Loaded config from: {}", cli.config.display());

    let engine = Arc::new(Engine::new());
    engine.register_integrations_from_config(&config);

    let runner = engine.clone();
    let engine_task = tokio::spawn(async move {
        if let Err(e) = runner.run().await {
            tracing::error!("Engine stopped: {}", e);
        }
    });

    let api = config.api.clone().map(|api| {
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let engine = engine.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = hmipd::api::serve(api.listen, api.port, engine, shutdown_rx).await {
                tracing::error!("HTTP API server failed: {}", e);
            }
        });
        (shutdown_tx, task)
    });

    tracing::info!("Press Ctrl+C to exit");
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received shutdown signal"),
        Err(e) => tracing::error!("Failed to listen for shutdown signal: {}", e),
    }

    if let Some((shutdown_tx, task)) = api {
        let _ = shutdown_tx.send(());
        if let Err(e) = task.await {
            tracing::warn!("HTTP API task ended abnormally: {}", e);
        }
    }

    engine.shutdown().await;
    engine_task.abort();

    tracing::info!("hmipd shutdown complete");
    Ok(())
}
