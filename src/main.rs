use std::{path::PathBuf, process};

use clap::Parser;
use metricsd::{
    config::Config,
    core::{
        collectors::Registry,
        orchestrator::{Orchestrator, OrchestratorError},
        shipper,
    },
    logger::LoggerManager,
    print_error,
    server::HealthServer,
    shutdown,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// metricsd - host and application telemetry agent
#[derive(Parser, Debug)]
#[command(name = "metricsd", version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, env = "METRICSD_CONFIG")]
    config: Option<PathBuf>,
}

fn log_sources_table(enabled: &[&str], available: &[&str]) {
    let name_width = available
        .iter()
        .map(|s| s.len())
        .max()
        .unwrap_or(10)
        .max("Source".len());

    info!("{:<width$} | Status", "Source", width = name_width);
    info!("{}-+-{}", "-".repeat(name_width), "-".repeat(12));

    for name in available {
        let status = if enabled.contains(name) {
            "ENABLED"
        } else {
            "DISABLED"
        };
        info!("{:<width$} | {}", name, status, width = name_width);
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let cfg = Config::new(cli.config.as_deref()).unwrap_or_else(|e| {
        print_error!("{}", e);
        process::exit(1);
    });

    let logger_manager = LoggerManager::new(cfg.logger.clone()).unwrap_or_else(|e| {
        print_error!("Failed to setup Log Manager: {}", e);
        process::exit(1);
    });
    logger_manager.init().unwrap_or_else(|e| {
        print_error!("Failed to init Log Manager: {}", e);
        process::exit(1);
    });

    info!("Starting metricsd version {}...", env!("CARGO_PKG_VERSION"));
    info!("Log level: {}", cfg.logger.level);
    debug!("{:#?}", cfg.shipper);

    log_sources_table(&cfg.metrics.enabled_sources(), &["system", "http"]);

    let registry = Registry::from_config(&cfg.metrics).unwrap_or_else(|e| {
        error!("Failed to build metric sources: {}", e);
        process::exit(1);
    });
    if registry.is_empty() {
        warn!("No metric sources enabled, every cycle will be empty");
    }

    let shipper = shipper::build(&cfg.shipper).unwrap_or_else(|e| {
        error!("Failed to create shipper: {}", e);
        process::exit(1);
    });

    let ctx = CancellationToken::new();

    let server = if cfg.server.enabled {
        let server = HealthServer::new(cfg.server.clone());
        let server_ctx = ctx.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = server.serve(server_ctx).await {
                error!("{}", e);
            }
        }))
    } else {
        info!("Health server disabled");
        None
    };

    tokio::spawn(shutdown::cancel_on_signal(tokio::signal::ctrl_c(), ctx.clone()));

    let orchestrator = Orchestrator::new(registry, shipper.clone(), cfg.metrics.interval());

    info!("Starting metrics collection...");
    match orchestrator.start(&ctx).await {
        Ok(()) => info!("Orchestrator finished"),
        Err(OrchestratorError::Cancelled) => debug!("Orchestrator cancelled"),
    }

    ctx.cancel();
    shipper.close();
    if let Some(handle) = server {
        shutdown::join_task("health server", handle).await;
    }

    let stats = orchestrator.stats();
    info!(
        cycles = stats.completed,
        shipped = stats.shipped,
        failed = stats.failed_shipments,
        skipped_ticks = stats.skipped_ticks,
        "Shutdown complete"
    );
    Ok(())
}
