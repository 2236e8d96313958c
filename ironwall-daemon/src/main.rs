use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use ironwall_core::metrics as m;
use ironwall_daemon::cli::DaemonCli;
use ironwall_daemon::input::{self, PacketReader};
use ironwall_daemon::{load_config, logging, metrics_server, replay};
use ironwall_filter::{AnyBackend, PacketFilterConfig};
use ironwall_firewall::FirewallController;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = DaemonCli::parse();
    let config = load_config(&cli).await?;

    if cli.validate {
        println!("configuration is valid");
        return Ok(());
    }

    logging::init_tracing(&config.general)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "ironwall-daemon starting");

    if config.metrics.enabled {
        metrics_server::install_metrics_recorder(&config.metrics)?;
    }

    let filter_config = PacketFilterConfig::from_core(&config.filter)?;
    let backend = Arc::new(AnyBackend::from_config(&filter_config));
    let controller = FirewallController::builder()
        .config(config)
        .backend(backend)
        .build()
        .await?;
    controller.start();

    let shutdown = CancellationToken::new();
    tokio::spawn(wait_for_ctrl_c(shutdown.clone()));
    tokio::spawn(report_uptime(shutdown.clone()));

    let source = input::open(&cli.input)
        .await
        .map_err(|e| anyhow::anyhow!("failed to open input '{}': {e}", cli.input))?;
    let mut reader = PacketReader::new(source).follow(cli.follow);
    let result = replay::replay(&controller, &mut reader, &shutdown).await;

    shutdown.cancel();
    controller.stop().await;
    let stats = controller.stats();
    if !cli.keep_blocks {
        controller.release_blocks().await;
    }

    let summary = result?;
    tracing::info!(
        records = summary.records,
        threats = summary.threats,
        blocked = stats.blocked_count,
        "ironwall-daemon shut down"
    );
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

async fn wait_for_ctrl_c(shutdown: CancellationToken) {
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            match result {
                Ok(()) => {
                    tracing::info!("shutdown signal received");
                    shutdown.cancel();
                }
                Err(e) => tracing::error!(error = %e, "failed to listen for shutdown signal"),
            }
        }
        _ = shutdown.cancelled() => {}
    }
}

async fn report_uptime(shutdown: CancellationToken) {
    let started = Instant::now();
    let mut ticker = tokio::time::interval(Duration::from_secs(10));
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = ticker.tick() => {
                metrics::gauge!(m::DAEMON_UPTIME_SECONDS).set(started.elapsed().as_secs_f64());
            }
        }
    }
}
