//! Ironwall daemon library.
//!
//! Exposes the daemon's building blocks for integration testing.
//! In production `ironwall-daemon` runs as a binary (main.rs).

pub mod cli;
pub mod input;
pub mod logging;
pub mod metrics_server;
pub mod replay;

use std::path::Path;

use anyhow::Result;

use ironwall_core::config::IronwallConfig;

use crate::cli::DaemonCli;

/// Loads the configuration named on the command line and applies CLI overrides.
///
/// Without `--config` the built-in defaults are used. Environment overrides
/// (`IRONWALL_{SECTION}_{FIELD}`) apply in both cases, CLI flags last.
pub async fn load_config(cli: &DaemonCli) -> Result<IronwallConfig> {
    let mut config = match cli.config.as_deref() {
        Some(path) => load_file(path).await?,
        None => {
            let mut config = IronwallConfig::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Some(level) = &cli.log_level {
        config.general.log_level.clone_from(level);
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format.clone_from(format);
    }
    if let Some(backend) = &cli.backend {
        config.filter.backend.clone_from(backend);
    }

    config.validate()?;
    Ok(config)
}

async fn load_file(path: &Path) -> Result<IronwallConfig> {
    IronwallConfig::load(path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to load {}: {e}", path.display()))
}
