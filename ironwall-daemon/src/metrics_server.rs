//! Prometheus metrics HTTP endpoint.
//!
//! Uses the built-in HTTP listener from `metrics-exporter-prometheus`.
//!
//! ```ignore
//! let config = MetricsConfig { enabled: true, ..MetricsConfig::default() };
//! install_metrics_recorder(&config)?;
//! ```

use std::net::SocketAddr;

use anyhow::Result;
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};

use ironwall_core::config::MetricsConfig;
use ironwall_core::metrics as m;

/// Install the global metrics recorder and start the HTTP listener.
///
/// Call once per process. Registers all metric descriptions and the
/// build info gauge.
///
/// # Errors
///
/// - Unsupported endpoint path or unparseable listen address
/// - Socket binding fails or a recorder is already installed
pub fn install_metrics_recorder(config: &MetricsConfig) -> Result<()> {
    if config.endpoint != "/metrics" {
        return Err(anyhow::anyhow!(
            "unsupported metrics endpoint '{}': only '/metrics' is served",
            config.endpoint
        ));
    }

    let addr: SocketAddr = format!("{}:{}", config.listen_addr, config.port)
        .parse()
        .map_err(|e| anyhow::anyhow!("invalid metrics listen address: {e}"))?;

    if addr.ip().is_unspecified() {
        tracing::warn!(
            listen_addr = %addr,
            "metrics endpoint is exposed on all interfaces"
        );
    }

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .set_buckets_for_metric(
            Matcher::Full(m::DETECTOR_ANALYSIS_DURATION_SECONDS.to_owned()),
            &m::ANALYSIS_DURATION_BUCKETS,
        )
        .map_err(|e| anyhow::anyhow!("invalid histogram buckets: {e}"))?
        .install()
        .map_err(|e| anyhow::anyhow!("failed to install metrics recorder: {e}"))?;

    m::describe_all();
    metrics::gauge!(m::DAEMON_BUILD_INFO, "version" => env!("CARGO_PKG_VERSION")).set(1.0);

    tracing::info!(listen_addr = %addr, "Prometheus metrics endpoint active");
    Ok(())
}
