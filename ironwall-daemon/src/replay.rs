//! Feeds packet records from an input source into the controller.

use anyhow::Result;
use serde::Serialize;
use tokio::io::AsyncBufRead;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use ironwall_filter::FilterBackend;
use ironwall_firewall::FirewallController;

use crate::input::PacketReader;

/// Outcome of one replay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    /// Valid records handed to the controller.
    pub records: u64,
    /// Malformed lines skipped.
    pub skipped: u64,
    /// Records judged to be threats.
    pub threats: u64,
    /// Whether the run ended because of a shutdown request.
    pub interrupted: bool,
}

/// Processes records until end of input or `shutdown` is cancelled.
///
/// # Errors
///
/// Returns an error only if reading the input source fails.
pub async fn replay<B, R>(
    controller: &FirewallController<B>,
    reader: &mut PacketReader<R>,
    shutdown: &CancellationToken,
) -> Result<ReplaySummary>
where
    B: FilterBackend,
    R: AsyncBufRead + Unpin,
{
    let mut summary = ReplaySummary::default();

    loop {
        let next = tokio::select! {
            _ = shutdown.cancelled() => {
                summary.interrupted = true;
                break;
            }
            next = reader.next_record() => next?,
        };
        let Some(packet) = next else {
            break;
        };

        summary.records += 1;
        match controller.process_packet(&packet).await {
            Some(verdict) if verdict.is_threat => {
                summary.threats += 1;
                debug!(
                    source = %verdict.source,
                    category = %verdict.category,
                    pattern = ?verdict.pattern,
                    confidence = verdict.confidence,
                    "threat verdict"
                );
            }
            Some(_) => {}
            None => debug!(packet = %packet, "no verdict"),
        }
    }

    summary.skipped = reader.skipped();
    info!(
        records = summary.records,
        skipped = summary.skipped,
        threats = summary.threats,
        interrupted = summary.interrupted,
        "replay finished"
    );
    Ok(summary)
}
