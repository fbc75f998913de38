//! Relay newline-delimited readings from a byte stream to the DTN daemon.
//!
//! Each non-empty line is parsed as a [`Reading`], wrapped with the node identity and sent.
//! Malformed lines are skipped and a failed delivery drops that reading; any other error ends
//! the relay.

use dtn_client::{Connector, ErrorKind, Sleep};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{error, info, warn};

use crate::communication::CommunicationModule;
use crate::error::{NodeError, NodeResult};
use crate::reading::{node_payload, Reading};

/// Line counts for one relay run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Readings handed to the daemon
    pub delivered: u64,
    /// Readings dropped after a failed delivery
    pub dropped: u64,
    /// Lines that were not valid readings
    pub skipped: u64,
}

/// Relay readings from `input` until it is exhausted.
///
/// The module should already be connected; a disconnected module goes through the usual
/// reconnect-once path for the first reading.
///
/// # Errors
/// Returns the first error other than [`ErrorKind::DeliveryFailed`], or a read failure.
pub async fn relay_readings<R, C, S>(
    comms: &mut CommunicationModule<C, S>,
    node_id: &str,
    input: R,
) -> NodeResult<RelayStats>
where
    R: AsyncBufRead + Unpin,
    C: Connector,
    S: Sleep,
{
    let mut lines = input.lines();
    let mut stats = RelayStats::default();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let reading: Reading = match serde_json::from_str(line) {
            Ok(reading) => reading,
            Err(e) => {
                warn!(error = %e, "skipping malformed reading");
                stats.skipped += 1;
                continue;
            }
        };

        let payload = node_payload(node_id, &reading)?;
        let message = comms.generate_message(&payload)?;
        match comms.send_message(message).await {
            Ok(()) => stats.delivered += 1,
            Err(NodeError::Client(e)) if e.kind() == ErrorKind::DeliveryFailed => {
                stats.dropped += 1;
                error!(error = %e, "reading dropped");
            }
            Err(e) => return Err(e),
        }
    }

    info!(
        delivered = stats.delivered,
        dropped = stats.dropped,
        skipped = stats.skipped,
        "input closed, relay finished"
    );
    Ok(stats)
}
