use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::client::NatsClient;
use crate::events::UiEvent;

/// Forward UI events to NATS until the bus closes
///
/// Cursor positions arrive at display rate and are dropped unless
/// `forward_cursor` is set.
pub fn spawn_event_bridge(
    client: Arc<NatsClient>,
    mut events: broadcast::Receiver<UiEvent>,
    forward_cursor: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("NATS event bridge started");
        loop {
            match events.recv().await {
                Ok(UiEvent::CursorMove { .. }) if !forward_cursor => {}
                Ok(event) => {
                    if let Err(e) = client.publish_event(&event).await {
                        warn!("Failed to forward {}: {}", event.kind(), e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("NATS bridge lagged, {} events dropped", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
        info!("NATS event bridge stopped");
    })
}
