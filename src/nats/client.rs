use anyhow::{Context, Result};
use async_nats::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

use super::messages::EventMessage;
use crate::events::UiEvent;

/// Subject prefix; events go to `screenrec.events.<kind>`
pub const SUBJECT_PREFIX: &str = "screenrec.events";

pub fn event_subject(event: &UiEvent) -> String {
    format!("{}.{}", SUBJECT_PREFIX, event.kind())
}

pub struct NatsClient {
    client: Client,
    app_id: String,
    sequence: AtomicU64,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(url: &str, app_id: impl Into<String>) -> Result<Self> {
        info!("Connecting to NATS at {}", url);

        let client = async_nats::connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Connected to NATS successfully");

        Ok(Self {
            client,
            app_id: app_id.into(),
            sequence: AtomicU64::new(0),
        })
    }

    /// Publish a UI event
    pub async fn publish_event(&self, event: &UiEvent) -> Result<()> {
        let subject = event_subject(event);
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        let message = EventMessage::new(self.app_id.clone(), sequence, event.clone());

        let payload = serde_json::to_vec(&message)?;

        self.client
            .publish(subject.clone(), payload.into())
            .await
            .context("Failed to publish event")?;

        debug!("Published {} (sequence={})", subject, sequence);

        Ok(())
    }

    /// Flush and close the NATS connection
    pub async fn close(self) -> Result<()> {
        info!("Closing NATS connection");
        self.client
            .flush()
            .await
            .context("Failed to flush NATS connection")?;
        Ok(())
    }
}
