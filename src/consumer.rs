//! NATS subscriptions for forecast and catalog requests

use anyhow::{Context, Result};
use async_nats::{Client, Subscriber};
use tracing::info;

/// Subscription to one request subject, optionally shared through a queue
/// group so several service instances split the load.
pub struct RequestConsumer {
    client: Client,
    subject: String,
    queue_group: Option<String>,
}

impl RequestConsumer {
    pub fn new(client: Client, subject: &str) -> Self {
        Self {
            client,
            subject: subject.to_string(),
            queue_group: None,
        }
    }

    /// Join `group` instead of receiving every message. Empty names are ignored.
    pub fn with_queue_group(mut self, group: Option<&str>) -> Self {
        self.queue_group = group
            .map(str::trim)
            .filter(|g| !g.is_empty())
            .map(str::to_string);
        self
    }

    pub async fn subscribe(&self) -> Result<Subscriber> {
        let subscriber = match &self.queue_group {
            Some(group) => self
                .client
                .queue_subscribe(self.subject.clone(), group.clone())
                .await,
            None => self.client.subscribe(self.subject.clone()).await,
        }
        .with_context(|| format!("Failed to subscribe to {}", self.subject))?;

        info!(
            subject = %self.subject,
            queue_group = self.queue_group.as_deref().unwrap_or("-"),
            "Listening for requests"
        );
        Ok(subscriber)
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn queue_group(&self) -> Option<&str> {
        self.queue_group.as_deref()
    }
}
