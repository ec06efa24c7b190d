//! NATS reply publisher for forecast responses

use crate::types::response::ForecastResponse;
use anyhow::Result;
use async_nats::{Client, Subject};
use serde::Serialize;
use tracing::{debug, warn};

/// Publishes replies to the requester's inbox
#[derive(Clone)]
pub struct ReplyPublisher {
    client: Client,
}

impl ReplyPublisher {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Reply to a forecast request. Requests published without a reply
    /// subject are answered nowhere and only logged.
    pub async fn respond(&self, reply: Option<Subject>, response: &ForecastResponse) -> Result<()> {
        let Some(reply) = reply else {
            warn!(
                request_id = %response.request_id,
                "Request carried no reply subject, dropping response"
            );
            return Ok(());
        };

        self.publish_json(reply, response).await?;

        debug!(
            request_id = %response.request_id,
            status = ?response.status,
            predictions = response.predictions.len(),
            "Published forecast response"
        );

        Ok(())
    }

    /// Serialize any payload as JSON and publish it to `subject`
    pub async fn publish_json<T: Serialize>(&self, subject: Subject, payload: &T) -> Result<()> {
        let payload = serde_json::to_vec(payload)?;
        self.client.publish(subject, payload.into()).await?;
        Ok(())
    }
}

