//! Slack incoming-webhook delivery.

use std::time::Duration;

use async_trait::async_trait;

use crate::channels::Deliver;
use crate::error::ChannelError;
use crate::pipeline::types::OutboundMessage;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Posts the JSON payload to an incoming-webhook URL.
pub struct SlackWebhook {
    client: reqwest::Client,
}

impl SlackWebhook {
    pub fn new() -> Result<Self, ChannelError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ChannelError::Http(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Deliver for SlackWebhook {
    fn name(&self) -> &str {
        "slack"
    }

    async fn deliver(
        &self,
        destination: &str,
        message: &OutboundMessage,
    ) -> Result<(), ChannelError> {
        // The webhook URL is a credential; keep it out of error text.
        let resp = self
            .client
            .post(destination)
            .json(&message.payload())
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "slack".into(),
                reason: e.without_url().to_string(),
            })?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            tracing::warn!(status = ?status, "Slack webhook rejected message");
            return Err(ChannelError::SendFailed {
                name: "slack".into(),
                reason: format!("webhook returned {status}: {body}"),
            });
        }

        Ok(())
    }
}
