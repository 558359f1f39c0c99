//! Dry-run delivery: print instead of posting.

use async_trait::async_trait;

use crate::channels::Deliver;
use crate::error::ChannelError;
use crate::pipeline::types::OutboundMessage;

/// Writes each message to stdout: the channel, then the text when it is
/// non-empty, then the footer.
pub struct DryRun;

impl DryRun {
    pub fn new() -> Self {
        Self
    }

    pub fn render(message: &OutboundMessage) -> String {
        let mut lines = vec![message.channel.as_str()];
        if !message.text.is_empty() {
            lines.push(&message.text);
        }
        if let Some(footer) = message.footer.as_deref() {
            lines.push(footer);
        }
        lines.join("\n")
    }
}

impl Default for DryRun {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Deliver for DryRun {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn deliver(
        &self,
        _destination: &str,
        message: &OutboundMessage,
    ) -> Result<(), ChannelError> {
        println!("{}", Self::render(message));
        Ok(())
    }
}
